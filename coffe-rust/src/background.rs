//! Background cosmology
//!
//! Distances are in Mpc/h and rates in h/Mpc (H/c), so the Hubble constant
//! is [`HUBBLE_CONSTANT`]. The conformal Hubble rate is ℋ = aH and its
//! derivative is taken with respect to conformal time.
//!
//! Two implementations sit behind [`Background`]: a flat w0waCDM model
//! solved on construction, and a table read from another code.

use crate::error::{CoffeError, Result};
use crate::gauss::legendre;
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use crate::parameters::Cosmology;
use tracing::debug;

/// H0 / c in h/Mpc
pub const HUBBLE_CONSTANT: f64 = 1.0 / 2997.92458;

/// Scale factor where the growth equation is started
const GROWTH_INITIAL_SCALE_FACTOR: f64 = 1e-3;
/// RK4 steps in ln a for the growth equation
const GROWTH_STEPS: usize = 4000;

/// Background quantities as functions of redshift.
///
/// Every method fails with `DomainError` outside [0, z_max].
pub trait Background: Send + Sync {
    /// Largest redshift covered
    fn z_max(&self) -> f64;

    /// Comoving distance χ(z)
    fn comoving_distance(&self, z: f64) -> Result<f64>;

    /// Inverse of [`Background::comoving_distance`]
    fn redshift_at_distance(&self, chi: f64) -> Result<f64>;

    /// H(z)
    fn hubble_rate(&self, z: f64) -> Result<f64>;

    /// ℋ(z) = H(z) / (1 + z)
    fn conformal_hubble_rate(&self, z: f64) -> Result<f64> {
        Ok(self.hubble_rate(z)? / (1.0 + z))
    }

    /// dℋ/dτ
    fn conformal_hubble_rate_prime(&self, z: f64) -> Result<f64>;

    /// Linear growth factor, D(0) = 1
    fn growth_factor(&self, z: f64) -> Result<f64>;

    /// f = d ln D / d ln a
    fn growth_rate(&self, z: f64) -> Result<f64>;

    /// Comoving distance of the most distant redshift covered
    fn max_comoving_distance(&self) -> Result<f64> {
        self.comoving_distance(self.z_max())
    }
}

pub(crate) fn check_domain(what: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(CoffeError::Domain {
            what,
            value,
            min,
            max,
        })
    }
}

/// Flat w0waCDM with radiation, solved on a redshift grid at construction.
#[derive(Debug, Clone)]
pub struct AnalyticBackground {
    cosmology: Cosmology,
    z_max: f64,
    /// χ(z)
    distance: Interpolate1D,
    /// z(χ)
    redshift: Interpolate1D,
    /// D and f against ln a
    growth: Interpolate1D,
    growth_rate: Interpolate1D,
}

impl AnalyticBackground {
    /// Solve the background up to `z_max` on `bins` redshift nodes.
    ///
    /// # Errors
    /// `InvalidInput` for `z_max` outside (0, 1/a_init - 1) or fewer than
    /// four bins.
    pub fn new(cosmology: &Cosmology, z_max: f64, bins: usize) -> Result<Self> {
        let z_limit = 1.0 / GROWTH_INITIAL_SCALE_FACTOR - 1.0;
        if !(z_max > 0.0 && z_max < z_limit) {
            return Err(CoffeError::invalid(format!(
                "background: z_max = {} must be in (0, {})",
                z_max, z_limit
            )));
        }
        if bins < 4 {
            return Err(CoffeError::invalid(format!(
                "background: need at least 4 redshift bins, got {}",
                bins
            )));
        }

        let cosmology = cosmology.clone();
        let z: Vec<f64> = (0..bins)
            .map(|i| z_max * i as f64 / (bins - 1) as f64)
            .collect();

        // cumulative χ with an 8-point rule on every bin
        let rule = legendre(8);
        let mut chi = Vec::with_capacity(bins);
        chi.push(0.0);
        for w in z.windows(2) {
            let piece = rule
                .reseat(w[0], w[1])
                .integrate(|zz| 1.0 / (HUBBLE_CONSTANT * e_of_z(&cosmology, zz)));
            let last = chi.last().copied().unwrap_or(0.0);
            chi.push(last + piece);
        }
        let distance = Interpolate1D::new(&z, &chi, InterpolationMethod::Cubic)?;
        let redshift = Interpolate1D::new(&chi, &z, InterpolationMethod::Cubic)?;

        let (ln_a, d, f) = solve_growth(&cosmology);
        let growth = Interpolate1D::new(&ln_a, &d, InterpolationMethod::Cubic)?;
        let growth_rate = Interpolate1D::new(&ln_a, &f, InterpolationMethod::Cubic)?;

        debug!(
            z_max,
            bins,
            chi_max = chi[bins - 1],
            "solved analytic background"
        );

        Ok(Self {
            cosmology,
            z_max,
            distance,
            redshift,
            growth,
            growth_rate,
        })
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmology
    }

    fn check(&self, z: f64) -> Result<()> {
        check_domain("redshift", z, 0.0, self.z_max)
    }
}

/// E(z)² = Ωm(1+z)³ + Ωγ(1+z)⁴ + Ωde f_de(z)
fn e2_of_z(c: &Cosmology, z: f64) -> f64 {
    let zp1 = 1.0 + z;
    c.omega_matter() * zp1.powi(3) + c.omega_gamma * zp1.powi(4) + c.omega_de() * de_factor(c, z)
}

fn e_of_z(c: &Cosmology, z: f64) -> f64 {
    e2_of_z(c, z).sqrt()
}

/// ρ_de(z) / ρ_de(0) for w(a) = w0 + wa (1 - a)
fn de_factor(c: &Cosmology, z: f64) -> f64 {
    (3.0 * ((1.0 + c.w0 + c.wa) * (1.0 + z).ln() - c.wa * z / (1.0 + z))).exp()
}

/// d ln E / d ln a
fn dlne_dlna(c: &Cosmology, z: f64) -> f64 {
    let zp1 = 1.0 + z;
    let dlnde_dz = 3.0 * ((1.0 + c.w0 + c.wa) / zp1 - c.wa / (zp1 * zp1));
    let de2_dz = 3.0 * c.omega_matter() * zp1 * zp1
        + 4.0 * c.omega_gamma * zp1.powi(3)
        + c.omega_de() * de_factor(c, z) * dlnde_dz;
    -zp1 * de2_dz / (2.0 * e2_of_z(c, z))
}

/// Integrate D'' + (2 + dlnE/dlna) D' - (3/2) Ωm(a) D = 0 in ln a with RK4,
/// starting in matter domination with D = D' = a. Returns (ln a, D, f) with
/// D normalized to 1 today.
fn solve_growth(c: &Cosmology) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ln_a0 = GROWTH_INITIAL_SCALE_FACTOR.ln();
    let step = -ln_a0 / GROWTH_STEPS as f64;

    let rhs = |ln_a: f64, y: [f64; 2]| -> [f64; 2] {
        let z = (-ln_a).exp() - 1.0;
        let e2 = e2_of_z(c, z);
        let omega_m = c.omega_matter() * (1.0 + z).powi(3) / e2;
        [
            y[1],
            -(2.0 + dlne_dlna(c, z)) * y[1] + 1.5 * omega_m * y[0],
        ]
    };

    let mut ln_a = Vec::with_capacity(GROWTH_STEPS + 1);
    let mut d = Vec::with_capacity(GROWTH_STEPS + 1);
    let mut f = Vec::with_capacity(GROWTH_STEPS + 1);

    let mut y = [GROWTH_INITIAL_SCALE_FACTOR, GROWTH_INITIAL_SCALE_FACTOR];
    for i in 0..=GROWTH_STEPS {
        let x = ln_a0 + step * i as f64;
        ln_a.push(if i == GROWTH_STEPS { 0.0 } else { x });
        d.push(y[0]);
        f.push(y[1] / y[0]);
        if i == GROWTH_STEPS {
            break;
        }

        let k1 = rhs(x, y);
        let k2 = rhs(x + 0.5 * step, [y[0] + 0.5 * step * k1[0], y[1] + 0.5 * step * k1[1]]);
        let k3 = rhs(x + 0.5 * step, [y[0] + 0.5 * step * k2[0], y[1] + 0.5 * step * k2[1]]);
        let k4 = rhs(x + step, [y[0] + step * k3[0], y[1] + step * k3[1]]);
        for j in 0..2 {
            y[j] += step / 6.0 * (k1[j] + 2.0 * k2[j] + 2.0 * k3[j] + k4[j]);
        }
    }

    let today = y[0];
    d.iter_mut().for_each(|v| *v /= today);
    (ln_a, d, f)
}

impl Background for AnalyticBackground {
    fn z_max(&self) -> f64 {
        self.z_max
    }

    fn comoving_distance(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.distance.evaluate(z))
    }

    fn redshift_at_distance(&self, chi: f64) -> Result<f64> {
        let (_, chi_max) = self.redshift.domain();
        check_domain("comoving distance", chi, 0.0, chi_max)?;
        Ok(self.redshift.evaluate(chi))
    }

    fn hubble_rate(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(HUBBLE_CONSTANT * e_of_z(&self.cosmology, z))
    }

    fn conformal_hubble_rate_prime(&self, z: f64) -> Result<f64> {
        let curly_h = self.conformal_hubble_rate(z)?;
        Ok(curly_h * curly_h * (1.0 + dlne_dlna(&self.cosmology, z)))
    }

    fn growth_factor(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.growth.evaluate(-(1.0 + z).ln()))
    }

    fn growth_rate(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.growth_rate.evaluate(-(1.0 + z).ln()))
    }
}

/// Background tabulated by an external code.
#[derive(Debug, Clone)]
pub struct TabulatedBackground {
    distance: Interpolate1D,
    redshift: Interpolate1D,
    hubble: Interpolate1D,
    growth: Interpolate1D,
    growth_rate: Interpolate1D,
}

impl TabulatedBackground {
    /// Build from columns z, χ(z), H(z), D(z), f(z).
    ///
    /// # Errors
    /// `InvalidInput` if the columns differ in length, z does not start at 0,
    /// or z and χ are not strictly ascending.
    pub fn new(
        z: &[f64],
        chi: &[f64],
        hubble: &[f64],
        growth: &[f64],
        growth_rate: &[f64],
        method: InterpolationMethod,
    ) -> Result<Self> {
        if z.first() != Some(&0.0) {
            return Err(CoffeError::invalid(
                "tabulated background must start at z = 0",
            ));
        }
        let background = Self {
            distance: Interpolate1D::new(z, chi, method)?,
            redshift: Interpolate1D::new(chi, z, method)?,
            hubble: Interpolate1D::new(z, hubble, method)?,
            growth: Interpolate1D::new(z, growth, method)?,
            growth_rate: Interpolate1D::new(z, growth_rate, method)?,
        };
        debug!(
            points = z.len(),
            z_max = background.z_max(),
            "loaded tabulated background"
        );
        Ok(background)
    }

    /// Tabulate another background on `bins` equally spaced redshifts.
    pub fn sample(background: &dyn Background, bins: usize, method: InterpolationMethod) -> Result<Self> {
        let z_max = background.z_max();
        let n = bins.max(method.min_points());
        let z: Vec<f64> = (0..n).map(|i| z_max * i as f64 / (n - 1) as f64).collect();
        let mut columns = [vec![], vec![], vec![], vec![]];
        for &zi in &z {
            columns[0].push(background.comoving_distance(zi)?);
            columns[1].push(background.hubble_rate(zi)?);
            columns[2].push(background.growth_factor(zi)?);
            columns[3].push(background.growth_rate(zi)?);
        }
        let [chi, hubble, growth, growth_rate] = columns;
        Self::new(&z, &chi, &hubble, &growth, &growth_rate, method)
    }

    fn check(&self, z: f64) -> Result<()> {
        check_domain("redshift", z, 0.0, self.z_max())
    }
}

impl Background for TabulatedBackground {
    fn z_max(&self) -> f64 {
        self.distance.domain().1
    }

    fn comoving_distance(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.distance.evaluate(z))
    }

    fn redshift_at_distance(&self, chi: f64) -> Result<f64> {
        let (_, chi_max) = self.redshift.domain();
        check_domain("comoving distance", chi, 0.0, chi_max)?;
        Ok(self.redshift.evaluate(chi))
    }

    fn hubble_rate(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.hubble.evaluate(z))
    }

    /// dℋ/dτ = -(1+z) ℋ dℋ/dz
    fn conformal_hubble_rate_prime(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        let zp1 = 1.0 + z;
        let h = self.hubble.evaluate(z);
        let curly_h = h / zp1;
        let dcurly_h_dz = self.hubble.derivative(z) / zp1 - h / (zp1 * zp1);
        Ok(-zp1 * curly_h * dcurly_h_dz)
    }

    fn growth_factor(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.growth.evaluate(z))
    }

    fn growth_rate(&self, z: f64) -> Result<f64> {
        self.check(z)?;
        Ok(self.growth_rate.evaluate(z))
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
