//! Physical content of the number counts
//!
//! Every term of the observed galaxy number counts is a Fourier multiplier
//! ([`Operator`]) acting on the density field today, times a coefficient
//! that depends on the background and the biases. The correlation of two
//! terms at points p₁, p₂ is then a combination of the scaled integrals
//! S^n_l(|p₁ - p₂|) with powers of the direction cosines, see [`correlator`].
//!
//! Conventions: d = p₁ - p₂, a_i = d̂·n_i, c = n₁·n₂, and a_i = 0 when the
//! two points coincide.

use crate::background::{Background, HUBBLE_CONSTANT};
use crate::error::{CoffeError, Result};
use crate::parameters::{NlTerm, Parameters, Population};

/// Fourier multiplier acting on δ(k) at z = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// 1
    Density,
    /// (k̂·n)²
    Rsd,
    /// -i (k̂·n) / k
    Velocity,
    /// -1 / k²
    Potential,
}

const I00: NlTerm = NlTerm::new(0, 0);
const I02: NlTerm = NlTerm::new(0, 2);
const I04: NlTerm = NlTerm::new(0, 4);
const I11: NlTerm = NlTerm::new(1, 1);
const I13: NlTerm = NlTerm::new(1, 3);
const I20: NlTerm = NlTerm::new(2, 0);
const I22: NlTerm = NlTerm::new(2, 2);
const I31: NlTerm = NlTerm::new(3, 1);
const I40: NlTerm = NlTerm::new(4, 0);

impl Operator {
    /// Integrals the correlator of `self` with `other` is built from
    pub fn terms_with(self, other: Operator) -> &'static [NlTerm] {
        use Operator::*;
        let (lo, hi) = if self <= other { (self, other) } else { (other, self) };
        match (lo, hi) {
            (Density, Density) => &[I00],
            (Density, Rsd) => &[I00, I02],
            (Rsd, Rsd) => &[I00, I02, I04],
            (Density, Velocity) => &[I11],
            (Rsd, Velocity) => &[I11, I13],
            (Velocity, Velocity) => &[I20, I22],
            (Density, Potential) => &[I20],
            (Rsd, Potential) => &[I20, I22],
            (Velocity, Potential) => &[I31],
            (Potential, Potential) => &[I40],
            // (lo, hi) is ordered, the remaining patterns cannot occur
            _ => &[],
        }
    }
}

/// Relative position of two points on rays n₁ and n₂.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairGeometry {
    /// |p₁ - p₂|
    pub distance: f64,
    pub a1: f64,
    pub a2: f64,
    /// n₁·n₂
    pub c: f64,
}

impl PairGeometry {
    /// Points λ₁n₁ and λ₂n₂ on two rays separated by the angle θ.
    pub fn along_rays(lambda1: f64, lambda2: f64, angle: f64) -> Self {
        let c = angle.cos();
        // 1 - c without cancellation at small angles
        let versine = 2.0 * (0.5 * angle).sin().powi(2);
        let radial = lambda1 - lambda2;
        // |d|² = (λ₁ - λ₂)² + 2λ₁λ₂(1 - c), d·n₁ = λ₁ - cλ₂, d·n₂ = cλ₁ - λ₂
        let distance = (radial * radial + 2.0 * lambda1 * lambda2 * versine)
            .max(0.0)
            .sqrt();
        let (a1, a2) = if distance > 0.0 {
            (
                ((radial + lambda2 * versine) / distance).clamp(-1.0, 1.0),
                ((radial - lambda1 * versine) / distance).clamp(-1.0, 1.0),
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            distance,
            a1,
            a2,
            c,
        }
    }
}

/// Correlation ⟨A(p₁) B(p₂)⟩ of two operators, with `s` returning the
/// scaled integral S^n_l at the pair distance.
pub fn correlator<S>(a: Operator, b: Operator, pair: &PairGeometry, mut s: S) -> Result<f64>
where
    S: FnMut(NlTerm) -> Result<f64>,
{
    use Operator::*;
    let PairGeometry { a1, a2, c, .. } = *pair;

    let value = match (a, b) {
        (Density, Density) => s(I00)?,
        (Density, Rsd) => (s(I00)? + s(I02)?) / 3.0 - s(I02)? * a2 * a2,
        (Rsd, Density) => (s(I00)? + s(I02)?) / 3.0 - s(I02)? * a1 * a1,
        (Rsd, Rsd) => {
            let (s00, s02, s04) = (s(I00)?, s(I02)?, s(I04)?);
            let f = s00 / 15.0 + 2.0 * s02 / 21.0 + s04 / 35.0;
            let g = -(s02 + s04) / 7.0;
            f * (1.0 + 2.0 * c * c) + g * (a1 * a1 + a2 * a2 + 4.0 * c * a1 * a2)
                + s04 * a1 * a1 * a2 * a2
        }
        (Density, Velocity) => -s(I11)? * a2,
        (Velocity, Density) => s(I11)? * a1,
        (Rsd, Velocity) => {
            let (s11, s13) = (s(I11)?, s(I13)?);
            -((s11 + s13) / 5.0 * (a2 + 2.0 * c * a1) - s13 * a1 * a1 * a2)
        }
        (Velocity, Rsd) => {
            let (s11, s13) = (s(I11)?, s(I13)?);
            (s11 + s13) / 5.0 * (a1 + 2.0 * c * a2) - s13 * a1 * a2 * a2
        }
        (Velocity, Velocity) => {
            let (s20, s22) = (s(I20)?, s(I22)?);
            (s20 + s22) * c / 3.0 - s22 * a1 * a2
        }
        (Density, Potential) | (Potential, Density) => -s(I20)?,
        (Rsd, Potential) => {
            let (s20, s22) = (s(I20)?, s(I22)?);
            -((s20 + s22) / 3.0 - s22 * a1 * a1)
        }
        (Potential, Rsd) => {
            let (s20, s22) = (s(I20)?, s(I22)?);
            -((s20 + s22) / 3.0 - s22 * a2 * a2)
        }
        (Velocity, Potential) => -s(I31)? * a1,
        (Potential, Velocity) => s(I31)? * a2,
        (Potential, Potential) => s(I40)?,
    };
    Ok(value)
}

/// One term of the number counts: operator and coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub operator: Operator,
    pub coefficient: f64,
}

impl Term {
    fn new(operator: Operator, coefficient: f64) -> Self {
        Self {
            operator,
            coefficient,
        }
    }
}

/// Positions of the two points of a grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub chi1: f64,
    pub chi2: f64,
    pub z1: f64,
    pub z2: f64,
    /// Angle between the two lines of sight
    pub angle: f64,
}

impl Geometry {
    /// Observer at the origin, mean direction ẑ at χ̄ = χ(z̄), separation
    /// direction ŝ = (√(1-μ²), 0, μ); x₁ = χ̄ẑ - (r/2)ŝ and x₂ = χ̄ẑ + (r/2)ŝ.
    pub fn new(background: &dyn Background, z_mean: f64, separation: f64, mu: f64) -> Result<Self> {
        let chi_mean = background.comoving_distance(z_mean)?;
        let sin = (1.0 - mu * mu).max(0.0).sqrt();
        let half = 0.5 * separation;
        let x1 = [-half * sin, 0.0, chi_mean - half * mu];
        let x2 = [half * sin, 0.0, chi_mean + half * mu];
        let chi1 = norm(&x1);
        let chi2 = norm(&x2);
        if !(chi1 > 0.0 && chi2 > 0.0) {
            return Err(CoffeError::invalid(format!(
                "separation {} at z_mean {} puts a point at the observer",
                separation, z_mean
            )));
        }
        // θ = 2 asin(|n₁ - n₂| / 2)
        let chord = norm(&[
            x1[0] / chi1 - x2[0] / chi2,
            x1[1] / chi1 - x2[1] / chi2,
            x1[2] / chi1 - x2[2] / chi2,
        ]);
        let angle = 2.0 * (0.5 * chord).min(1.0).asin();
        Ok(Self {
            chi1,
            chi2,
            z1: background.redshift_at_distance(chi1)?,
            z2: background.redshift_at_distance(chi2)?,
            angle,
        })
    }

    /// Pair geometry of the points at distances λ₁, λ₂ along the two rays
    pub fn pair(&self, lambda1: f64, lambda2: f64) -> PairGeometry {
        PairGeometry::along_rays(lambda1, lambda2, self.angle)
    }

    /// n₁·n₂
    pub fn cos_angle(&self) -> f64 {
        self.angle.cos()
    }
}

fn norm(x: &[f64; 3]) -> f64 {
    (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]).sqrt()
}

/// (3/2) Ωm H0²
fn poisson_factor(parameters: &Parameters) -> f64 {
    1.5 * parameters.cosmology().omega_matter() * HUBBLE_CONSTANT * HUBBLE_CONSTANT
}

/// Source quantities entering the coefficients of one population.
#[derive(Debug, Clone, Copy)]
struct Source {
    chi: f64,
    /// magnification bias s
    s: f64,
    /// evolution bias f_evo
    f_evo: f64,
    /// ℋ'/ℋ² + (2-5s)/(χℋ) + 5s - f_evo
    alpha: f64,
}

impl Source {
    fn new(
        parameters: &Parameters,
        background: &dyn Background,
        population: Population,
        z: f64,
        chi: f64,
    ) -> Result<Self> {
        let s = parameters.biases().magnification(population, z);
        let f_evo = parameters.biases().evolution(population, z);
        let curly_h = background.conformal_hubble_rate(z)?;
        let curly_h_prime = background.conformal_hubble_rate_prime(z)?;
        let alpha = curly_h_prime / (curly_h * curly_h) + (2.0 - 5.0 * s) / (chi * curly_h) + 5.0 * s
            - f_evo;
        Ok(Self {
            chi,
            s,
            f_evo,
            alpha,
        })
    }

    /// -(2-5s)/2 · 3ΩmH0²(1+z)D · (χ-λ)λ/χ, given the potential factor at λ
    fn lensing_weight(&self, lambda: f64, potential: f64) -> f64 {
        -(2.0 - 5.0 * self.s) / 2.0 * potential * (self.chi - lambda) * lambda / self.chi
    }
}

/// Active terms evaluated at the source of one population.
pub fn local_terms(
    parameters: &Parameters,
    background: &dyn Background,
    population: Population,
    z: f64,
    chi: f64,
) -> Result<Vec<Term>> {
    let flags = parameters.contributions();
    let mut terms = Vec::with_capacity(7);
    if !flags.any_local() {
        return Ok(terms);
    }

    let source = Source::new(parameters, background, population, z, chi)?;
    let d = background.growth_factor(z)?;
    let f = background.growth_rate(z)?;
    let curly_h = background.conformal_hubble_rate(z)?;
    let potential = poisson_factor(parameters) * (1.0 + z) * d;

    if flags.den {
        let b = parameters.biases().matter(population, z);
        terms.push(Term::new(Operator::Density, b * d));
    }
    if flags.rsd {
        terms.push(Term::new(Operator::Rsd, f * d));
    }
    if flags.d1 {
        terms.push(Term::new(Operator::Velocity, -source.alpha * curly_h * f * d));
    }
    if flags.d2 {
        terms.push(Term::new(
            Operator::Potential,
            (3.0 - source.f_evo) * curly_h * curly_h * f * d,
        ));
    }
    if flags.g1 {
        terms.push(Term::new(Operator::Potential, (1.0 + source.alpha) * potential));
    }
    if flags.g2 {
        terms.push(Term::new(Operator::Potential, (5.0 * source.s - 2.0) * potential));
    }
    if flags.g3 {
        terms.push(Term::new(Operator::Potential, (f - 1.0) * potential));
    }
    Ok(terms)
}

/// Kernels of the terms integrated along the line of sight of one source.
#[derive(Debug, Clone, Copy)]
pub struct IntegratedKernel {
    source: Option<Source>,
    len: bool,
    g4: bool,
    g5: bool,
    poisson: f64,
}

impl IntegratedKernel {
    pub fn new(
        parameters: &Parameters,
        background: &dyn Background,
        population: Population,
        z: f64,
        chi: f64,
    ) -> Result<Self> {
        let flags = parameters.contributions();
        let source = if flags.any_integrated() {
            Some(Source::new(parameters, background, population, z, chi)?)
        } else {
            None
        };
        Ok(Self {
            source,
            len: flags.len,
            g4: flags.g4,
            g5: flags.g5,
            poisson: poisson_factor(parameters),
        })
    }

    /// 3 Ωm H0² (1+z) D at redshift z
    fn potential(&self, background: &dyn Background, z: f64) -> Result<f64> {
        Ok(2.0 * self.poisson * (1.0 + z) * background.growth_factor(z)?)
    }

    /// Terms at distance λ along the line of sight; lensing contributes the
    /// pair (D, w) and (R, -w), the other terms act through the potential.
    pub fn terms_at(&self, background: &dyn Background, lambda: f64) -> Result<Vec<Term>> {
        let mut terms = Vec::with_capacity(4);
        let Some(source) = self.source else {
            return Ok(terms);
        };
        let z = background.redshift_at_distance(lambda)?;
        let potential = self.potential(background, z)?;

        if self.len {
            let w = source.lensing_weight(lambda, potential);
            terms.push(Term::new(Operator::Density, w));
            terms.push(Term::new(Operator::Rsd, -w));
        }
        if self.g4 {
            terms.push(Term::new(
                Operator::Potential,
                (2.0 - 5.0 * source.s) / source.chi * potential,
            ));
        }
        if self.g5 {
            let curly_h = background.conformal_hubble_rate(z)?;
            let f = background.growth_rate(z)?;
            terms.push(Term::new(
                Operator::Potential,
                (1.0 + source.alpha) * curly_h * (f - 1.0) * potential,
            ));
        }
        Ok(terms)
    }
}

/// Σ_ab c_a c_b ⟨A_a(p₁) B_b(p₂)⟩ over two lists of terms.
pub fn correlate_terms<S>(
    first: &[Term],
    second: &[Term],
    pair: &PairGeometry,
    mut s: S,
) -> Result<f64>
where
    S: FnMut(NlTerm, f64) -> Result<f64>,
{
    let mut total = 0.0;
    for a in first {
        for b in second {
            if a.coefficient == 0.0 || b.coefficient == 0.0 {
                continue;
            }
            let value = correlator(a.operator, b.operator, pair, |term| s(term, pair.distance))?;
            total += a.coefficient * b.coefficient * value;
        }
    }
    Ok(total)
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
