//! Integral engine
//!
//! Tabulates, on a grid of separations, the Bessel transforms
//!
//! S^n_l(r) = r^n I^n_l(r) = 1/(2π²) ∫ dk k^{2-n} P(k) j_l(kr)
//!
//! for every (n, l) the active contributions need. The r^n scaling keeps all
//! entries finite at r = 0. Transforms with n > l are dominated by small k;
//! for those the leading power (kr)^l/(2l+1)!! of the Bessel function is
//! removed from the integrand where kr < 1, and its contribution
//! C(r) r^l/(2l+1)!! over that range is tabulated separately, so
//! [`Integral::value`] still returns the full transform. Above kr = 1 the
//! integrand is left alone, which keeps the two parts from growing into
//! large cancelling terms at large separations.
//!
//! With the flat-sky lensing option a 2D table of the lensing-lensing
//! correlator is built as well.

use crate::background::Background;
use crate::error::{CoffeError, Result};
use crate::error_policy::ErrorPolicy;
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use crate::interpolation2d::{Interpolate2D, Interpolation2DMethod};
use crate::parameters::{NlTerm, Parameters};
use crate::quadrature::{self, IntegrationMethod, Tolerance};
use crate::signal::{Operator, PairGeometry, correlator};
use crate::special_functions::{
    odd_double_factorial, spherical_bessel_j, spherical_bessel_j_subtracted,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, info};

/// 1/(2π²)
const FOURIER_NORMALIZATION: f64 = 1.0 / (2.0 * PI * PI);
/// Geometric growth of the k panels
const PANEL_GROWTH: f64 = 1.5;
/// Smallest non-zero separation of the grid, as a fraction of the largest
const SMALLEST_SEPARATION_FRACTION: f64 = 1e-5;
/// kr below which renormalized transforms subtract the leading power of j_l
const RENORMALIZATION_CUTOFF: f64 = 1.0;

/// How the tabulated transform relates to the full one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renormalization {
    /// `result` is the transform itself
    None,
    /// Lensing-lensing table in flat-sky coordinates
    FlatSkyLensingLensing,
    /// `result` lacks the small-k add-back held in `renormalization0`
    General,
}

/// One tabulated transform.
#[derive(Debug, Clone)]
pub struct Integral {
    /// Regularized transform against separation
    pub result: Interpolate1D,
    /// G(x⊥, x∥) for [`Renormalization::FlatSkyLensingLensing`]
    pub renormalization: Option<Interpolate2D>,
    /// Add-back C(r) r^l/(2l+1)!! for [`Renormalization::General`]
    pub renormalization0: Option<Interpolate1D>,
    pub mode: Renormalization,
}

impl Integral {
    /// Full scaled transform S^n_l(r)
    pub fn value(&self, r: f64) -> f64 {
        let regular = self.result.evaluate(r);
        match (&self.mode, &self.renormalization0) {
            (Renormalization::General, Some(add_back)) => regular + add_back.evaluate(r),
            _ => regular,
        }
    }

    /// Lensing-lensing correlator at transverse and radial separations;
    /// G is even in x∥.
    pub fn flat_sky(&self, x_perp: f64, x_par: f64) -> f64 {
        match &self.renormalization {
            Some(table) => table.evaluate(x_perp, x_par.abs()),
            None => self.result.evaluate(x_perp),
        }
    }
}

/// Transforms for all required (n, l), plus the optional flat-sky table.
#[derive(Debug, Clone)]
pub struct IntegralArray {
    order: Vec<NlTerm>,
    entries: HashMap<NlTerm, Integral>,
    flatsky: Option<Integral>,
    separations: Vec<f64>,
}

impl IntegralArray {
    /// # Errors
    /// `MissingIntegral` if (n, l) was not computed.
    pub fn get(&self, term: NlTerm) -> Result<&Integral> {
        self.entries
            .get(&term)
            .ok_or(CoffeError::MissingIntegral {
                n: term.n,
                l: term.l,
            })
    }

    /// S^n_l(r)
    pub fn value(&self, term: NlTerm, r: f64) -> Result<f64> {
        Ok(self.get(term)?.value(r))
    }

    /// Keys in the order of `Parameters::nonzero_terms`
    pub fn terms(&self) -> &[NlTerm] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (NlTerm, &Integral)> {
        self.order
            .iter()
            .filter_map(|t| self.entries.get(t).map(|i| (*t, i)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn flatsky_lensing(&self) -> Option<&Integral> {
        self.flatsky.as_ref()
    }

    /// Separation grid the transforms are tabulated on
    pub fn separations(&self) -> &[f64] {
        &self.separations
    }
}

/// Largest separation any contribution will look up.
///
/// Local terms only need the grid separations. Integrated terms reach
/// pairs anywhere on the two lines of sight, up to χ₁ + χ₂ ≤ 2χ(z̄) + r.
pub fn max_separation(parameters: &Parameters, background: &dyn Background) -> Result<f64> {
    let r_max = parameters.separation().max();
    if parameters.contributions().any_integrated() {
        Ok(2.0 * background.comoving_distance(parameters.z_mean().max())? + r_max)
    } else {
        Ok(r_max)
    }
}

/// r = 0 followed by `bins - 1` log-spaced points from r_max·10⁻⁵ to r_max.
pub fn separation_grid(r_max: f64, bins: usize) -> Vec<f64> {
    let mut grid = Vec::with_capacity(bins);
    grid.push(0.0);
    let points = bins.saturating_sub(1);
    let lo = (r_max * SMALLEST_SEPARATION_FRACTION).ln();
    let hi = r_max.ln();
    for i in 0..points {
        let t = if points > 1 {
            i as f64 / (points - 1) as f64
        } else {
            1.0
        };
        grid.push((lo + (hi - lo) * t).exp());
    }
    grid
}

/// Panel edges from k_min to k_max; each panel spans at most a factor
/// [`PANEL_GROWTH`] and at most half an oscillation π/r of the Bessel kernel.
pub fn panel_edges(k_min: f64, k_max: f64, r: f64) -> Vec<f64> {
    let half_period = if r > 0.0 { PI / r } else { f64::INFINITY };
    let mut edges = vec![k_min];
    let mut k = k_min;
    while k < k_max {
        let step = (k * (PANEL_GROWTH - 1.0)).min(half_period);
        k = (k + step).min(k_max);
        edges.push(k);
    }
    edges
}

/// Wavenumber below which a renormalized transform at `r` subtracts the
/// leading power of j_l
fn subtraction_cutoff(r: f64) -> f64 {
    if r > 0.0 {
        RENORMALIZATION_CUTOFF / r
    } else {
        f64::INFINITY
    }
}

/// Insert `k` into ascending `edges` when it lies strictly inside.
fn insert_edge(edges: &mut Vec<f64>, k: f64) {
    let (Some(&first), Some(&last)) = (edges.first(), edges.last()) else {
        return;
    };
    if k > first && k < last {
        let i = edges.partition_point(|&e| e < k);
        if edges[i] != k {
            edges.insert(i, k);
        }
    }
}

fn check_spectrum_domain(parameters: &Parameters) -> Result<()> {
    let (lo, hi) = parameters.power_spectrum().domain();
    for k in [parameters.k_min(), parameters.k_max()] {
        if k < lo || k > hi {
            return Err(CoffeError::Domain {
                what: "power spectrum wavenumber",
                value: k,
                min: lo,
                max: hi,
            });
        }
    }
    Ok(())
}

/// S^n_l(r) by direct quadrature. With `regularized` the leading power of
/// j_l is removed from the integrand for kr < 1.
pub fn transform(parameters: &Parameters, term: NlTerm, r: f64, regularized: bool) -> Result<f64> {
    let settings = parameters.integration();
    let tol = settings.tolerance();
    let l = term.l as u32;
    let power = 2 - term.n;
    let spectrum = parameters.power_spectrum();
    let cutoff = if regularized {
        subtraction_cutoff(r)
    } else {
        0.0
    };

    let integrand = |k: f64| -> Result<f64> {
        let x = k * r;
        let kernel = if k < cutoff {
            spherical_bessel_j_subtracted(l, x)
        } else {
            spherical_bessel_j(l, x)
        };
        Ok(k.powi(power) * spectrum.evaluate(k) * kernel)
    };

    let mut edges = panel_edges(parameters.k_min(), parameters.k_max(), r);
    insert_edge(&mut edges, cutoff);
    let total = quadrature::integrate_segments(
        settings.transform_method,
        integrand,
        &edges,
        settings.bins,
        &tol,
    )?;
    Ok(FOURIER_NORMALIZATION * total)
}

/// What the subtraction removed at `r`:
/// C(r) r^l/(2l+1)!! with C(r) = 1/(2π²) ∫ k^{2-n+l} P_norm(k) dk over
/// kr < 1, on the normalization spectrum's domain (or the main spectrum on
/// [k_min, k_max] when there is none).
fn add_back(parameters: &Parameters, term: NlTerm, r: f64) -> Result<f64> {
    let (spectrum, k_min, k_max) = match parameters.power_spectrum_norm() {
        Some(norm) => {
            let (lo, hi) = norm.domain();
            (norm, lo, hi)
        }
        None => (
            parameters.power_spectrum(),
            parameters.k_min(),
            parameters.k_max(),
        ),
    };
    let upper = k_max.min(subtraction_cutoff(r));
    if upper <= k_min {
        return Ok(0.0);
    }

    let power = 2 - term.n + term.l;
    let settings = parameters.integration();
    let integral = quadrature::integrate_segments(
        settings.transform_method,
        |k| Ok(k.powi(power) * spectrum.evaluate(k)),
        &panel_edges(k_min, upper, 0.0),
        settings.bins,
        &settings.tolerance(),
    )?;
    Ok(FOURIER_NORMALIZATION * integral * r.powi(term.l) / odd_double_factorial(term.l as u32))
}

fn compute_integral(parameters: &Parameters, term: NlTerm, grid: &[f64]) -> Result<Integral> {
    let divergent = term.is_divergent();
    let values = grid
        .par_iter()
        .map(|&r| transform(parameters, term, r, divergent))
        .collect::<Result<Vec<f64>>>()?;
    let method = parameters.integration().interpolation;
    let result = Interpolate1D::new(grid, &values, method)?;

    if !divergent {
        return Ok(Integral {
            result,
            renormalization: None,
            renormalization0: None,
            mode: Renormalization::None,
        });
    }

    let removed = grid
        .par_iter()
        .map(|&r| add_back(parameters, term, r))
        .collect::<Result<Vec<f64>>>()?;
    Ok(Integral {
        result,
        renormalization: None,
        renormalization0: Some(Interpolate1D::new(grid, &removed, method)?),
        mode: Renormalization::General,
    })
}

/// G(x⊥, x∥) = ⟨(δ - ∂∥²∇⁻²δ)(δ - ∂∥²∇⁻²δ)⟩ at separation (x⊥, x∥) along a
/// single line of sight, from S^0_0, S^0_2 and S^0_4.
fn lensing_correlator(integrals: &IntegralArray, x_perp: f64, x_par: f64) -> Result<f64> {
    let distance = x_perp.hypot(x_par);
    let a = if distance > 0.0 { x_par / distance } else { 0.0 };
    let pair = PairGeometry {
        distance,
        a1: a,
        a2: a,
        c: 1.0,
    };
    let s = |term: NlTerm| integrals.value(term, distance);
    let dd = correlator(Operator::Density, Operator::Density, &pair, s)?;
    let dr = correlator(Operator::Density, Operator::Rsd, &pair, s)?;
    let rr = correlator(Operator::Rsd, Operator::Rsd, &pair, s)?;
    Ok(dd - 2.0 * dr + rr)
}

fn flat_sky_lensing(
    parameters: &Parameters,
    integrals: &IntegralArray,
    grid: &[f64],
) -> Result<Integral> {
    // both flat-sky coordinates stay below χ_max ≈ r_max / 2
    let axis: Vec<f64> = grid.iter().map(|r| 0.5 * r).collect();
    let n = axis.len();

    let values = (0..n * n)
        .into_par_iter()
        .map(|idx| lensing_correlator(integrals, axis[idx / n], axis[idx % n]))
        .collect::<Result<Vec<f64>>>()?;
    let table = Interpolate2D::new(&axis, &axis, &values, Interpolation2DMethod::Bicubic)?;

    let coincident: Vec<f64> = (0..n).map(|i| values[i * n]).collect();
    let result = Interpolate1D::new(&axis, &coincident, parameters.integration().interpolation)?;

    Ok(Integral {
        result,
        renormalization: Some(table),
        renormalization0: None,
        mode: Renormalization::FlatSkyLensingLensing,
    })
}

/// Tabulate every integral `parameters` needs.
///
/// # Errors
/// * `DomainError` if the power spectrum does not cover [k_min, k_max]
/// * `InvalidInput` for unusable integration settings
/// * `Integral { n, l, .. }` wrapping the failure of a single transform,
///   typically a `ConvergenceError`; with
///   [`ErrorMode::Abort`](crate::ErrorMode::Abort) in the parameters this
///   panics instead
pub fn compute_all(parameters: &Parameters, background: &dyn Background) -> Result<IntegralArray> {
    parameters.integration().validate()?;
    check_spectrum_domain(parameters)?;

    let r_max = max_separation(parameters, background)?;
    let grid = separation_grid(r_max, parameters.integration().bessel_bins);
    let terms = parameters.nonzero_terms().to_vec();
    let pool = parameters.thread_pool()?;
    let policy = ErrorPolicy::new(parameters.error_mode());
    let started = Instant::now();
    info!(
        integrals = terms.len(),
        bins = grid.len(),
        r_max,
        threads = parameters.nthreads(),
        "computing integrals"
    );

    let mut entries = HashMap::with_capacity(terms.len());
    for &term in &terms {
        let t0 = Instant::now();
        let integral = pool
            .install(|| compute_integral(parameters, term, &grid))
            .map_err(|e| CoffeError::Integral {
                n: term.n,
                l: term.l,
                source: Box::new(e),
            })
            .or_else(|e| policy.raise(e))?;
        debug!(
            integral = %term,
            mode = ?integral.mode,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "integral done"
        );
        entries.insert(term, integral);
    }

    let mut array = IntegralArray {
        order: terms,
        entries,
        flatsky: None,
        separations: grid,
    };

    if parameters.flatsky_lensing() {
        let t0 = Instant::now();
        let table = pool
            .install(|| flat_sky_lensing(parameters, &array, &array.separations))
            .map_err(|e| CoffeError::Integral {
                n: 0,
                l: 0,
                source: Box::new(e),
            })
            .or_else(|e| policy.raise(e))?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "flat-sky lensing table done"
        );
        array.flatsky = Some(table);
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "integrals done"
    );
    Ok(array)
}

#[cfg(test)]
#[path = "integrals_tests.rs"]
mod tests;
