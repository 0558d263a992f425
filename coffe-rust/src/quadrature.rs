//! Adaptive one- and two-dimensional quadrature
//!
//! * tanh-sinh (double exponential) with level refinement, the workhorse for
//!   the Bessel transforms and the line-of-sight integrals
//! * Gauss-Legendre with order doubling
//! * plain Monte Carlo over a rectangle, seeded from the caller so runs are
//!   reproducible
//!
//! Every routine returns a `ConvergenceError` when an estimate is not finite
//! or the requested tolerance is not met within the level budget.

use crate::error::{CoffeError, Result};
use crate::gauss::{Rule, legendre};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::sync::{Arc, PoisonError, RwLock};

/// Quadrature scheme selectable from the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    #[default]
    TanhSinh,
    GaussLegendre,
    MonteCarlo,
}

/// Stopping criteria shared by all schemes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub relative: f64,
    pub absolute: f64,
    /// Refinement levels (tanh-sinh), order doublings (Gauss-Legendre) or
    /// sample doublings (Monte Carlo) before giving up
    pub max_levels: usize,
}

impl Tolerance {
    /// Largest acceptable error for an integral with the given L1 norm
    fn target(&self, l1_norm: f64) -> f64 {
        self.absolute.max(self.relative * l1_norm)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: 1e-4,
            absolute: 0.0,
            max_levels: 10,
        }
    }
}

/// Value of an integral with its error estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
    /// ∫|f|, the scale the relative tolerance refers to
    pub l1_norm: f64,
}

impl Estimate {
    const ZERO: Self = Self {
        value: 0.0,
        error: 0.0,
        l1_norm: 0.0,
    };
}

fn not_converged(what: &'static str, estimate: f64, error: f64, tolerance: f64) -> CoffeError {
    CoffeError::Convergence {
        what,
        estimate,
        error,
        tolerance,
    }
}

// ---------------------------------------------------------------------------
// tanh-sinh
// ---------------------------------------------------------------------------

/// Deepest level held in the node table
const TANH_SINH_LEVELS: usize = 12;
/// Abscissae are truncated at |t| = T_MAX, where 1 - tanh(π/2 sinh t) ~ 1e-37
const T_MAX: f64 = 4.0;

/// Node with its distance to the nearest endpoint on [-1, 1] and its weight.
#[derive(Debug, Clone, Copy)]
struct TanhSinhNode {
    delta: f64,
    weight: f64,
}

/// Nodes for t > 0 introduced at each level; level 0 holds t = 1, 2, …
/// and level m > 0 the odd multiples of 2^-m.
static TANH_SINH_TABLE: Lazy<Vec<Vec<TanhSinhNode>>> = Lazy::new(|| {
    (0..=TANH_SINH_LEVELS)
        .map(|level| {
            let h = 0.5_f64.powi(level as i32);
            let (start, stride) = if level == 0 { (1, 1) } else { (1, 2) };
            let mut nodes = Vec::new();
            let mut k = start;
            loop {
                let t = k as f64 * h;
                if t > T_MAX {
                    break;
                }
                let u = FRAC_PI_2 * t.sinh();
                let cosh_u = u.cosh();
                nodes.push(TanhSinhNode {
                    // 1 - tanh(u) without cancellation
                    delta: 1.0 / (u.exp() * cosh_u),
                    weight: FRAC_PI_2 * t.cosh() / (cosh_u * cosh_u),
                });
                k += stride;
            }
            nodes
        })
        .collect()
});

/// Integrate `f` over [a, b] with the tanh-sinh rule.
///
/// The integrand is never evaluated at the endpoints, so integrable endpoint
/// singularities are handled. `tol.max_levels` is capped at the table depth.
pub fn tanh_sinh<F>(mut f: F, a: f64, b: f64, tol: &Tolerance) -> Result<Estimate>
where
    F: FnMut(f64) -> Result<f64>,
{
    if a == b {
        return Ok(Estimate::ZERO);
    }
    let half = 0.5 * (b - a);
    let mid = 0.5 * (a + b);
    let max_levels = tol.max_levels.clamp(1, TANH_SINH_LEVELS);

    let centre = f(mid)?;
    let mut sum = FRAC_PI_2 * centre;
    let mut sum_abs = FRAC_PI_2 * centre.abs();
    let mut add_level = |level: usize, sum: &mut f64, sum_abs: &mut f64| -> Result<()> {
        for node in &TANH_SINH_TABLE[level] {
            let offset = half * node.delta;
            let (left, right) = (f(a + offset)?, f(b - offset)?);
            *sum += node.weight * (left + right);
            *sum_abs += node.weight * (left.abs() + right.abs());
        }
        Ok(())
    };

    add_level(0, &mut sum, &mut sum_abs)?;
    let mut previous = half * sum;
    if !previous.is_finite() {
        return Err(not_converged("tanh-sinh quadrature", previous, f64::INFINITY, 0.0));
    }

    let mut error = f64::INFINITY;
    let mut l1_norm = half.abs() * sum_abs;
    for level in 1..=max_levels {
        add_level(level, &mut sum, &mut sum_abs)?;
        let h = 0.5_f64.powi(level as i32);
        let estimate = half * sum * h;
        l1_norm = half.abs() * sum_abs * h;
        if !estimate.is_finite() || !l1_norm.is_finite() {
            return Err(not_converged("tanh-sinh quadrature", estimate, f64::INFINITY, 0.0));
        }
        error = (estimate - previous).abs();
        // two agreeing levels are needed before the error estimate is trusted
        if level >= 2 && error <= tol.target(l1_norm) {
            return Ok(Estimate {
                value: estimate,
                error,
                l1_norm,
            });
        }
        previous = estimate;
    }

    Err(not_converged(
        "tanh-sinh quadrature",
        previous,
        error,
        tol.target(l1_norm),
    ))
}

// ---------------------------------------------------------------------------
// Gauss-Legendre
// ---------------------------------------------------------------------------

static LEGENDRE_RULES: Lazy<RwLock<HashMap<usize, Arc<Rule>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Cached n-point Gauss-Legendre rule on [-1, 1]
pub fn legendre_cached(n: usize) -> Arc<Rule> {
    if let Some(rule) = LEGENDRE_RULES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&n)
    {
        return Arc::clone(rule);
    }
    let rule = Arc::new(legendre(n));
    LEGENDRE_RULES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(n)
        .or_insert(rule)
        .clone()
}

/// Value and L1 norm of `f` under the n-point rule on [a, b]
fn gauss_legendre_fixed<F>(f: &mut F, a: f64, b: f64, n: usize) -> Result<(f64, f64)>
where
    F: FnMut(f64) -> Result<f64>,
{
    let rule = legendre_cached(n).reseat(a, b);
    let mut value = 0.0;
    let mut l1_norm = 0.0;
    for (&x, &w) in rule.x.iter().zip(&rule.w) {
        let v = f(x)?;
        value += w * v;
        l1_norm += (w * v).abs();
    }
    Ok((value, l1_norm))
}

/// Integrate `f` over [a, b] with Gauss-Legendre rules of order
/// `order`, 2·`order`, 4·`order`, … until two successive orders agree.
pub fn gauss_legendre<F>(mut f: F, a: f64, b: f64, order: usize, tol: &Tolerance) -> Result<Estimate>
where
    F: FnMut(f64) -> Result<f64>,
{
    if a == b {
        return Ok(Estimate::ZERO);
    }
    let mut n = order.max(2);
    let (mut previous, mut l1_norm) = gauss_legendre_fixed(&mut f, a, b, n)?;
    let mut error = f64::INFINITY;

    for _ in 0..tol.max_levels.max(1) {
        n *= 2;
        let (estimate, norm) = gauss_legendre_fixed(&mut f, a, b, n)?;
        l1_norm = norm;
        if !estimate.is_finite() || !l1_norm.is_finite() {
            return Err(not_converged(
                "Gauss-Legendre quadrature",
                estimate,
                f64::INFINITY,
                0.0,
            ));
        }
        error = (estimate - previous).abs();
        if error <= tol.target(l1_norm) {
            return Ok(Estimate {
                value: estimate,
                error,
                l1_norm,
            });
        }
        previous = estimate;
    }

    Err(not_converged(
        "Gauss-Legendre quadrature",
        previous,
        error,
        tol.target(l1_norm),
    ))
}

/// One-dimensional integral with the chosen scheme.
///
/// # Errors
/// `InvalidInput` for [`IntegrationMethod::MonteCarlo`], which is only
/// defined for the two-dimensional integrals.
pub fn integrate<F>(
    method: IntegrationMethod,
    f: F,
    a: f64,
    b: f64,
    order: usize,
    tol: &Tolerance,
) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    match method {
        IntegrationMethod::TanhSinh => tanh_sinh(f, a, b, tol).map(|e| e.value),
        IntegrationMethod::GaussLegendre => gauss_legendre(f, a, b, order, tol).map(|e| e.value),
        IntegrationMethod::MonteCarlo => Err(CoffeError::invalid(
            "Monte Carlo integration is only available for double integrals",
        )),
    }
}

/// Sum of `integrate` over consecutive segments [points[i], points[i+1]];
/// empty segments are skipped.
pub fn integrate_segments<F>(
    method: IntegrationMethod,
    mut f: F,
    points: &[f64],
    order: usize,
    tol: &Tolerance,
) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    let mut total = 0.0;
    for seg in points.windows(2) {
        if seg[1] > seg[0] {
            total += integrate(method, &mut f, seg[0], seg[1], order, tol)?;
        }
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// two dimensions
// ---------------------------------------------------------------------------

/// Iterated integral ∫_{a1}^{b1} dx ∫_{a2}^{b2} dy f(x, y).
///
/// `split(x)` may return an interior point of [a2, b2] where the inner
/// integrand is not smooth; the inner integral is then done in two pieces.
pub fn nested<F, S>(
    method: IntegrationMethod,
    f: F,
    (a1, b1): (f64, f64),
    (a2, b2): (f64, f64),
    split: S,
    order: usize,
    tol: &Tolerance,
) -> Result<f64>
where
    F: Fn(f64, f64) -> Result<f64>,
    S: Fn(f64) -> Option<f64>,
{
    integrate(
        method,
        |x| {
            let mut points = vec![a2];
            if let Some(s) = split(x).filter(|&s| s > a2 && s < b2) {
                points.push(s);
            }
            points.push(b2);
            integrate_segments(method, |y| f(x, y), &points, order, tol)
        },
        a1,
        b1,
        order,
        tol,
    )
}

/// Samples drawn before the first convergence check
const MC_BASE_SAMPLES: usize = 4096;

/// Plain Monte Carlo over the rectangle [a1, b1] × [a2, b2].
///
/// The sample count doubles until the standard error meets the tolerance;
/// earlier samples are kept. Identical seeds give identical results.
pub fn monte_carlo<F>(
    f: F,
    (a1, b1): (f64, f64),
    (a2, b2): (f64, f64),
    seed: u64,
    tol: &Tolerance,
) -> Result<Estimate>
where
    F: Fn(f64, f64) -> Result<f64>,
{
    let volume = (b1 - a1) * (b2 - a2);
    if volume == 0.0 {
        return Ok(Estimate::ZERO);
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut sum = 0.0;
    let mut sum_abs = 0.0;
    let mut sum_sq = 0.0;
    let mut drawn = 0usize;
    let mut target = MC_BASE_SAMPLES;
    let mut estimate = Estimate {
        value: 0.0,
        error: f64::INFINITY,
        l1_norm: 0.0,
    };

    for _ in 0..=tol.max_levels {
        while drawn < target {
            let x = a1 + (b1 - a1) * rng.random::<f64>();
            let y = a2 + (b2 - a2) * rng.random::<f64>();
            let v = f(x, y)?;
            sum += v;
            sum_abs += v.abs();
            sum_sq += v * v;
            drawn += 1;
        }
        let n = drawn as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        estimate = Estimate {
            value: volume * mean,
            error: volume.abs() * (variance / n).sqrt(),
            l1_norm: volume.abs() * sum_abs / n,
        };
        if !estimate.value.is_finite() || !estimate.error.is_finite() {
            return Err(not_converged(
                "Monte Carlo integration",
                estimate.value,
                estimate.error,
                0.0,
            ));
        }
        if estimate.error <= tol.target(estimate.l1_norm) {
            return Ok(estimate);
        }
        target *= 2;
    }

    Err(not_converged(
        "Monte Carlo integration",
        estimate.value,
        estimate.error,
        tol.target(estimate.l1_norm),
    ))
}

/// Mix a list of floating point values into a 64 bit seed (splitmix64).
pub fn seed_from_values(values: &[f64], salt: u64) -> u64 {
    let mut state = salt ^ 0x9E37_79B9_7F4A_7C15;
    for v in values {
        state = splitmix64(state ^ v.to_bits());
    }
    state
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
#[path = "quadrature_tests.rs"]
mod tests;
