//! Spherical Bessel functions of the first kind and their small-argument
//! behaviour.
//!
//! Only non-negative integer orders are needed by the integral engine. For
//! arguments below the order the power series is used; above it the upward
//! recurrence from j_0 and j_1 is stable.

const MAX_ITER: usize = 200;

/// Double factorial (2l+1)!! = 1 · 3 · 5 ⋯ (2l+1)
pub fn odd_double_factorial(l: u32) -> f64 {
    (0..=l).map(|k| (2 * k + 1) as f64).product()
}

/// Leading small-argument term of j_l(x): x^l / (2l+1)!!
pub fn bessel_leading_term(l: u32, x: f64) -> f64 {
    x.powi(l as i32) / odd_double_factorial(l)
}

/// Power series of j_l(x) starting at the term `k_start`.
///
/// j_l(x) = x^l/(2l+1)!! Σ_k (−x²/2)^k / (k! (2l+3)(2l+5)⋯(2l+2k+1))
fn spherical_bessel_j_series(l: u32, x: f64, k_start: usize) -> f64 {
    let prefactor = bessel_leading_term(l, x);
    let half_x2 = 0.5 * x * x;
    let mut term = 1.0;
    let mut sum = if k_start == 0 { 1.0 } else { 0.0 };

    for k in 1..MAX_ITER {
        term *= -half_x2 / (k as f64 * (2 * l as usize + 2 * k + 1) as f64);
        if k >= k_start {
            sum += term;
            if term.abs() <= f64::EPSILON * sum.abs() {
                break;
            }
        }
    }

    prefactor * sum
}

/// Upward recurrence j_{n+1} = (2n+1)/x j_n − j_{n−1}, stable for x ≥ l
fn spherical_bessel_j_recurrence(l: u32, x: f64) -> f64 {
    let xinv = 1.0 / x;
    let s = x.sin();
    let c = x.cos();
    let mut s_j0 = s * xinv;
    if l == 0 {
        return s_j0;
    }
    let mut s_j1 = (s_j0 - c) * xinv;

    for n in 1..l {
        let next = (2 * n + 1) as f64 * xinv * s_j1 - s_j0;
        s_j0 = s_j1;
        s_j1 = next;
    }

    s_j1
}

fn series_cutoff(l: u32) -> f64 {
    (l as f64).max(1.0)
}

/// Spherical Bessel function of the first kind j_l(x)
///
/// Negative arguments follow from the parity j_l(−x) = (−1)^l j_l(x).
pub fn spherical_bessel_j(l: u32, x: f64) -> f64 {
    if x < 0.0 {
        let value = spherical_bessel_j(l, -x);
        return if l % 2 == 0 { value } else { -value };
    }
    if x < series_cutoff(l) {
        spherical_bessel_j_series(l, x, 0)
    } else {
        spherical_bessel_j_recurrence(l, x)
    }
}

/// j_l(x) with its leading power removed: j_l(x) − x^l/(2l+1)!!
///
/// Below the series cutoff the subtraction is done analytically by dropping
/// the first series term, so there is no cancellation at small x.
pub fn spherical_bessel_j_subtracted(l: u32, x: f64) -> f64 {
    if x.abs() < series_cutoff(l) {
        spherical_bessel_j_series(l, x, 1)
    } else {
        spherical_bessel_j(l, x) - bessel_leading_term(l, x)
    }
}
