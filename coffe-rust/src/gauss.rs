//! Gauss quadrature rules for numerical integration
//!
//! The integral of f(x) over [a, b] is approximated by the weighted sum
//!
//! sum(f(xi) * wi for (xi, wi) in zip(x, w))
//!
//! which converges superexponentially for smooth f(x) with the number of
//! points. Rules are built on [-1, 1] by [`legendre`] and moved to other
//! intervals with [`Rule::reseat`].

/// Quadrature rule for numerical integration.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Quadrature points (non-decreasing)
    pub x: Vec<f64>,
    /// Quadrature weights
    pub w: Vec<f64>,
    /// Left endpoint of integration interval
    pub a: f64,
    /// Right endpoint of integration interval
    pub b: f64,
}

impl Rule {
    /// Number of quadrature points
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Reseat the rule to a new interval [a, b].
    ///
    /// Scales and translates the quadrature points and weights to the new interval.
    pub fn reseat(&self, a: f64, b: f64) -> Self {
        let scaling = (b - a) / (self.b - self.a);
        let midpoint_old = 0.5 * (self.b + self.a);
        let midpoint_new = 0.5 * (b + a);

        Self {
            x: self
                .x
                .iter()
                .map(|&xi| scaling * (xi - midpoint_old) + midpoint_new)
                .collect(),
            w: self.w.iter().map(|&wi| wi * scaling).collect(),
            a,
            b,
        }
    }

    /// Apply the rule to `f`.
    pub fn integrate<F>(&self, mut f: F) -> f64
    where
        F: FnMut(f64) -> f64,
    {
        self.x.iter().zip(&self.w).map(|(&xi, &wi)| wi * f(xi)).sum()
    }
}

/// Compute Gauss-Legendre nodes and weights on [-1, 1] with Newton's method.
fn gauss_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    if n == 1 {
        return (vec![0.0], vec![2.0]);
    }

    let mut x = vec![0.0; n];
    let mut w = vec![0.0; n];
    let m = n.div_ceil(2);

    for i in 0..m {
        // Chebyshev-like initial guess, roots come out in descending order
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();

        for _ in 0..100 {
            let (p, dp) = legendre_polynomial_and_derivative(n, z);
            let step = p / dp;
            z -= step;
            if step.abs() < 1e-16 {
                break;
            }
        }

        let (_, dp) = legendre_polynomial_and_derivative(n, z);
        let weight = 2.0 / ((1.0 - z * z) * dp * dp);

        // fill symmetric pairs directly in ascending order
        x[i] = -z;
        w[i] = weight;
        x[n - 1 - i] = z;
        w[n - 1 - i] = weight;
    }
    if n % 2 == 1 {
        x[n / 2] = 0.0;
    }

    (x, w)
}

/// Legendre polynomial P_n(x) and its derivative from the three-term recurrence.
fn legendre_polynomial_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }

    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);

    (p1, dp)
}

/// Create a Gauss-Legendre quadrature rule with n points on [-1, 1].
///
/// # Arguments
/// * `n` - Number of quadrature points
pub fn legendre(n: usize) -> Rule {
    let (x, w) = gauss_legendre_nodes_weights(n);
    Rule {
        x,
        w,
        a: -1.0,
        b: 1.0,
    }
}

#[cfg(test)]
#[path = "gauss_tests.rs"]
mod tests;
