//! 1D interpolation on a strictly ascending grid
//!
//! Every method is stored as a piecewise cubic Hermite polynomial: the node
//! values plus one derivative per node. Linear interpolation ignores the
//! derivatives inside the grid and uses the end secants outside of it.

use crate::error::{CoffeError, Result};
use serde::{Deserialize, Serialize};

/// Interpolation scheme used by [`Interpolate1D`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    Linear,
    /// Natural cubic spline (vanishing second derivative at both ends)
    #[default]
    Cubic,
    /// Monotonicity-preserving cubic (Steffen 1990)
    Steffen,
}

impl InterpolationMethod {
    /// Minimum number of nodes the method can be built from.
    pub fn min_points(self) -> usize {
        match self {
            Self::Linear => 2,
            Self::Cubic | Self::Steffen => 3,
        }
    }
}

/// 1D interpolant with pre-computed node derivatives
#[derive(Debug, Clone)]
pub struct Interpolate1D {
    /// Grid nodes (strictly ascending)
    pub x: Vec<f64>,
    /// Values at the nodes
    pub y: Vec<f64>,
    /// First derivative at the nodes
    pub dydx: Vec<f64>,
    pub method: InterpolationMethod,
}

impl Interpolate1D {
    /// Build an interpolant from tabulated values.
    ///
    /// # Arguments
    /// * `x` - Grid nodes, strictly ascending
    /// * `y` - Values at the nodes
    /// * `method` - Interpolation scheme
    ///
    /// # Errors
    /// `InvalidInput` if the lengths differ, there are fewer nodes than the
    /// method needs, or `x` is not strictly ascending.
    pub fn new(x: &[f64], y: &[f64], method: InterpolationMethod) -> Result<Self> {
        if x.len() != y.len() {
            return Err(CoffeError::invalid(format!(
                "interpolation: {} nodes but {} values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < method.min_points() {
            return Err(CoffeError::invalid(format!(
                "interpolation: {:?} needs at least {} points, got {}",
                method,
                method.min_points(),
                x.len()
            )));
        }
        if let Some(i) = (1..x.len()).find(|&i| !(x[i] > x[i - 1])) {
            return Err(CoffeError::invalid(format!(
                "interpolation: nodes not strictly ascending at index {} ({} after {})",
                i,
                x[i],
                x[i - 1]
            )));
        }

        let dydx = match method {
            InterpolationMethod::Linear => linear_slopes(x, y),
            InterpolationMethod::Cubic => natural_spline_slopes(x, y),
            InterpolationMethod::Steffen => steffen_slopes(x, y),
        };

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            dydx,
            method,
        })
    }

    /// Build from a function sampled on `x`.
    pub fn from_fn<F>(x: &[f64], method: InterpolationMethod, f: F) -> Result<Self>
    where
        F: Fn(f64) -> f64,
    {
        let y: Vec<f64> = x.iter().map(|&xi| f(xi)).collect();
        Self::new(x, &y, method)
    }

    /// Evaluate the interpolant at `x`.
    ///
    /// Outside the grid the value is extrapolated linearly with the
    /// derivative at the nearest end, so this never fails.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.y[0] + self.boundary_slope(0) * (x - self.x[0]);
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1] + self.boundary_slope(n - 1) * (x - self.x[n - 1]);
        }

        let i = self.interval(x);
        let h = self.x[i + 1] - self.x[i];
        let t = (x - self.x[i]) / h;

        if self.method == InterpolationMethod::Linear {
            return self.y[i] + t * (self.y[i + 1] - self.y[i]);
        }

        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * self.y[i] + h10 * h * self.dydx[i] + h01 * self.y[i + 1] + h11 * h * self.dydx[i + 1]
    }

    /// First derivative of the interpolant at `x` (boundary slope outside).
    pub fn derivative(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.boundary_slope(0);
        }
        if x >= self.x[n - 1] {
            return self.boundary_slope(n - 1);
        }

        let i = self.interval(x);
        let h = self.x[i + 1] - self.x[i];

        if self.method == InterpolationMethod::Linear {
            return (self.y[i + 1] - self.y[i]) / h;
        }

        let t = (x - self.x[i]) / h;
        let t2 = t * t;
        let dh00 = (6.0 * t2 - 6.0 * t) / h;
        let dh10 = 3.0 * t2 - 4.0 * t + 1.0;
        let dh01 = (-6.0 * t2 + 6.0 * t) / h;
        let dh11 = 3.0 * t2 - 2.0 * t;

        dh00 * self.y[i] + dh10 * self.dydx[i] + dh01 * self.y[i + 1] + dh11 * self.dydx[i + 1]
    }

    /// Whether `x` lies inside the tabulated range.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.x[0] && x <= self.x[self.x.len() - 1]
    }

    /// Get the domain boundaries
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Get the number of interpolation points
    pub fn n_points(&self) -> usize {
        self.x.len()
    }

    /// Index i of the interval [x_i, x_{i+1}] holding `x` (x strictly inside).
    fn interval(&self, x: f64) -> usize {
        let upper = self.x.partition_point(|&xi| xi <= x);
        upper.saturating_sub(1).min(self.x.len() - 2)
    }

    fn boundary_slope(&self, i: usize) -> f64 {
        match self.method {
            InterpolationMethod::Linear => {
                let n = self.x.len();
                if i == 0 {
                    (self.y[1] - self.y[0]) / (self.x[1] - self.x[0])
                } else {
                    (self.y[n - 1] - self.y[n - 2]) / (self.x[n - 1] - self.x[n - 2])
                }
            }
            _ => self.dydx[i],
        }
    }
}

fn secants(x: &[f64], y: &[f64]) -> Vec<f64> {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| (yw[1] - yw[0]) / (xw[1] - xw[0]))
        .collect()
}

fn linear_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let s = secants(x, y);
    let n = x.len();
    let mut d = Vec::with_capacity(n);
    d.push(s[0]);
    for i in 1..n - 1 {
        d.push(0.5 * (s[i - 1] + s[i]));
    }
    d.push(s[n - 2]);
    d
}

/// Node derivatives of the natural cubic spline through (x, y)
fn natural_spline_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let s = secants(x, y);

    // second derivatives m_1..m_{n-2} from the tridiagonal system, m_0 = m_{n-1} = 0
    let mut m = vec![0.0; n];
    let interior = n - 2;
    if interior > 0 {
        let mut diag = vec![0.0; interior];
        let mut rhs = vec![0.0; interior];
        for k in 0..interior {
            let i = k + 1;
            diag[k] = 2.0 * (h[i - 1] + h[i]);
            rhs[k] = 6.0 * (s[i] - s[i - 1]);
        }
        // Thomas algorithm, off-diagonals are h[i]
        for k in 1..interior {
            let w = h[k] / diag[k - 1];
            diag[k] -= w * h[k];
            rhs[k] -= w * rhs[k - 1];
        }
        m[interior] = rhs[interior - 1] / diag[interior - 1];
        for k in (0..interior - 1).rev() {
            m[k + 1] = (rhs[k] - h[k + 1] * m[k + 2]) / diag[k];
        }
    }

    let mut d = Vec::with_capacity(n);
    for i in 0..n - 1 {
        d.push(s[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0);
    }
    d.push(s[n - 2] + h[n - 2] * (m[n - 2] + 2.0 * m[n - 1]) / 6.0);
    d
}

/// Node derivatives of Steffen's monotone cubic
fn steffen_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let s = secants(x, y);
    let mut d = vec![0.0; n];

    for i in 1..n - 1 {
        let p = (s[i - 1] * h[i] + s[i] * h[i - 1]) / (h[i - 1] + h[i]);
        let bound = s[i - 1].abs().min(s[i].abs()).min(0.5 * p.abs());
        d[i] = (s[i - 1].signum() + s[i].signum()) * bound;
        if s[i - 1] == 0.0 || s[i] == 0.0 {
            d[i] = 0.0;
        }
    }

    let end_slope = |s0: f64, s1: f64, h0: f64, h1: f64| {
        let p = s0 * (1.0 + h0 / (h0 + h1)) - s1 * h0 / (h0 + h1);
        if p * s0 <= 0.0 {
            0.0
        } else if p.abs() > 2.0 * s0.abs() {
            2.0 * s0
        } else {
            p
        }
    };
    d[0] = end_slope(s[0], s[1], h[0], h[1]);
    d[n - 1] = end_slope(s[n - 2], s[n - 3], h[n - 2], h[n - 3]);
    d
}

#[cfg(test)]
#[path = "interpolation1d_tests.rs"]
mod tests;
