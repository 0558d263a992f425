//! 2D interpolation over a rectangular grid
//!
//! Values are given in row-major order with x as the outer and y as the inner
//! index. Bicubic interpolation uses Hermite patches whose partial
//! derivatives come from natural cubic splines along each axis.

use crate::error::{CoffeError, Result};
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use mdarray::DTensor;
use serde::{Deserialize, Serialize};

/// Interpolation scheme used by [`Interpolate2D`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation2DMethod {
    Bilinear,
    #[default]
    Bicubic,
}

impl Interpolation2DMethod {
    fn min_points(self) -> usize {
        match self {
            Self::Bilinear => 2,
            Self::Bicubic => 3,
        }
    }
}

/// 2D interpolant over the grid x × y
#[derive(Debug, Clone)]
pub struct Interpolate2D {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Values, shape (x.len(), y.len())
    pub z: DTensor<f64, 2>,
    /// ∂z/∂x at the nodes (bicubic only)
    zx: DTensor<f64, 2>,
    /// ∂z/∂y at the nodes (bicubic only)
    zy: DTensor<f64, 2>,
    /// ∂²z/∂x∂y at the nodes (bicubic only)
    zxy: DTensor<f64, 2>,
    pub method: Interpolation2DMethod,
}

impl Interpolate2D {
    /// Create a new interpolant from grid values
    ///
    /// # Arguments
    /// * `x` - Outer grid nodes (strictly ascending)
    /// * `y` - Inner grid nodes (strictly ascending)
    /// * `z` - Values, `z[i * y.len() + j]` at `(x[i], y[j])`
    /// * `method` - Interpolation scheme
    pub fn new(x: &[f64], y: &[f64], z: &[f64], method: Interpolation2DMethod) -> Result<Self> {
        let (nx, ny) = (x.len(), y.len());
        if nx < method.min_points() || ny < method.min_points() {
            return Err(CoffeError::invalid(format!(
                "2D interpolation: {:?} needs at least {} points per axis, got {}x{}",
                method,
                method.min_points(),
                nx,
                ny
            )));
        }
        if z.len() != nx * ny {
            return Err(CoffeError::invalid(format!(
                "2D interpolation: expected {} values, got {}",
                nx * ny,
                z.len()
            )));
        }
        for (name, axis) in [("x", x), ("y", y)] {
            if axis.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(CoffeError::invalid(format!(
                    "2D interpolation: {} nodes are not strictly ascending",
                    name
                )));
            }
        }

        let values = DTensor::<f64, 2>::from_fn([nx, ny], |idx| z[idx[0] * ny + idx[1]]);
        let mut zx = DTensor::<f64, 2>::from_elem([nx, ny], 0.0);
        let mut zy = DTensor::<f64, 2>::from_elem([nx, ny], 0.0);
        let mut zxy = DTensor::<f64, 2>::from_elem([nx, ny], 0.0);

        if method == Interpolation2DMethod::Bicubic {
            for j in 0..ny {
                let column: Vec<f64> = (0..nx).map(|i| values[[i, j]]).collect();
                let spline = Interpolate1D::new(x, &column, InterpolationMethod::Cubic)?;
                for i in 0..nx {
                    zx[[i, j]] = spline.dydx[i];
                }
            }
            for i in 0..nx {
                let row: Vec<f64> = (0..ny).map(|j| values[[i, j]]).collect();
                let spline = Interpolate1D::new(y, &row, InterpolationMethod::Cubic)?;
                for j in 0..ny {
                    zy[[i, j]] = spline.dydx[j];
                }
            }
            for j in 0..ny {
                let column: Vec<f64> = (0..nx).map(|i| zy[[i, j]]).collect();
                let spline = Interpolate1D::new(x, &column, InterpolationMethod::Cubic)?;
                for i in 0..nx {
                    zxy[[i, j]] = spline.dydx[i];
                }
            }
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            z: values,
            zx,
            zy,
            zxy,
            method,
        })
    }

    /// Evaluate at (x, y).
    ///
    /// Points outside the rectangle are clamped to it and extrapolated
    /// linearly along the gradient at the clamped point.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let (x_min, x_max, y_min, y_max) = self.domain();
        let xc = x.clamp(x_min, x_max);
        let yc = y.clamp(y_min, y_max);
        let (value, dx, dy) = self.patch(xc, yc);
        value + dx * (x - xc) + dy * (y - yc)
    }

    /// Get domain boundaries (x_min, x_max, y_min, y_max)
    pub fn domain(&self) -> (f64, f64, f64, f64) {
        (
            self.x[0],
            self.x[self.x.len() - 1],
            self.y[0],
            self.y[self.y.len() - 1],
        )
    }

    /// Get the number of interpolation points in x direction
    pub fn n_points_x(&self) -> usize {
        self.x.len()
    }

    /// Get the number of interpolation points in y direction
    pub fn n_points_y(&self) -> usize {
        self.y.len()
    }

    /// Value and gradient inside the grid.
    fn patch(&self, x: f64, y: f64) -> (f64, f64, f64) {
        let i = cell(&self.x, x);
        let j = cell(&self.y, y);
        let hx = self.x[i + 1] - self.x[i];
        let hy = self.y[j + 1] - self.y[j];
        let t = (x - self.x[i]) / hx;
        let u = (y - self.y[j]) / hy;

        match self.method {
            Interpolation2DMethod::Bilinear => {
                let z00 = self.z[[i, j]];
                let z10 = self.z[[i + 1, j]];
                let z01 = self.z[[i, j + 1]];
                let z11 = self.z[[i + 1, j + 1]];
                let value = (1.0 - t) * (1.0 - u) * z00
                    + t * (1.0 - u) * z10
                    + (1.0 - t) * u * z01
                    + t * u * z11;
                let dx = ((1.0 - u) * (z10 - z00) + u * (z11 - z01)) / hx;
                let dy = ((1.0 - t) * (z01 - z00) + t * (z11 - z10)) / hy;
                (value, dx, dy)
            }
            Interpolation2DMethod::Bicubic => {
                let (vt, dvt) = hermite_basis(t);
                let (vu, dvu) = hermite_basis(u);
                let mut value = 0.0;
                let mut dx = 0.0;
                let mut dy = 0.0;
                for a in 0..2 {
                    for b in 0..2 {
                        let (ia, jb) = (i + a, j + b);
                        let f = self.z[[ia, jb]];
                        let fx = self.zx[[ia, jb]] * hx;
                        let fy = self.zy[[ia, jb]] * hy;
                        let fxy = self.zxy[[ia, jb]] * hx * hy;
                        // vt[a] value basis, vt[2 + a] slope basis at end a
                        value += vt[a] * vu[b] * f
                            + vt[2 + a] * vu[b] * fx
                            + vt[a] * vu[2 + b] * fy
                            + vt[2 + a] * vu[2 + b] * fxy;
                        dx += dvt[a] * vu[b] * f
                            + dvt[2 + a] * vu[b] * fx
                            + dvt[a] * vu[2 + b] * fy
                            + dvt[2 + a] * vu[2 + b] * fxy;
                        dy += vt[a] * dvu[b] * f
                            + vt[2 + a] * dvu[b] * fx
                            + vt[a] * dvu[2 + b] * fy
                            + vt[2 + a] * dvu[2 + b] * fxy;
                    }
                }
                (value, dx / hx, dy / hy)
            }
        }
    }
}

/// Index of the cell [v_i, v_{i+1}] holding `v` (v inside the grid)
fn cell(nodes: &[f64], v: f64) -> usize {
    let upper = nodes.partition_point(|&n| n <= v);
    upper.saturating_sub(1).min(nodes.len() - 2)
}

/// Cubic Hermite basis on [0, 1] and its derivative:
/// [h00, h01, h10, h11] (value at 0, value at 1, slope at 0, slope at 1)
fn hermite_basis(t: f64) -> ([f64; 4], [f64; 4]) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        [
            2.0 * t3 - 3.0 * t2 + 1.0,
            -2.0 * t3 + 3.0 * t2,
            t3 - 2.0 * t2 + t,
            t3 - t2,
        ],
        [
            6.0 * t2 - 6.0 * t,
            -6.0 * t2 + 6.0 * t,
            3.0 * t2 - 4.0 * t + 1.0,
            3.0 * t2 - 2.0 * t,
        ],
    )
}

#[cfg(test)]
#[path = "interpolation2d_tests.rs"]
mod tests;
