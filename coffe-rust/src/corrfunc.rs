//! Grid driver: the correlation function over the flattened
//! (z̄, μ, r) grid.

use crate::background::Background;
use crate::error::{CoffeError, Result};
use crate::error_policy::{ErrorMode, ErrorPolicy, ErrorPolicyGuard};
use crate::integrals::IntegralArray;
use crate::integrate::{IntegralType, evaluate};
use crate::parameters::Parameters;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// One grid coordinate and the correlation function there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationPoint {
    pub z_mean: f64,
    pub separation: f64,
    pub mu: f64,
    pub value: f64,
}

/// Correlation function on the flattened grid: z̄ outermost, then μ, then r.
#[derive(Debug, Clone, Default)]
pub struct CorrelationArray {
    points: Vec<CorrelationPoint>,
    /// (z̄, μ, r) axis lengths
    shape: (usize, usize, usize),
}

impl CorrelationArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid of `parameters` with every value set to zero
    pub fn grid(parameters: &Parameters) -> Self {
        let mut points = Vec::with_capacity(parameters.grid_size());
        for &z_mean in parameters.z_mean().values() {
            for &mu in parameters.mu().values() {
                for &separation in parameters.separation().values() {
                    points.push(CorrelationPoint {
                        z_mean,
                        separation,
                        mu,
                        value: 0.0,
                    });
                }
            }
        }
        Self {
            points,
            shape: (
                parameters.z_mean().len(),
                parameters.mu().len(),
                parameters.separation().len(),
            ),
        }
    }

    /// Drop the current contents
    pub fn release(&mut self) {
        self.points = Vec::new();
        self.shape = (0, 0, 0);
    }

    /// Recompute in place.
    ///
    /// The previous contents are released first, so after a failure the
    /// array is empty rather than holding stale values. Each contribution
    /// class runs as one parallel pass over the grid, and each pass
    /// completes before the next one adds to the same slots. During the
    /// passes numerical failures are reported as errors whatever
    /// [`Parameters::error_mode`] says.
    ///
    /// # Errors
    /// `Coordinate { z_mean, separation, mu, .. }` wrapping the first failure.
    pub fn compute(
        &mut self,
        parameters: &Parameters,
        background: &dyn Background,
        integrals: &IntegralArray,
    ) -> Result<()> {
        self.release();

        let mut grid = Self::grid(parameters);
        parameters
            .biases()
            .warn_if_extrapolated(parameters.z_mean().min(), parameters.z_mean().max());
        let pool = parameters.thread_pool()?;
        let started = Instant::now();
        info!(
            points = grid.len(),
            threads = parameters.nthreads(),
            "computing correlation function"
        );

        let mut policy = ErrorPolicy::new(parameters.error_mode());
        {
            let policy = ErrorPolicyGuard::acquire(&mut policy, ErrorMode::Report);
            for class in IntegralType::ALL {
                let t0 = Instant::now();
                pool.install(|| {
                    grid.points.par_iter_mut().try_for_each(|point| {
                        let value = evaluate(
                            parameters,
                            background,
                            integrals,
                            point.z_mean,
                            point.separation,
                            point.mu,
                            class,
                        )
                        .map_err(|e| CoffeError::Coordinate {
                            z_mean: point.z_mean,
                            separation: point.separation,
                            mu: point.mu,
                            source: Box::new(e),
                        })?;
                        point.value += value;
                        Ok::<(), CoffeError>(())
                    })
                })
                .or_else(|e| policy.raise(e))?;
                debug!(
                    class = ?class,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "pass done"
                );
            }
        }

        *self = grid;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "correlation function done"
        );
        Ok(())
    }

    pub fn points(&self) -> &[CorrelationPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [CorrelationPoint] {
        &mut self.points
    }

    /// Point at axis indices (z̄, μ, r)
    pub fn get(&self, z_index: usize, mu_index: usize, separation_index: usize) -> Option<&CorrelationPoint> {
        let (n_z, n_mu, n_r) = self.shape;
        if z_index >= n_z || mu_index >= n_mu || separation_index >= n_r {
            return None;
        }
        self.points
            .get((z_index * n_mu + mu_index) * n_r + separation_index)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }
}

/// Correlation function of `parameters` on a fresh array.
pub fn compute(
    parameters: &Parameters,
    background: &dyn Background,
    integrals: &IntegralArray,
) -> Result<CorrelationArray> {
    let mut array = CorrelationArray::new();
    array.compute(parameters, background, integrals)?;
    Ok(array)
}

#[cfg(test)]
#[path = "corrfunc_tests.rs"]
mod tests;
