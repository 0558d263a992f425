//! Correlation assembler: the value of one contribution class at one
//! grid coordinate.

use crate::background::Background;
use crate::error::Result;
use crate::integrals::IntegralArray;
use crate::parameters::{NlTerm, Parameters, Population};
use crate::quadrature::{self, IntegrationMethod};
use crate::signal::{
    Geometry, IntegratedKernel, Operator, Term, correlate_terms, local_terms,
};

/// Contribution classes, by the number of line-of-sight integrals they need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegralType {
    NonIntegrated,
    SingleIntegrated,
    DoubleIntegrated,
}

impl IntegralType {
    /// In the order the grid driver runs them
    pub const ALL: [Self; 3] = [
        Self::NonIntegrated,
        Self::SingleIntegrated,
        Self::DoubleIntegrated,
    ];

    fn salt(self) -> u64 {
        match self {
            Self::NonIntegrated => 0,
            Self::SingleIntegrated => 1,
            Self::DoubleIntegrated => 2,
        }
    }
}

/// Contribution of `class` to ξ(z̄, r, μ).
///
/// Disabled terms contribute exactly zero; a class without active terms
/// returns `0.0` without touching the background.
///
/// # Errors
/// Domain errors from the background, `MissingIntegral` if `integrals` was
/// built for other contributions, and convergence failures of the line of
/// sight integrals.
pub fn evaluate(
    parameters: &Parameters,
    background: &dyn Background,
    integrals: &IntegralArray,
    z_mean: f64,
    separation: f64,
    mu: f64,
    class: IntegralType,
) -> Result<f64> {
    let flags = parameters.contributions();
    let active = match class {
        IntegralType::NonIntegrated => flags.any_local(),
        IntegralType::SingleIntegrated => flags.any_local() && flags.any_integrated(),
        IntegralType::DoubleIntegrated => flags.any_integrated(),
    };
    if !active {
        return Ok(0.0);
    }

    let geometry = Geometry::new(background, z_mean, separation, mu)?;
    let lookup = |term: NlTerm, r: f64| integrals.value(term, r);

    match class {
        IntegralType::NonIntegrated => {
            let first = local_terms(parameters, background, Population::First, geometry.z1, geometry.chi1)?;
            let second =
                local_terms(parameters, background, Population::Second, geometry.z2, geometry.chi2)?;
            let pair = geometry.pair(geometry.chi1, geometry.chi2);
            correlate_terms(&first, &second, &pair, lookup)
        }
        IntegralType::SingleIntegrated => single_integrated(parameters, background, integrals, &geometry),
        IntegralType::DoubleIntegrated => {
            let seed = quadrature::seed_from_values(&[z_mean, separation, mu], class.salt());
            double_integrated(parameters, background, integrals, &geometry, seed)
        }
    }
}

/// Local terms at one end, integrated terms along the other ray.
fn single_integrated(
    parameters: &Parameters,
    background: &dyn Background,
    integrals: &IntegralArray,
    geometry: &Geometry,
) -> Result<f64> {
    let settings = parameters.integration();
    let tol = settings.tolerance();
    // one-dimensional integrals never use Monte Carlo
    let method = match settings.method {
        IntegrationMethod::MonteCarlo => IntegrationMethod::TanhSinh,
        m => m,
    };
    let lookup = |term: NlTerm, r: f64| integrals.value(term, r);
    let cos = geometry.cos_angle();
    let (chi1, chi2) = (geometry.chi1, geometry.chi2);

    let local1 = local_terms(parameters, background, Population::First, geometry.z1, chi1)?;
    let local2 = local_terms(parameters, background, Population::Second, geometry.z2, chi2)?;
    let kernel1 = IntegratedKernel::new(parameters, background, Population::First, geometry.z1, chi1)?;
    let kernel2 = IntegratedKernel::new(parameters, background, Population::Second, geometry.z2, chi2)?;

    // local at x₁, integrated along n₂; closest approach at λ = χ₁ cos θ
    let along_second = quadrature::integrate_segments(
        method,
        |lambda| {
            let terms = kernel2.terms_at(background, lambda)?;
            correlate_terms(&local1, &terms, &geometry.pair(chi1, lambda), lookup)
        },
        &split_points(chi2, chi1 * cos),
        settings.bins,
        &tol,
    )?;

    let along_first = quadrature::integrate_segments(
        method,
        |lambda| {
            let terms = kernel1.terms_at(background, lambda)?;
            correlate_terms(&terms, &local2, &geometry.pair(lambda, chi2), lookup)
        },
        &split_points(chi1, chi2 * cos),
        settings.bins,
        &tol,
    )?;

    Ok(along_second + along_first)
}

/// [0, split, end] with the split dropped when it is not interior
fn split_points(end: f64, split: f64) -> Vec<f64> {
    if split > 0.0 && split < end {
        vec![0.0, split, end]
    } else {
        vec![0.0, end]
    }
}

/// Integrated terms along both rays.
fn double_integrated(
    parameters: &Parameters,
    background: &dyn Background,
    integrals: &IntegralArray,
    geometry: &Geometry,
    seed: u64,
) -> Result<f64> {
    let settings = parameters.integration();
    let tol = settings.tolerance();
    let (chi1, chi2) = (geometry.chi1, geometry.chi2);
    let kernel1 = IntegratedKernel::new(parameters, background, Population::First, geometry.z1, chi1)?;
    let kernel2 = IntegratedKernel::new(parameters, background, Population::Second, geometry.z2, chi2)?;
    let flat_sky = match integrals.flatsky_lensing() {
        Some(table) if parameters.flatsky_lensing() => Some(table),
        _ => None,
    };

    let integrand = |lambda1: f64, lambda2: f64| -> Result<f64> {
        let first = kernel1.terms_at(background, lambda1)?;
        let second = kernel2.terms_at(background, lambda2)?;
        let pair = geometry.pair(lambda1, lambda2);
        let lookup = |term: NlTerm, r: f64| integrals.value(term, r);

        let Some(table) = flat_sky else {
            return correlate_terms(&first, &second, &pair, lookup);
        };

        // lensing-lensing from the flat-sky table, everything else in full
        let (lens1, rest1) = split_lensing(first);
        let (lens2, rest2) = split_lensing(second);
        let mut value = correlate_terms(&rest1, &rest2, &pair, lookup)?
            + correlate_terms(&rest1, &lens2, &pair, lookup)?
            + correlate_terms(&lens1, &rest2, &pair, lookup)?;
        if let (Some(w1), Some(w2)) = (lensing_weight(&lens1), lensing_weight(&lens2)) {
            let x_par = lambda1 - lambda2;
            let x_perp = geometry.angle * 0.5 * (lambda1 + lambda2);
            value += w1 * w2 * table.flat_sky(x_perp, x_par);
        }
        Ok(value)
    };

    match settings.method {
        IntegrationMethod::MonteCarlo => {
            quadrature::monte_carlo(integrand, (0.0, chi1), (0.0, chi2), seed, &tol).map(|e| e.value)
        }
        method => {
            let cos = geometry.cos_angle();
            quadrature::nested(
                method,
                integrand,
                (0.0, chi1),
                (0.0, chi2),
                |lambda1| Some(cos * lambda1),
                settings.bins,
                &tol,
            )
        }
    }
}

/// Separate the lensing pair (D, w), (R, -w) from the potential terms
fn split_lensing(terms: Vec<Term>) -> (Vec<Term>, Vec<Term>) {
    terms
        .into_iter()
        .partition(|t| t.operator != Operator::Potential)
}

fn lensing_weight(lens: &[Term]) -> Option<f64> {
    lens.iter()
        .find(|t| t.operator == Operator::Density)
        .map(|t| t.coefficient)
}

#[cfg(test)]
#[path = "integrate_tests.rs"]
mod tests;
