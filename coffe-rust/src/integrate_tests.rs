use super::*;
use crate::background::AnalyticBackground;
use crate::error::ErrorKind;
use crate::integrals::compute_all;
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use crate::parameters::{Axis, Contributions, Cosmology, IntegrationSettings};
use approx::assert_relative_eq;

fn background() -> AnalyticBackground {
    AnalyticBackground::new(&Cosmology::default(), 1.0, 200).unwrap()
}

fn parameters(contributions: Contributions, relative_tolerance: f64) -> Parameters {
    let k: Vec<f64> = (0..50).map(|i| 1e-3 * 200f64.powf(i as f64 / 49.0)).collect();
    let spectrum = Interpolate1D::from_fn(&k, InterpolationMethod::Linear, |k| 1e4 * k / (1.0 + 1e3 * k * k)).unwrap();
    let integration = IntegrationSettings {
        bessel_bins: 32,
        relative_tolerance,
        ..IntegrationSettings::default()
    };
    Parameters::new(
        Cosmology::default(),
        Axis::z_mean(vec![0.1]).unwrap(),
        Axis::mu(vec![0.0]).unwrap(),
        Axis::separation(vec![20.0]).unwrap(),
        spectrum,
    )
    .unwrap()
    .with_contributions(contributions)
    .with_integration(integration)
    .unwrap()
    .with_threads(2)
}

fn with_method(p: Parameters, method: IntegrationMethod) -> Parameters {
    let integration = IntegrationSettings {
        method,
        ..p.integration().clone()
    };
    p.with_integration(integration).unwrap()
}

#[test]
fn test_inactive_classes_are_zero() {
    let bg = background();
    let p = parameters(Contributions::density_only(), 1e-4);
    let integrals = compute_all(&p, &bg).unwrap();
    for class in [IntegralType::SingleIntegrated, IntegralType::DoubleIntegrated] {
        assert_eq!(evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.3, class).unwrap(), 0.0);
    }

    let p = parameters(
        Contributions {
            g4: true,
            ..Contributions::none()
        },
        1e-3,
    );
    let integrals = compute_all(&p, &bg).unwrap();
    for class in [IntegralType::NonIntegrated, IntegralType::SingleIntegrated] {
        assert_eq!(evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.3, class).unwrap(), 0.0);
    }
}

#[test]
fn test_transverse_density() {
    let bg = background();
    let p = parameters(Contributions::density_only(), 1e-4);
    let integrals = compute_all(&p, &bg).unwrap();
    let value = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.0, IntegralType::NonIntegrated).unwrap();

    let geometry = Geometry::new(&bg, 0.1, 20.0, 0.0).unwrap();
    let d = bg.growth_factor(geometry.z1).unwrap();
    let s00 = integrals.value(NlTerm::new(0, 0), 20.0).unwrap();
    assert_relative_eq!(value, d * d * s00, max_relative = 1e-10);
}

#[test]
fn test_exchange_of_points() {
    // identical populations: swapping x₁ and x₂ (μ → -μ) leaves ξ unchanged
    let bg = background();
    let p = parameters(
        Contributions {
            den: true,
            rsd: true,
            d1: true,
            g1: true,
            ..Contributions::none()
        },
        1e-4,
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let forward = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.6, IntegralType::NonIntegrated).unwrap();
    let backward = evaluate(&p, &bg, &integrals, 0.1, 20.0, -0.6, IntegralType::NonIntegrated).unwrap();
    assert_relative_eq!(forward, backward, max_relative = 1e-9);
}

#[test]
fn test_monte_carlo_is_deterministic() {
    let bg = background();
    let p = parameters(
        Contributions {
            g4: true,
            ..Contributions::none()
        },
        2e-2,
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let nested = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.5, IntegralType::DoubleIntegrated).unwrap();

    let p = with_method(p, IntegrationMethod::MonteCarlo);
    let first = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.5, IntegralType::DoubleIntegrated).unwrap();
    let second = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.5, IntegralType::DoubleIntegrated).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());
    assert_relative_eq!(first, nested, max_relative = 0.1);
}

#[test]
fn test_single_integrated_ignores_monte_carlo() {
    let bg = background();
    let p = parameters(
        Contributions {
            den: true,
            g4: true,
            ..Contributions::none()
        },
        1e-3,
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let tanh_sinh = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.5, IntegralType::SingleIntegrated).unwrap();
    assert!(tanh_sinh != 0.0);
    let p = with_method(p, IntegrationMethod::MonteCarlo);
    let substituted = evaluate(&p, &bg, &integrals, 0.1, 20.0, 0.5, IntegralType::SingleIntegrated).unwrap();
    assert_eq!(tanh_sinh, substituted);
}

#[test]
fn test_flat_sky_lensing_close_to_full_sky() {
    let bg = background();
    let lensing = Contributions {
        len: true,
        ..Contributions::none()
    };
    let full = parameters(lensing, 1e-3);
    let integrals = compute_all(&full, &bg).unwrap();
    let exact = evaluate(&full, &bg, &integrals, 0.1, 20.0, 0.0, IntegralType::DoubleIntegrated).unwrap();

    let flat = parameters(lensing, 1e-3).with_flatsky(true);
    let integrals = compute_all(&flat, &bg).unwrap();
    assert!(integrals.flatsky_lensing().is_some());
    let approx = evaluate(&flat, &bg, &integrals, 0.1, 20.0, 0.0, IntegralType::DoubleIntegrated).unwrap();
    assert!(exact > 0.0);
    assert_relative_eq!(approx, exact, max_relative = 0.1);
}

#[test]
fn test_out_of_range_redshift() {
    let bg = background();
    let p = parameters(Contributions::density_only(), 1e-4);
    let integrals = compute_all(&p, &bg).unwrap();
    let err = evaluate(&p, &bg, &integrals, 1.5, 20.0, 0.0, IntegralType::NonIntegrated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Domain);
}
