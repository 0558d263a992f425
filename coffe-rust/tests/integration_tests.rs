//! End-to-end checks: integral tables, assembly and the grid driver.

mod common;

use approx::assert_relative_eq;
use coffe_rust::integrals::transform;
use coffe_rust::{
    Background, CoffeError, Contributions, CorrelationArray, ErrorKind, IntegralType,
    IntegrationMethod, IntegrationSettings, Interpolate1D, InterpolationMethod, NlTerm, Renormalization, compute,
    compute_all, evaluate,
};
use common::{background, log_grid, parameters, power_law, turnover_spectrum};
use std::f64::consts::PI;

#[test]
fn disabled_terms_contribute_exactly_zero() {
    let bg = background(2.0);
    let p = parameters(
        vec![0.5],
        vec![0.0, 0.7],
        vec![10.0, 30.0],
        turnover_spectrum(),
        Contributions::none(),
    );
    let integrals = compute_all(&p, &bg).unwrap();
    assert!(integrals.is_empty());
    let array = compute(&p, &bg, &integrals).unwrap();
    assert!(array.values().all(|v| v.to_bits() == 0.0f64.to_bits()));

    // density only: nothing besides the local class
    let p = parameters(
        vec![0.5],
        vec![0.0, 0.7],
        vec![10.0, 30.0],
        turnover_spectrum(),
        Contributions::density_only(),
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let array = compute(&p, &bg, &integrals).unwrap();
    for point in array.points() {
        for class in [IntegralType::SingleIntegrated, IntegralType::DoubleIntegrated] {
            let value = evaluate(&p, &bg, &integrals, point.z_mean, point.separation, point.mu, class).unwrap();
            assert_eq!(value, 0.0);
        }
        let local = evaluate(
            &p,
            &bg,
            &integrals,
            point.z_mean,
            point.separation,
            point.mu,
            IntegralType::NonIntegrated,
        )
        .unwrap();
        assert_eq!(point.value, local);
    }
}

#[test]
fn compute_is_deterministic() {
    let bg = background(1.0);
    let p = parameters(
        vec![0.2],
        vec![0.0, 0.8],
        vec![20.0, 40.0],
        turnover_spectrum(),
        Contributions {
            den: true,
            rsd: true,
            g4: true,
            ..Contributions::none()
        },
    );
    let integration = IntegrationSettings {
        method: IntegrationMethod::MonteCarlo,
        relative_tolerance: 2e-2,
        ..p.integration().clone()
    };
    let p = p.with_integration(integration).unwrap();
    let integrals = compute_all(&p, &bg).unwrap();

    let first = compute(&p, &bg, &integrals).unwrap();
    let second = compute(&p.clone().with_threads(1), &bg, &integrals).unwrap();
    let bits = |a: &CorrelationArray| a.values().map(f64::to_bits).collect::<Vec<_>>();
    assert_eq!(bits(&first), bits(&second));
}

#[test]
fn renormalized_integrals_match_direct_evaluation() {
    // with integrated terms the table reaches 2χ(z̄) + r, several thousand Mpc/h
    let bg = background(2.0);
    let p = parameters(
        vec![1.0],
        vec![0.5],
        vec![10.0, 80.0],
        turnover_spectrum(),
        Contributions {
            d1: true,
            g1: true,
            g4: true,
            ..Contributions::none()
        },
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let divergent: Vec<NlTerm> = integrals
        .terms()
        .iter()
        .copied()
        .filter(NlTerm::is_divergent)
        .collect();
    assert_eq!(
        divergent,
        vec![NlTerm::new(2, 0), NlTerm::new(3, 1), NlTerm::new(4, 0)]
    );

    let grid = integrals.separations();
    let r_max = *grid.last().unwrap();
    assert!(r_max > 4000.0);
    let tolerance = p.integration().relative_tolerance;
    for term in divergent {
        let integral = integrals.get(term).unwrap();
        assert_eq!(integral.mode, Renormalization::General);
        let mut checked: Vec<f64> = grid.iter().copied().skip(30).step_by(8).collect();
        checked.push(r_max);
        for r in checked {
            let direct = transform(&p, term, r, false).unwrap();
            assert_relative_eq!(
                integral.value(r),
                direct,
                max_relative = 10.0 * tolerance,
                epsilon = 1e-14
            );
        }
    }
}

#[test]
fn transverse_density_matches_closed_form() {
    // P(k) = A/k: S^0_0(r) = A (cos k₀r - cos k₁r) / (2π² r²)
    let (amplitude, k0, k1) = (50.0, 1e-3, 0.1);
    let bg = background(2.0);
    let p = parameters(
        vec![1.0],
        vec![0.0],
        vec![12.0, 25.0, 37.0],
        power_law(amplitude, -1.0, k0, k1),
        Contributions::density_only(),
    )
    .with_integration(IntegrationSettings {
        bessel_bins: 256,
        ..Default::default()
    })
    .unwrap();
    let integrals = compute_all(&p, &bg).unwrap();
    let array = compute(&p, &bg, &integrals).unwrap();

    for point in array.points() {
        let r = point.separation;
        let s00 = amplitude * ((k0 * r).cos() - (k1 * r).cos()) / (2.0 * PI * PI * r * r);
        // the two points sit slightly behind z̄
        let chi = (bg.comoving_distance(1.0).unwrap().powi(2) + 0.25 * r * r).sqrt();
        let growth = bg.growth_factor(bg.redshift_at_distance(chi).unwrap()).unwrap();
        assert_relative_eq!(point.value, growth * growth * s00, max_relative = 1e-3);
    }
}

#[test]
fn grid_follows_documented_order() {
    let bg = background(2.0);
    let p = parameters(
        vec![0.5, 1.0],
        vec![0.0, 0.5],
        vec![10.0, 20.0, 30.0],
        turnover_spectrum(),
        Contributions::density_only(),
    );
    let integrals = compute_all(&p, &bg).unwrap();
    let array = compute(&p, &bg, &integrals).unwrap();

    let mut expected = Vec::new();
    for z in [0.5, 1.0] {
        for mu in [0.0, 0.5] {
            for r in [10.0, 20.0, 30.0] {
                expected.push((z, mu, r));
            }
        }
    }
    let actual: Vec<(f64, f64, f64)> = array
        .points()
        .iter()
        .map(|p| (p.z_mean, p.mu, p.separation))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn recompute_leaves_no_stale_values() {
    let bg = background(2.0);
    let p = parameters(
        vec![0.8],
        vec![0.1, 0.9],
        vec![15.0, 45.0],
        turnover_spectrum(),
        Contributions::default(),
    );
    let integrals = compute_all(&p, &bg).unwrap();

    let mut array = CorrelationArray::new();
    array.compute(&p, &bg, &integrals).unwrap();
    let first: Vec<f64> = array.values().collect();

    array.release();
    array = CorrelationArray::grid(&p);
    array.points_mut().iter_mut().for_each(|point| point.value = f64::NAN);
    array.compute(&p, &bg, &integrals).unwrap();
    let second: Vec<f64> = array.values().collect();
    assert_eq!(first, second);
}

#[test]
fn pathological_spectrum_fails_to_converge() {
    let bg = background(2.0);
    let k = log_grid(1e-3, 0.2, 30);
    let mut values: Vec<f64> = k.iter().map(|k| 1e3 * k).collect();
    values[12] = f64::INFINITY;
    let spectrum = Interpolate1D::new(&k, &values, InterpolationMethod::Cubic).unwrap();
    let p = parameters(
        vec![1.0],
        vec![0.0],
        vec![10.0],
        spectrum,
        Contributions::density_only(),
    );
    let err = compute_all(&p, &bg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Convergence);
    assert!(matches!(err, CoffeError::Integral { n: 0, l: 0, .. }));

    // too small a level budget is reported the same way
    let p = parameters(
        vec![1.0],
        vec![0.0],
        vec![10.0],
        turnover_spectrum(),
        Contributions::density_only(),
    );
    let integration = IntegrationSettings {
        max_levels: 1,
        ..p.integration().clone()
    };
    let p = p.with_integration(integration).unwrap();
    let err = compute_all(&p, &bg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Convergence);
}

#[test]
fn background_domain_is_enforced() {
    let bg = background(1.0);
    let p = parameters(
        vec![0.5],
        vec![0.0],
        vec![10.0],
        turnover_spectrum(),
        Contributions {
            len: true,
            ..Contributions::none()
        },
    );
    let too_far = parameters(
        vec![1.2],
        vec![0.0],
        vec![10.0],
        turnover_spectrum(),
        Contributions {
            len: true,
            ..Contributions::none()
        },
    );
    assert_eq!(compute_all(&too_far, &bg).unwrap_err().kind(), ErrorKind::Domain);
    assert!(compute_all(&p, &bg).is_ok());
}
