use super::*;
use crate::error::ErrorKind;
use approx::assert_relative_eq;

fn lcdm() -> AnalyticBackground {
    AnalyticBackground::new(&Cosmology::default(), 5.0, 500).unwrap()
}

#[test]
fn test_rejects_bad_construction() {
    let c = Cosmology::default();
    assert_eq!(
        AnalyticBackground::new(&c, -1.0, 100).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert!(AnalyticBackground::new(&c, 2000.0, 100).is_err());
    assert!(AnalyticBackground::new(&c, 2.0, 2).is_err());
}

#[test]
fn test_normalization_today() {
    let bg = lcdm();
    assert_eq!(bg.comoving_distance(0.0).unwrap(), 0.0);
    assert_relative_eq!(bg.hubble_rate(0.0).unwrap(), HUBBLE_CONSTANT, max_relative = 1e-12);
    assert_relative_eq!(bg.growth_factor(0.0).unwrap(), 1.0, max_relative = 1e-9);
    // f(0) ≈ Ωm^0.55
    let f0 = bg.growth_rate(0.0).unwrap();
    assert_relative_eq!(f0, 0.3_f64.powf(0.55), max_relative = 1e-2);
}

#[test]
fn test_matter_dominated_limit() {
    let c = Cosmology {
        omega_cdm: 0.949_999,
        omega_baryon: 0.05,
        omega_gamma: 0.0,
        w0: -1.0,
        wa: 0.0,
    };
    let bg = AnalyticBackground::new(&c, 3.0, 300).unwrap();
    for z in [0.5_f64, 1.0, 2.0] {
        let chi = 2.0 / HUBBLE_CONSTANT * (1.0 - 1.0 / (1.0 + z).sqrt());
        assert_relative_eq!(bg.comoving_distance(z).unwrap(), chi, max_relative = 1e-6);
        assert_relative_eq!(bg.growth_factor(z).unwrap(), 1.0 / (1.0 + z), max_relative = 1e-4);
        assert_relative_eq!(bg.growth_rate(z).unwrap(), 1.0, max_relative = 1e-4);
        // a ∝ τ², ℋ = 2/τ, ℋ' = -ℋ²/2
        let curly_h = bg.conformal_hubble_rate(z).unwrap();
        assert_relative_eq!(
            bg.conformal_hubble_rate_prime(z).unwrap(),
            -0.5 * curly_h * curly_h,
            max_relative = 1e-5
        );
    }
}

#[test]
fn test_distance_inverse() {
    let bg = lcdm();
    for z in [0.1, 0.7, 2.3, 4.9] {
        let chi = bg.comoving_distance(z).unwrap();
        assert_relative_eq!(bg.redshift_at_distance(chi).unwrap(), z, max_relative = 1e-7);
    }
}

#[test]
fn test_domain_errors() {
    let bg = lcdm();
    assert_eq!(bg.growth_rate(5.1).unwrap_err().kind(), ErrorKind::Domain);
    assert_eq!(bg.hubble_rate(-0.1).unwrap_err().kind(), ErrorKind::Domain);
    let too_far = bg.max_comoving_distance().unwrap() * 1.01;
    assert_eq!(
        bg.redshift_at_distance(too_far).unwrap_err().kind(),
        ErrorKind::Domain
    );
}

#[test]
fn test_tabulated_matches_analytic() {
    let bg = lcdm();
    let table = TabulatedBackground::sample(&bg, 2000, InterpolationMethod::Cubic).unwrap();
    assert_eq!(table.z_max(), 5.0);
    for z in [0.05, 0.8, 1.7, 3.3] {
        assert_relative_eq!(
            table.comoving_distance(z).unwrap(),
            bg.comoving_distance(z).unwrap(),
            max_relative = 1e-8
        );
        assert_relative_eq!(
            table.growth_rate(z).unwrap(),
            bg.growth_rate(z).unwrap(),
            max_relative = 1e-8
        );
        assert_relative_eq!(
            table.conformal_hubble_rate_prime(z).unwrap(),
            bg.conformal_hubble_rate_prime(z).unwrap(),
            max_relative = 1e-4
        );
    }
    assert_eq!(table.growth_factor(5.5).unwrap_err().kind(), ErrorKind::Domain);
}

#[test]
fn test_tabulated_must_start_at_zero() {
    let z = [0.1, 0.2, 0.3];
    let err = TabulatedBackground::new(&z, &z, &z, &z, &z, InterpolationMethod::Linear).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
