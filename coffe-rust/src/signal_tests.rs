use super::*;
use crate::background::AnalyticBackground;
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use crate::parameters::{Axis, Contributions, Cosmology};
use approx::assert_relative_eq;

const OPERATORS: [Operator; 4] = [
    Operator::Density,
    Operator::Rsd,
    Operator::Velocity,
    Operator::Potential,
];

/// Arbitrary distinct values standing in for S^n_l
fn fake_s(term: NlTerm) -> Result<f64> {
    Ok(1.0 + 0.37 * term.n as f64 - 0.11 * term.l as f64 + 0.05 * (term.n * term.l) as f64)
}

fn background() -> AnalyticBackground {
    AnalyticBackground::new(&Cosmology::default(), 3.0, 300).unwrap()
}

fn parameters(contributions: Contributions) -> Parameters {
    let k: Vec<f64> = (0..40).map(|i| 1e-4 * 10f64.powf(i as f64 * 0.15)).collect();
    Parameters::new(
        Cosmology::default(),
        Axis::z_mean(vec![1.0]).unwrap(),
        Axis::mu(vec![0.0]).unwrap(),
        Axis::separation(vec![50.0]).unwrap(),
        Interpolate1D::from_fn(&k, InterpolationMethod::Linear, |k| k).unwrap(),
    )
    .unwrap()
    .with_contributions(contributions)
}

#[test]
fn test_terms_with_is_symmetric() {
    for a in OPERATORS {
        for b in OPERATORS {
            assert_eq!(a.terms_with(b), b.terms_with(a));
            assert!(!a.terms_with(b).is_empty());
        }
    }
}

#[test]
fn test_correlator_uses_only_listed_terms() {
    let pair = PairGeometry::along_rays(1000.0, 1010.0, 0.01);
    assert!(pair.a1 != 0.0 && pair.a2 != 0.0);
    for a in OPERATORS {
        for b in OPERATORS {
            let allowed = a.terms_with(b);
            correlator(a, b, &pair, |t| {
                assert!(allowed.contains(&t), "{:?}-{:?} asked for {}", a, b, t);
                fake_s(t)
            })
            .unwrap();
        }
    }
}

#[test]
fn test_correlator_exchange_symmetry() {
    // swapping the two points maps (a1, a2) to (-a2, -a1)
    let pair = PairGeometry::along_rays(1500.0, 1460.0, 0.02);
    let swapped = PairGeometry {
        a1: -pair.a2,
        a2: -pair.a1,
        ..pair
    };
    for a in OPERATORS {
        for b in OPERATORS {
            let forward = correlator(a, b, &pair, fake_s).unwrap();
            let backward = correlator(b, a, &swapped, fake_s).unwrap();
            assert_relative_eq!(forward, backward, max_relative = 1e-14, epsilon = 1e-15);
        }
    }
}

#[test]
fn test_coincident_points() {
    let pair = PairGeometry::along_rays(2000.0, 2000.0, 0.0);
    assert_eq!(pair.distance, 0.0);
    assert_eq!((pair.a1, pair.a2, pair.c), (0.0, 0.0, 1.0));

    // only S^0_0 survives at r = 0: ⟨μ⁴⟩ = 1/5, ⟨μ²⟩ = 1/3
    let s = |t: NlTerm| Ok(if t == NlTerm::new(0, 0) { 1.0 } else { 0.0 });
    let rr = correlator(Operator::Rsd, Operator::Rsd, &pair, s).unwrap();
    assert_relative_eq!(rr, 0.2, max_relative = 1e-15);
    let dr = correlator(Operator::Density, Operator::Rsd, &pair, s).unwrap();
    assert_relative_eq!(dr, 1.0 / 3.0, max_relative = 1e-15);
}

#[test]
fn test_radial_pair() {
    let bg = background();
    let geometry = Geometry::new(&bg, 1.0, 40.0, 1.0).unwrap();
    assert_eq!(geometry.angle, 0.0);
    assert_relative_eq!(geometry.chi2 - geometry.chi1, 40.0, max_relative = 1e-12);
    assert!(geometry.z2 > geometry.z1);

    let pair = geometry.pair(geometry.chi1, geometry.chi2);
    assert_relative_eq!(pair.distance, 40.0, max_relative = 1e-12);
    assert_relative_eq!(pair.a1, -1.0, max_relative = 1e-14);
    assert_relative_eq!(pair.a2, -1.0, max_relative = 1e-14);
}

#[test]
fn test_transverse_pair() {
    let bg = background();
    let geometry = Geometry::new(&bg, 1.0, 40.0, 0.0).unwrap();
    assert_eq!(geometry.chi1, geometry.chi2);
    assert_eq!(geometry.z1, geometry.z2);

    let pair = geometry.pair(geometry.chi1, geometry.chi2);
    assert_relative_eq!(pair.distance, 40.0, max_relative = 1e-10);
    assert_relative_eq!(pair.a1, -pair.a2, max_relative = 1e-12);
    assert!(pair.a1.abs() < 1e-2);
}

#[test]
fn test_local_terms_follow_flags() {
    let bg = background();
    let p = parameters(Contributions::none());
    assert!(local_terms(&p, &bg, Population::First, 1.0, 3000.0).unwrap().is_empty());

    let p = parameters(Contributions::density_only());
    let terms = local_terms(&p, &bg, Population::First, 1.0, 3000.0).unwrap();
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].operator, Operator::Density);
    assert_relative_eq!(terms[0].coefficient, bg.growth_factor(1.0).unwrap(), max_relative = 1e-15);

    let p = parameters(Contributions::all());
    let terms = local_terms(&p, &bg, Population::Second, 1.0, 3000.0).unwrap();
    assert_eq!(terms.len(), 7);
}

#[test]
fn test_integrated_kernel() {
    let bg = background();
    let chi = bg.comoving_distance(1.0).unwrap();

    let p = parameters(Contributions::default());
    let kernel = IntegratedKernel::new(&p, &bg, Population::First, 1.0, chi).unwrap();
    assert!(kernel.terms_at(&bg, 0.5 * chi).unwrap().is_empty());

    let p = parameters(Contributions {
        len: true,
        g4: true,
        ..Contributions::none()
    });
    let kernel = IntegratedKernel::new(&p, &bg, Population::First, 1.0, chi).unwrap();
    // the lensing weight vanishes at the observer and at the source
    assert_eq!(kernel.terms_at(&bg, 0.0).unwrap()[0].coefficient, 0.0);
    assert!(kernel.terms_at(&bg, chi).unwrap()[0].coefficient.abs() < 1e-20);

    let terms = kernel.terms_at(&bg, 0.5 * chi).unwrap();
    assert_eq!(terms.len(), 3);
    assert_eq!(terms[0].operator, Operator::Density);
    assert_eq!(terms[1].operator, Operator::Rsd);
    assert_eq!(terms[0].coefficient, -terms[1].coefficient);
    // with s = 0 the lensing weight is negative
    assert!(terms[0].coefficient < 0.0);

    assert_eq!(terms[2].operator, Operator::Potential);
}

#[test]
fn test_correlate_terms_skips_zero_coefficients() {
    let pair = PairGeometry::along_rays(1000.0, 1020.0, 0.0);
    let first = [Term::new(Operator::Density, 2.0), Term::new(Operator::Rsd, 0.0)];
    let second = [Term::new(Operator::Density, 3.0)];
    let total = correlate_terms(&first, &second, &pair, |t, _| {
        assert_eq!(t, NlTerm::new(0, 0));
        Ok(0.5)
    })
    .unwrap();
    assert_eq!(total, 3.0);
}
