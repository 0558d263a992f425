use super::*;

#[test]
fn test_legendre_empty() {
    let rule = legendre(0);
    assert!(rule.is_empty());
    assert_eq!((rule.a, rule.b), (-1.0, 1.0));
    assert_eq!(rule.integrate(|x| x + 1.0), 0.0);
}

#[test]
fn test_legendre_weights_sum_to_two() {
    for n in 1..=40 {
        let rule = legendre(n);
        assert_eq!(rule.len(), n);
        assert!(rule.x.windows(2).all(|p| p[0] < p[1]), "n = {}", n);
        assert!(rule.x.iter().all(|&x| x > -1.0 && x < 1.0), "n = {}", n);
        let sum: f64 = rule.w.iter().sum();
        assert!((sum - 2.0).abs() < 1e-13, "n = {}: sum = {}", n, sum);
    }
}

#[test]
fn test_legendre_exact_for_polynomials() {
    // an n-point rule integrates degree 2n-1 exactly
    for n in 1..=12 {
        let rule = legendre(n);
        let degree = (2 * n - 1) as i32;
        let even = rule.integrate(|x| x.powi(degree - 1) + 0.5 * x);
        assert!((even - 2.0 / degree as f64).abs() < 1e-13, "n = {}", n);
        let odd = rule.integrate(|x| x.powi(degree));
        assert!(odd.abs() < 1e-14, "n = {}", n);
        let shifted = rule.reseat(0.0, 1.0).integrate(|x| x.powi(degree));
        assert!((shifted - 1.0 / (degree + 1) as f64).abs() < 1e-13, "n = {}", n);
    }
}

#[test]
fn test_reseat_and_integrate() {
    let rule = legendre(20).reseat(0.0, std::f64::consts::PI);
    assert_eq!((rule.a, rule.b), (0.0, std::f64::consts::PI));
    assert!(rule.x.iter().all(|&x| x > 0.0 && x < std::f64::consts::PI));
    assert!((rule.integrate(f64::sin) - 2.0).abs() < 1e-14);
}
