//! Common test utilities

#![allow(dead_code)]

use coffe_rust::{
    AnalyticBackground, Axis, Contributions, Cosmology, IntegrationSettings, Interpolate1D,
    InterpolationMethod, Parameters,
};

/// n log-spaced points from lo to hi
pub fn log_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| lo * (hi / lo).powf(i as f64 / (n - 1) as f64))
        .collect()
}

/// P(k) = amplitude · k^index tabulated on [k_min, k_max]
pub fn power_law(amplitude: f64, index: f64, k_min: f64, k_max: f64) -> Interpolate1D {
    Interpolate1D::from_fn(&log_grid(k_min, k_max, 200), InterpolationMethod::Cubic, |k| {
        amplitude * k.powf(index)
    })
    .unwrap()
}

/// Smooth spectrum with a turnover near k = 0.03 h/Mpc
pub fn turnover_spectrum() -> Interpolate1D {
    Interpolate1D::from_fn(&log_grid(1e-3, 0.2, 80), InterpolationMethod::Cubic, |k| {
        2e4 * k / (1.0 + 1e3 * k * k)
    })
    .unwrap()
}

pub fn background(z_max: f64) -> AnalyticBackground {
    AnalyticBackground::new(&Cosmology::default(), z_max, 400).unwrap()
}

/// Parameters on a small grid with cheap integration settings
pub fn parameters(
    z_mean: Vec<f64>,
    mu: Vec<f64>,
    separation: Vec<f64>,
    spectrum: Interpolate1D,
    contributions: Contributions,
) -> Parameters {
    let integration = IntegrationSettings {
        bessel_bins: 64,
        ..IntegrationSettings::default()
    };
    Parameters::new(
        Cosmology::default(),
        Axis::z_mean(z_mean).unwrap(),
        Axis::mu(mu).unwrap(),
        Axis::separation(separation).unwrap(),
        spectrum,
    )
    .unwrap()
    .with_contributions(contributions)
    .with_integration(integration)
    .unwrap()
    .with_threads(4)
}
