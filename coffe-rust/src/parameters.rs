//! Run parameters
//!
//! [`Parameters`] is built once and then only read. The list of (n, l)
//! integrals the active contributions need is derived from the contribution
//! flags and recomputed whenever they change, so the two never disagree.

use crate::error::{CoffeError, Result};
use crate::error_policy::ErrorMode;
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use crate::quadrature::{IntegrationMethod, Tolerance};
use crate::signal::Operator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Ordered grid axis with its length bundled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    values: Vec<f64>,
}

impl Axis {
    /// Non-empty, finite and strictly ascending values.
    pub fn new(name: &str, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(CoffeError::invalid(format!("axis '{}' is empty", name)));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(CoffeError::invalid(format!(
                "axis '{}' contains the non-finite value {}",
                name, v
            )));
        }
        if let Some(i) = (1..values.len()).find(|&i| !(values[i] > values[i - 1])) {
            return Err(CoffeError::invalid(format!(
                "axis '{}' is not strictly ascending at index {} ({} after {})",
                name,
                i,
                values[i],
                values[i - 1]
            )));
        }
        Ok(Self { values })
    }

    /// Cosines of the angle to the line of sight, in [-1, 1]
    pub fn mu(values: Vec<f64>) -> Result<Self> {
        let axis = Self::new("mu", values)?;
        if axis.min() < -1.0 || axis.max() > 1.0 {
            return Err(CoffeError::invalid("axis 'mu' must lie in [-1, 1]"));
        }
        Ok(axis)
    }

    /// Comoving separations in Mpc/h, positive
    pub fn separation(values: Vec<f64>) -> Result<Self> {
        let axis = Self::new("separation", values)?;
        if axis.min() <= 0.0 {
            return Err(CoffeError::invalid("axis 'separation' must be positive"));
        }
        Ok(axis)
    }

    /// Mean redshifts, positive
    pub fn z_mean(values: Vec<f64>) -> Result<Self> {
        let axis = Self::new("z_mean", values)?;
        if axis.min() <= 0.0 {
            return Err(CoffeError::invalid("axis 'z_mean' must be positive"));
        }
        Ok(axis)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.values.len() - 1]
    }
}

/// Density parameters and dark energy equation of state of a flat universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cosmology {
    pub omega_cdm: f64,
    pub omega_baryon: f64,
    pub omega_gamma: f64,
    pub w0: f64,
    pub wa: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            omega_cdm: 0.25,
            omega_baryon: 0.05,
            omega_gamma: 9e-5,
            w0: -1.0,
            wa: 0.0,
        }
    }
}

impl Cosmology {
    pub fn omega_matter(&self) -> f64 {
        self.omega_cdm + self.omega_baryon
    }

    /// Dark energy density closing the universe
    pub fn omega_de(&self) -> f64 {
        1.0 - self.omega_matter() - self.omega_gamma
    }

    pub fn validate(&self) -> Result<()> {
        let densities = [
            ("omega_cdm", self.omega_cdm),
            ("omega_baryon", self.omega_baryon),
            ("omega_gamma", self.omega_gamma),
        ];
        for (name, value) in densities {
            if !(value >= 0.0) {
                return Err(CoffeError::invalid(format!(
                    "{} = {} must be non-negative",
                    name, value
                )));
            }
        }
        if !(self.omega_de() > 0.0) {
            return Err(CoffeError::invalid(format!(
                "dark energy density {} must be positive",
                self.omega_de()
            )));
        }
        if !self.w0.is_finite() || !self.wa.is_finite() {
            return Err(CoffeError::invalid("w0 and wa must be finite"));
        }
        Ok(())
    }
}

/// Physical terms included in the correlation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contributions {
    /// Matter density
    pub den: bool,
    /// Redshift-space distortions
    pub rsd: bool,
    /// Lensing convergence
    pub len: bool,
    /// Doppler term
    pub d1: bool,
    /// Velocity potential term
    pub d2: bool,
    /// Local potential terms
    pub g1: bool,
    pub g2: bool,
    pub g3: bool,
    /// Integrated potential terms
    pub g4: bool,
    pub g5: bool,
}

impl Default for Contributions {
    fn default() -> Self {
        Self {
            den: true,
            rsd: true,
            ..Self::none()
        }
    }
}

impl Contributions {
    /// Every flag off
    pub fn none() -> Self {
        Self {
            den: false,
            rsd: false,
            len: false,
            d1: false,
            d2: false,
            g1: false,
            g2: false,
            g3: false,
            g4: false,
            g5: false,
        }
    }

    /// Every flag on
    pub fn all() -> Self {
        Self {
            den: true,
            rsd: true,
            len: true,
            d1: true,
            d2: true,
            g1: true,
            g2: true,
            g3: true,
            g4: true,
            g5: true,
        }
    }

    pub fn density_only() -> Self {
        Self {
            den: true,
            ..Self::none()
        }
    }

    pub fn any_local(&self) -> bool {
        self.den || self.rsd || self.d1 || self.d2 || self.g1 || self.g2 || self.g3
    }

    pub fn any_integrated(&self) -> bool {
        self.len || self.g4 || self.g5
    }

    /// Operators appearing in any active term
    pub fn operators(&self) -> BTreeSet<Operator> {
        let mut ops = BTreeSet::new();
        if self.den {
            ops.insert(Operator::Density);
        }
        if self.rsd {
            ops.insert(Operator::Rsd);
        }
        if self.len {
            ops.insert(Operator::Density);
            ops.insert(Operator::Rsd);
        }
        if self.d1 {
            ops.insert(Operator::Velocity);
        }
        if self.d2 || self.g1 || self.g2 || self.g3 || self.g4 || self.g5 {
            ops.insert(Operator::Potential);
        }
        ops
    }

    /// The (n, l) integrals the active terms need: sorted, no duplicates.
    pub fn nonzero_terms(&self) -> Vec<NlTerm> {
        let ops = self.operators();
        let mut terms = BTreeSet::new();
        for &a in &ops {
            for &b in &ops {
                terms.extend(a.terms_with(b).iter().copied());
            }
        }
        terms.into_iter().collect()
    }
}

/// Key of an I^n_l integral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NlTerm {
    pub n: i32,
    pub l: i32,
}

impl NlTerm {
    pub const fn new(n: i32, l: i32) -> Self {
        Self { n, l }
    }

    /// Whether the transform diverges at small k and needs renormalization
    pub fn is_divergent(&self) -> bool {
        self.n > self.l
    }
}

impl fmt::Display for NlTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I^{}_{}", self.n, self.l)
    }
}

/// Galaxy population; population 1 sits at the first point of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    First,
    Second,
}

/// Bias as a function of redshift
#[derive(Debug, Clone)]
pub enum Bias {
    Constant(f64),
    Interpolated(Interpolate1D),
}

impl Bias {
    pub fn value(&self, z: f64) -> f64 {
        match self {
            Self::Constant(b) => *b,
            Self::Interpolated(table) => table.evaluate(z),
        }
    }

    /// Warn when a table does not cover [z_min, z_max]; lookups there are extrapolated.
    fn warn_if_extrapolated(&self, name: &str, z_min: f64, z_max: f64) {
        if let Self::Interpolated(table) = self {
            let (lo, hi) = table.domain();
            if z_min < lo || z_max > hi {
                warn!(
                    bias = name,
                    table_min = lo,
                    table_max = hi,
                    z_min,
                    z_max,
                    "bias table will be extrapolated"
                );
            }
        }
    }
}

/// Matter, magnification and evolution bias of both populations.
#[derive(Debug, Clone)]
pub struct Biases {
    pub matter: [Bias; 2],
    pub magnification: [Bias; 2],
    pub evolution: [Bias; 2],
}

impl Default for Biases {
    fn default() -> Self {
        Self {
            matter: [Bias::Constant(1.0), Bias::Constant(1.0)],
            magnification: [Bias::Constant(0.0), Bias::Constant(0.0)],
            evolution: [Bias::Constant(0.0), Bias::Constant(0.0)],
        }
    }
}

impl Biases {
    fn index(population: Population) -> usize {
        match population {
            Population::First => 0,
            Population::Second => 1,
        }
    }

    pub fn matter(&self, population: Population, z: f64) -> f64 {
        self.matter[Self::index(population)].value(z)
    }

    /// Magnification bias s
    pub fn magnification(&self, population: Population, z: f64) -> f64 {
        self.magnification[Self::index(population)].value(z)
    }

    /// Evolution bias f_evo
    pub fn evolution(&self, population: Population, z: f64) -> f64 {
        self.evolution[Self::index(population)].value(z)
    }

    pub fn warn_if_extrapolated(&self, z_min: f64, z_max: f64) {
        let names = [
            ("matter bias", &self.matter),
            ("magnification bias", &self.magnification),
            ("evolution bias", &self.evolution),
        ];
        for (name, pair) in names {
            for bias in pair {
                bias.warn_if_extrapolated(name, z_min, z_max);
            }
        }
    }
}

/// Quadrature settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    /// Scheme for the line-of-sight integrals
    pub method: IntegrationMethod,
    /// Scheme for the Bessel transforms; only tanh-sinh and Gauss-Legendre
    /// are accepted, Monte Carlo is rejected by [`Self::validate`]
    pub transform_method: IntegrationMethod,
    /// Starting Gauss-Legendre order
    pub bins: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub max_levels: usize,
    /// Points of the separation grid the integrals are tabulated on
    pub bessel_bins: usize,
    /// Interpolation of the tabulated integrals
    pub interpolation: InterpolationMethod,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::TanhSinh,
            transform_method: IntegrationMethod::TanhSinh,
            bins: 16,
            relative_tolerance: 1e-4,
            absolute_tolerance: 0.0,
            max_levels: 10,
            bessel_bins: 256,
            interpolation: InterpolationMethod::Cubic,
        }
    }
}

impl IntegrationSettings {
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            relative: self.relative_tolerance,
            absolute: self.absolute_tolerance,
            max_levels: self.max_levels,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.transform_method == IntegrationMethod::MonteCarlo {
            return Err(CoffeError::invalid(
                "Monte Carlo cannot be used for the Bessel transforms",
            ));
        }
        if !(self.relative_tolerance > 0.0) || !(self.absolute_tolerance >= 0.0) {
            return Err(CoffeError::invalid(
                "tolerances must be positive (relative) and non-negative (absolute)",
            ));
        }
        if self.bessel_bins < self.interpolation.min_points() + 1 {
            return Err(CoffeError::invalid(format!(
                "bessel_bins = {} is too small for {:?} interpolation",
                self.bessel_bins, self.interpolation
            )));
        }
        if self.bins < 2 || self.max_levels == 0 {
            return Err(CoffeError::invalid(
                "bins must be at least 2 and max_levels at least 1",
            ));
        }
        Ok(())
    }
}

/// Everything a run depends on besides the background.
///
/// Built with [`Parameters::new`] and the `with_*` methods, then only read
/// through its accessors.
#[derive(Debug, Clone)]
pub struct Parameters {
    cosmology: Cosmology,
    z_mean: Axis,
    mu: Axis,
    separation: Axis,
    contributions: Contributions,
    nonzero_terms: Vec<NlTerm>,
    power_spectrum: Interpolate1D,
    power_spectrum_norm: Option<Interpolate1D>,
    k_min: f64,
    k_max: f64,
    biases: Biases,
    integration: IntegrationSettings,
    flatsky: bool,
    nthreads: usize,
    error_mode: ErrorMode,
}

impl Parameters {
    /// Parameters with default contributions, biases and integration
    /// settings; k_min and k_max span the spectrum table.
    pub fn new(
        cosmology: Cosmology,
        z_mean: Axis,
        mu: Axis,
        separation: Axis,
        power_spectrum: Interpolate1D,
    ) -> Result<Self> {
        cosmology.validate()?;
        let (k_min, k_max) = power_spectrum.domain();
        let contributions = Contributions::default();
        Ok(Self {
            cosmology,
            z_mean,
            mu,
            separation,
            nonzero_terms: contributions.nonzero_terms(),
            contributions,
            power_spectrum,
            power_spectrum_norm: None,
            k_min,
            k_max,
            biases: Biases::default(),
            integration: IntegrationSettings::default(),
            flatsky: false,
            nthreads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            error_mode: ErrorMode::Report,
        })
    }

    /// Replace the contribution flags, recomputing the required integrals.
    pub fn with_contributions(mut self, contributions: Contributions) -> Self {
        self.contributions = contributions;
        self.nonzero_terms = contributions.nonzero_terms();
        self
    }

    pub fn with_biases(mut self, biases: Biases) -> Self {
        self.biases = biases;
        self
    }

    pub fn with_integration(mut self, integration: IntegrationSettings) -> Result<Self> {
        integration.validate()?;
        self.integration = integration;
        Ok(self)
    }

    /// Integration range of the Bessel transforms
    pub fn with_k_range(mut self, k_min: f64, k_max: f64) -> Result<Self> {
        if !(k_min > 0.0 && k_max > k_min && k_max.is_finite()) {
            return Err(CoffeError::invalid(format!(
                "invalid k range [{}, {}]",
                k_min, k_max
            )));
        }
        self.k_min = k_min;
        self.k_max = k_max;
        Ok(self)
    }

    /// Replace the power spectrum; the k range is left as it is.
    pub fn with_power_spectrum(mut self, spectrum: Interpolate1D) -> Self {
        self.power_spectrum = spectrum;
        self
    }

    pub fn with_power_spectrum_norm(mut self, spectrum: Interpolate1D) -> Self {
        self.power_spectrum_norm = Some(spectrum);
        self
    }

    pub fn with_flatsky(mut self, flatsky: bool) -> Self {
        self.flatsky = flatsky;
        self
    }

    pub fn with_threads(mut self, nthreads: usize) -> Self {
        self.nthreads = nthreads.max(1);
        self
    }

    /// How failures outside the parallel passes are surfaced
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmology
    }

    pub fn z_mean(&self) -> &Axis {
        &self.z_mean
    }

    pub fn mu(&self) -> &Axis {
        &self.mu
    }

    pub fn separation(&self) -> &Axis {
        &self.separation
    }

    pub fn contributions(&self) -> &Contributions {
        &self.contributions
    }

    /// Integrals needed by the active contributions
    pub fn nonzero_terms(&self) -> &[NlTerm] {
        &self.nonzero_terms
    }

    /// Linear matter power spectrum at z = 0, (Mpc/h)^3 against h/Mpc
    pub fn power_spectrum(&self) -> &Interpolate1D {
        &self.power_spectrum
    }

    /// Spectrum used for the small-k add-back of renormalized integrals
    pub fn power_spectrum_norm(&self) -> Option<&Interpolate1D> {
        self.power_spectrum_norm.as_ref()
    }

    pub fn k_min(&self) -> f64 {
        self.k_min
    }

    pub fn k_max(&self) -> f64 {
        self.k_max
    }

    pub fn biases(&self) -> &Biases {
        &self.biases
    }

    pub fn integration(&self) -> &IntegrationSettings {
        &self.integration
    }

    /// Flat-sky treatment of lensing-lensing requested
    pub fn flatsky(&self) -> bool {
        self.flatsky
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    /// Whether the flat-sky lensing-lensing table is built and used
    pub fn flatsky_lensing(&self) -> bool {
        self.flatsky && self.contributions.len
    }

    pub fn grid_size(&self) -> usize {
        self.z_mean.len() * self.mu.len() * self.separation.len()
    }

    /// Worker pool with `nthreads` threads
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.nthreads)
            .build()
            .map_err(|e| {
                CoffeError::invalid(format!(
                    "cannot start {} worker threads: {}",
                    self.nthreads, e
                ))
            })
    }
}

#[cfg(test)]
#[path = "parameters_tests.rs"]
mod tests;
