//! Run configuration read from a JSON file.
//!
//! Every field has a default, so a settings file only lists what differs.
//! Relative paths are resolved against the directory of the settings file.
//!
//! ```json
//! {
//!   "power_spectrum_file": "pk.dat",
//!   "z_mean": [1.0],
//!   "mu": [0.0, 0.5, 1.0],
//!   "separation": [10, 20, 40, 80],
//!   "contributions": { "den": true, "rsd": true, "len": true },
//!   "matter_bias": [1.2, "bias2.dat"],
//!   "background": { "kind": "analytic", "z_max": 5.0 }
//! }
//! ```

use crate::background::{AnalyticBackground, Background, TabulatedBackground};
use crate::error::{CoffeError, Result};
use crate::error_policy::ErrorMode;
use crate::interpolation1d::InterpolationMethod;
use crate::io;
use crate::parameters::{
    Axis, Bias, Biases, Contributions, Cosmology, IntegrationSettings, Parameters,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the background comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundSettings {
    /// Flat w0waCDM solved on start-up
    Analytic {
        #[serde(default = "default_z_max")]
        z_max: f64,
        #[serde(default = "default_background_bins")]
        bins: usize,
    },
    /// Columns z, χ, H, D, f produced by an external code
    Tabulated {
        file: PathBuf,
        #[serde(default)]
        interpolation: InterpolationMethod,
    },
}

fn default_z_max() -> f64 {
    15.0
}

fn default_background_bins() -> usize {
    3000
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self::Analytic {
            z_max: default_z_max(),
            bins: default_background_bins(),
        }
    }
}

/// A bias given either as a number or as a file with columns z, b(z)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BiasSetting {
    Constant(f64),
    File(PathBuf),
}

impl BiasSetting {
    fn load(&self, base: &Path, method: InterpolationMethod) -> Result<Bias> {
        match self {
            Self::Constant(b) => Ok(Bias::Constant(*b)),
            Self::File(path) => Ok(Bias::Interpolated(io::read_interpolant(
                &resolve(base, path),
                method,
            )?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cosmology: Cosmology,
    pub background: BackgroundSettings,

    /// Columns k [h/Mpc], P(k) [(Mpc/h)³] at z = 0
    pub power_spectrum_file: PathBuf,
    /// Spectrum for the small-k add-back of renormalized integrals
    pub power_spectrum_norm_file: Option<PathBuf>,
    /// Transform range; the spectrum table's own range when absent
    pub k_min: Option<f64>,
    pub k_max: Option<f64>,

    pub z_mean: Vec<f64>,
    pub mu: Vec<f64>,
    pub separation: Vec<f64>,

    pub contributions: Contributions,
    pub matter_bias: [BiasSetting; 2],
    pub magnification_bias: [BiasSetting; 2],
    pub evolution_bias: [BiasSetting; 2],

    pub integration: IntegrationSettings,
    pub flatsky: bool,
    /// Worker threads; all available cores when absent
    pub nthreads: Option<usize>,
    /// `abort` panics on the first failure of the integral engine
    pub error_mode: ErrorMode,

    pub output_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cosmology: Cosmology::default(),
            background: BackgroundSettings::default(),
            power_spectrum_file: PathBuf::from("power_spectrum.dat"),
            power_spectrum_norm_file: None,
            k_min: None,
            k_max: None,
            z_mean: vec![1.0],
            mu: vec![0.0, 0.2, 0.5, 0.8, 0.95],
            separation: vec![10.0, 20.0, 40.0, 70.0, 100.0, 150.0],
            contributions: Contributions::default(),
            matter_bias: [BiasSetting::Constant(1.0), BiasSetting::Constant(1.0)],
            magnification_bias: [BiasSetting::Constant(0.0), BiasSetting::Constant(0.0)],
            evolution_bias: [BiasSetting::Constant(0.0), BiasSetting::Constant(0.0)],
            integration: IntegrationSettings::default(),
            flatsky: false,
            nthreads: None,
            error_mode: ErrorMode::Report,
            output_file: PathBuf::from("corrfunc.dat"),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Settings together with the directory relative paths refer to
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub base: PathBuf,
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a settings file; relative paths in it are taken from its directory.
    pub fn from_file(path: &Path) -> Result<LoadedSettings> {
        let text = std::fs::read_to_string(path).map_err(|source| CoffeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        info!(path = %path.display(), "loaded settings");
        Ok(LoadedSettings { settings, base })
    }

    /// Build run parameters, reading the spectrum and bias files.
    pub fn parameters(&self, base: &Path) -> Result<Parameters> {
        let method = self.integration.interpolation;
        let spectrum = io::read_interpolant(&resolve(base, &self.power_spectrum_file), method)?;

        let mut parameters = Parameters::new(
            self.cosmology.clone(),
            Axis::z_mean(self.z_mean.clone())?,
            Axis::mu(self.mu.clone())?,
            Axis::separation(self.separation.clone())?,
            spectrum,
        )?
        .with_contributions(self.contributions)
        .with_integration(self.integration.clone())?
        .with_flatsky(self.flatsky)
        .with_error_mode(self.error_mode);

        if self.k_min.is_some() || self.k_max.is_some() {
            let (lo, hi) = parameters.power_spectrum().domain();
            parameters = parameters.with_k_range(self.k_min.unwrap_or(lo), self.k_max.unwrap_or(hi))?;
        }
        if let Some(file) = &self.power_spectrum_norm_file {
            parameters = parameters.with_power_spectrum_norm(io::read_interpolant(&resolve(base, file), method)?);
        }
        if let Some(n) = self.nthreads {
            parameters = parameters.with_threads(n);
        }

        let load = |pair: &[BiasSetting; 2]| -> Result<[Bias; 2]> {
            Ok([pair[0].load(base, method)?, pair[1].load(base, method)?])
        };
        Ok(parameters.with_biases(Biases {
            matter: load(&self.matter_bias)?,
            magnification: load(&self.magnification_bias)?,
            evolution: load(&self.evolution_bias)?,
        }))
    }

    /// Build the background the settings ask for.
    pub fn background(&self, base: &Path) -> Result<Box<dyn Background>> {
        match &self.background {
            BackgroundSettings::Analytic { z_max, bins } => {
                Ok(Box::new(AnalyticBackground::new(&self.cosmology, *z_max, *bins)?))
            }
            BackgroundSettings::Tabulated {
                file,
                interpolation,
            } => {
                let columns = io::read_columns(&resolve(base, file), 5)?;
                Ok(Box::new(TabulatedBackground::new(
                    &columns[0],
                    &columns[1],
                    &columns[2],
                    &columns[3],
                    &columns[4],
                    *interpolation,
                )?))
            }
        }
    }

    /// Output path, resolved against `base`
    pub fn output_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.output_file)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
