//! # coffe-rust: relativistic correlation function of galaxy number counts
//!
//! Computes ξ(z̄, r, μ) from a linear matter power spectrum and a background
//! cosmology. The I^n_l Bessel transforms of the spectrum are tabulated once
//! ([`integrals::compute_all`]) and then combined into local, single- and
//! double-integrated contributions on every grid point ([`corrfunc::compute`]).

pub mod background;
pub mod corrfunc; // Grid driver over the flattened (z̄, μ, r) grid
pub mod error;
pub mod error_policy;
pub mod gauss;
pub mod integrals; // I^n_l tables with small-k renormalization
pub mod integrate; // One contribution class at one coordinate
pub mod interpolation1d;
pub mod interpolation2d;
pub mod io;
pub mod parameters;
pub mod quadrature;
pub mod settings;
pub mod signal; // Operators, correlators and number-count terms
pub mod special_functions;

// Re-export commonly used types
pub use background::{AnalyticBackground, Background, HUBBLE_CONSTANT, TabulatedBackground};
pub use corrfunc::{CorrelationArray, CorrelationPoint, compute};
pub use error::{CoffeError, ErrorKind, Result};
pub use error_policy::{ErrorMode, ErrorPolicy, ErrorPolicyGuard};
pub use integrals::{Integral, IntegralArray, Renormalization, compute_all};
pub use integrate::{IntegralType, evaluate};
pub use interpolation1d::{Interpolate1D, InterpolationMethod};
pub use interpolation2d::{Interpolate2D, Interpolation2DMethod};
pub use parameters::{
    Axis, Bias, Biases, Contributions, Cosmology, IntegrationSettings, NlTerm, Parameters,
    Population,
};
pub use quadrature::{IntegrationMethod, Tolerance};
pub use settings::Settings;
