//! Error types shared by every stage of the computation.

use std::path::PathBuf;

/// Coarse classification of a [`CoffeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed grid or axis data, or inconsistent settings.
    InvalidInput,
    /// A query outside the domain of an interpolation or the background.
    Domain,
    /// A quadrature failed to reach its target precision.
    Convergence,
    /// Reading or writing files.
    Io,
}

/// Error types for the integral engine and correlation assembly
#[derive(Debug, thiserror::Error)]
pub enum CoffeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{what} = {value:e} is outside the domain [{min:e}, {max:e}]")]
    Domain {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error(
        "{what} did not converge: estimate {estimate:e}, error {error:e}, tolerance {tolerance:e}"
    )]
    Convergence {
        what: &'static str,
        estimate: f64,
        error: f64,
        tolerance: f64,
    },

    #[error("integral I^{n}_{l} was not computed")]
    MissingIntegral { n: i32, l: i32 },

    #[error("integral I^{n}_{l}: {source}")]
    Integral {
        n: i32,
        l: i32,
        #[source]
        source: Box<CoffeError>,
    },

    #[error("at z_mean = {z_mean}, separation = {separation}, mu = {mu}: {source}")]
    Coordinate {
        z_mean: f64,
        separation: f64,
        mu: f64,
        #[source]
        source: Box<CoffeError>,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl CoffeError {
    /// Classify the error, looking through the context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::MissingIntegral { .. } | Self::Settings(_) => {
                ErrorKind::InvalidInput
            }
            Self::Domain { .. } => ErrorKind::Domain,
            Self::Convergence { .. } => ErrorKind::Convergence,
            Self::Integral { source, .. } | Self::Coordinate { source, .. } => source.kind(),
            Self::Io { .. } | Self::Parse { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CoffeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_looks_through_context() {
        let inner = CoffeError::Convergence {
            what: "tanh-sinh quadrature",
            estimate: 1.0,
            error: 0.5,
            tolerance: 1e-6,
        };
        let wrapped = CoffeError::Coordinate {
            z_mean: 1.0,
            separation: 20.0,
            mu: 0.5,
            source: Box::new(CoffeError::Integral {
                n: 4,
                l: 0,
                source: Box::new(inner),
            }),
        };
        assert_eq!(wrapped.kind(), ErrorKind::Convergence);
    }

    #[test]
    fn display_names_the_coordinate() {
        let err = CoffeError::Coordinate {
            z_mean: 0.5,
            separation: 10.0,
            mu: 0.0,
            source: Box::new(CoffeError::MissingIntegral { n: 0, l: 2 }),
        };
        let msg = err.to_string();
        assert!(msg.contains("z_mean = 0.5"));
        assert!(msg.contains("I^0_2"));
    }

    #[test]
    fn domain_error_is_classified() {
        let err = CoffeError::Domain {
            what: "redshift",
            value: 20.0,
            min: 0.0,
            max: 15.0,
        };
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert!(err.to_string().contains("redshift"));
    }
}
