//! Error types for model fitting and filter design.

use thiserror::Error;

/// Result type for fallible synthesis operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while fitting models or designing filters.
///
/// None of these ever cross the audio callback: the generators log them and keep
/// their previous state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A root solve diverged or produced `NaN`.
    #[error("{equation} solve did not converge")]
    NonConvergent {
        /// Name of the equation being solved.
        equation: &'static str,
    },

    /// The requested filter type is not one of low-pass, high-pass, band-pass, band-stop.
    #[error("unknown filter type: {0}")]
    UnknownFilterType(String),

    /// An analog prototype pole ended up in the right half of the s-plane.
    #[error("filter pole {re} + {im}i is in the right half plane")]
    UnstablePole {
        /// Real part of the offending pole.
        re: f64,
        /// Imaginary part of the offending pole.
        im: f64,
    },

    /// Complex roots could not be grouped into conjugate pairs.
    #[error("could not pair all complex roots into conjugates")]
    UnpairedRoots,

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Creates an invalid parameter error.
    pub fn invalid_param(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Creates a non-convergence error.
    pub fn non_convergent(equation: &'static str) -> Self {
        Self::NonConvergent { equation }
    }
}
