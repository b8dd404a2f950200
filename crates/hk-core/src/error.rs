//! Error types for histkit

use thiserror::Error;

/// histkit error type
#[derive(Error, Debug)]
pub enum Error {
    /// A vital sample/region/variation/variable lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed formula string (odd token count, non-numeric coefficient).
    #[error("formula error: {0}")]
    Formula(String),

    /// Validation error (mismatched list lengths, bad binning, duplicate keys).
    #[error("validation error: {0}")]
    Validation(String),

    /// Computation error (division by zero, non-finite result).
    #[error("computation error: {0}")]
    Computation(String),

    /// Fit error from the binned minimizer.
    #[error("fit error: {0}")]
    Fit(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
