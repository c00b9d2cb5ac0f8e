//! Error types for completeness computations.

use polars::prelude::PolarsError;

/// Result type for completeness computations
pub type CompletenessResult<T> = Result<T, CompletenessError>;

/// Error type for completeness computations
#[derive(Debug, thiserror::Error)]
pub enum CompletenessError {
    #[error("Configuration error: no such field '{0}' in stellar catalog")]
    UnknownField(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Fit did not converge: {0}")]
    FitDidNotConverge(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] PolarsError),
}

impl CompletenessError {
    /// Returns `true` for errors caught before any numeric work starts.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CompletenessError::UnknownField(_) | CompletenessError::Configuration(_)
        )
    }
}
