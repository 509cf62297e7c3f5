//! Error taxonomy shared by every entry point.
//!
//! Errors are raised at the point of detection and carry a descriptive
//! message. The engine is deterministic, so none of them are retryable
//! without changing the input.

/// Error returned by all fallible operations in this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// Malformed input shape: empty sample, ragged table, mismatched
    /// lengths, non-finite values, too few observations, or predicting
    /// from an untrained model.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid option: unsupported alternative hypothesis, significance
    /// level outside (0, 1), or an unsupported model hyperparameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Numerically undefined operation on otherwise valid input: zero
    /// variance, singular design matrix, degenerate degrees of freedom.
    #[error("computation error: {0}")]
    Computation(String),

    /// Model fitting was stopped by the caller between iterations.
    #[error("fit cancelled")]
    Cancelled,
}

impl InferenceError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }
}

impl From<u_numflow::matrix::MatrixError> for InferenceError {
    fn from(e: u_numflow::matrix::MatrixError) -> Self {
        Self::Computation(e.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T, E = InferenceError> = std::result::Result<T, E>;
