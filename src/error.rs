use thiserror::Error;

/// Errors raised by the CCSD solver and its building blocks.
///
/// Non-convergence is deliberately absent: an exhausted iteration budget is
/// reported through [`CCSDStatus`](crate::structs::CCSDStatus) together with
/// the last amplitudes.
#[derive(Debug, Error)]
pub enum CCError {
    /// Tensor dimensions inconsistent with each other or with the
    /// occupied/virtual boundary.
    #[error("shape error: {0}")]
    Shape(String),

    /// Malformed contraction specification.
    #[error("invalid subscripts `{subscripts}`: {reason}")]
    Subscripts { subscripts: String, reason: String },

    /// Invalid solver configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Amplitudes became NaN or infinite, usually from a degenerate
    /// denominator or malformed integrals.
    #[error("non-finite amplitudes at iteration {iteration} (check denominators and integrals)")]
    NonFinite { iteration: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input array that cannot be interpreted as a tensor.
    #[error("npy error in `{file}`: {reason}")]
    Npy { file: String, reason: String },
}

pub type CCResult<T> = Result<T, CCError>;

impl CCError {
    pub(crate) fn subscripts(subscripts: &str, reason: impl Into<String>) -> Self {
        CCError::Subscripts { subscripts: subscripts.to_string(), reason: reason.into() }
    }
}
