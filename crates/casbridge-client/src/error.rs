//! CAS client error types.

use thiserror::Error;

/// Result type for CAS client operations.
pub type CasClientResult<T> = Result<T, CasClientError>;

/// Errors talking to an upstream CAS provider.
#[derive(Debug, Error)]
pub enum CasClientError {
    /// Network-level failure or non-success HTTP status from the provider.
    #[error("transport error talking to CAS provider: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but the validation response could not be decoded.
    #[error("invalid CAS validation response: {0}")]
    InvalidResponse(String),
}
