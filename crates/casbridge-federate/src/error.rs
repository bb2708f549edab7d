//! Federation error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for federation operations.
pub type FederateResult<T> = Result<T, FederateError>;

/// Federation bridge errors.
///
/// The degraded protocol states never reach this type: an unknown provider
/// yields a disabled session or a dropped push, upstream rejection yields a
/// `Rejected` outcome, and missing rows during SLO fan-in are skipped. What
/// remains is backing-store failure.
#[derive(Debug, Error)]
pub enum FederateError {
    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
