//! Shared error type for the publisher core.
//!
//! Crate-local errors (`bc_messaging::SendError`, `bc_store::StoreError`, ...)
//! convert into this enum at the boundaries where callers need a single type,
//! mirroring the flat `#[error("...: {0}")]` shape used throughout this codebase.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("content is structurally broken and cannot be sent: {0}")]
    Structural(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl CoreError {
    /// Whether a failure of this kind should be retried by the worker.
    ///
    /// Structural and validation failures will not be fixed by retrying;
    /// everything else is given the benefit of the doubt and left to the
    /// attempts cap to bound the damage.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CoreError::Structural(_) | CoreError::Validation(_))
    }
}
