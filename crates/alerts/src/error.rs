//! Alert error types.

use thiserror::Error;

/// Errors that can occur while deriving or persisting alerts.
#[derive(Debug, Error)]
pub enum AlertError {
    /// An error occurred in the backing store.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
