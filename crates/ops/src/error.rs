//! Operational service error types.

use domain::{OrderError, PickupError, StockError};
use store::StoreError;
use thiserror::Error;

use common::OrderId;

/// Errors raised by the operational services.
///
/// This is the public failure taxonomy of the platform: every enumerated
/// condition surfaces as its own kind so callers can tell a bad request
/// from a state-machine rejection from a lost race.
#[derive(Debug, Error)]
pub enum OpsError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request itself is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The order state machine rejected the operation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A slot quantity bound rejected the operation.
    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    /// The pickup state machine rejected the operation.
    #[error("Pickup error: {0}")]
    Pickup(#[from] PickupError),

    /// A refund notification arrived for an order with no captured payment.
    #[error("Order {order_id} has no captured payment to refund against")]
    RefundBeforePayment { order_id: OrderId },

    /// Concurrent writers kept the operation from committing.
    #[error("Gave up on {entity} {id} after {attempts} conflicting writes")]
    Conflict {
        entity: &'static str,
        id: String,
        attempts: u32,
    },

    /// The product catalog failed to answer.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The admin directory failed to answer.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Persistence error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl OpsError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OpsError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: impl ToString) -> Self {
        OpsError::Conflict {
            entity,
            id: id.to_string(),
            attempts: crate::MAX_COMMIT_ATTEMPTS,
        }
    }
}

/// Convenience type alias for operational results.
pub type Result<T> = std::result::Result<T, OpsError>;
