//! Order model: lifecycle state machine, frozen item snapshots, and the
//! refund ledger.

mod entity;
mod state;

pub use entity::{Order, OrderItem, RefundOutcome};
pub use state::OrderState;

use common::Money;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// The order total is already frozen and cannot be set again.
    #[error("Order amount is already set")]
    AmountAlreadySet,

    /// A refund arrived for an order whose total was never frozen.
    #[error("Order amount is not set")]
    AmountUnknown,

    /// Recording the refund would push the refunded total past the order total.
    #[error("Refund total {refunded} exceeds order total {total}")]
    RefundExceedsTotal { refunded: Money, total: Money },

    /// Refund amounts cannot be negative.
    #[error("Invalid refund amount: {amount}")]
    InvalidRefundAmount { amount: Money },
}
