//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► RequiresPayment ──► Active ──┬──► Used
///     │               │                    └──► Refunded
///     └───────────────┴──► Expired | Cancelled
/// ```
///
/// Payment capture may also activate an order straight from `Pending`,
/// skipping the payment-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order created, no payment session opened yet.
    #[default]
    Pending,

    /// A payment session is open with the provider.
    RequiresPayment,

    /// Payment captured; the order can be picked up or refunded.
    Active,

    /// The goods were dispensed (terminal state).
    Used,

    /// The full amount was refunded back to the buyer (terminal state).
    Refunded,

    /// The order timed out before payment (terminal state).
    Expired,

    /// The order was cancelled before payment (terminal state).
    Cancelled,
}

impl OrderState {
    /// Returns true if a payment session can be opened or replaced in this state.
    pub fn can_begin_payment(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::RequiresPayment)
    }

    /// Returns true if payment capture can activate the order in this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::RequiresPayment)
    }

    /// Returns true if a pickup can consume the order in this state.
    pub fn can_mark_used(&self) -> bool {
        matches!(self, OrderState::Active)
    }

    /// Returns true if new refunds can be recorded in this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, OrderState::Active)
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::RequiresPayment)
    }

    /// Returns true if the order can expire in this state.
    pub fn can_expire(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::RequiresPayment)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Used | OrderState::Refunded | OrderState::Expired | OrderState::Cancelled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "Pending",
            OrderState::RequiresPayment => "RequiresPayment",
            OrderState::Active => "Active",
            OrderState::Used => "Used",
            OrderState::Refunded => "Refunded",
            OrderState::Expired => "Expired",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(OrderState::default(), OrderState::Pending);
    }

    #[test]
    fn test_pre_payment_states_can_begin_payment() {
        assert!(OrderState::Pending.can_begin_payment());
        assert!(OrderState::RequiresPayment.can_begin_payment());
        assert!(!OrderState::Active.can_begin_payment());
        assert!(!OrderState::Used.can_begin_payment());
        assert!(!OrderState::Refunded.can_begin_payment());
        assert!(!OrderState::Expired.can_begin_payment());
        assert!(!OrderState::Cancelled.can_begin_payment());
    }

    #[test]
    fn test_pre_payment_states_can_activate() {
        assert!(OrderState::Pending.can_activate());
        assert!(OrderState::RequiresPayment.can_activate());
        assert!(!OrderState::Active.can_activate());
        assert!(!OrderState::Used.can_activate());
        assert!(!OrderState::Refunded.can_activate());
        assert!(!OrderState::Expired.can_activate());
        assert!(!OrderState::Cancelled.can_activate());
    }

    #[test]
    fn test_only_active_can_mark_used() {
        assert!(OrderState::Active.can_mark_used());
        assert!(!OrderState::Pending.can_mark_used());
        assert!(!OrderState::RequiresPayment.can_mark_used());
        assert!(!OrderState::Used.can_mark_used());
        assert!(!OrderState::Refunded.can_mark_used());
        assert!(!OrderState::Expired.can_mark_used());
        assert!(!OrderState::Cancelled.can_mark_used());
    }

    #[test]
    fn test_only_active_can_refund() {
        assert!(OrderState::Active.can_refund());
        assert!(!OrderState::Pending.can_refund());
        assert!(!OrderState::RequiresPayment.can_refund());
        assert!(!OrderState::Used.can_refund());
        assert!(!OrderState::Refunded.can_refund());
        assert!(!OrderState::Expired.can_refund());
        assert!(!OrderState::Cancelled.can_refund());
    }

    #[test]
    fn test_can_cancel_and_expire_before_activation() {
        for state in [OrderState::Pending, OrderState::RequiresPayment] {
            assert!(state.can_cancel());
            assert!(state.can_expire());
        }
        for state in [
            OrderState::Active,
            OrderState::Used,
            OrderState::Refunded,
            OrderState::Expired,
            OrderState::Cancelled,
        ] {
            assert!(!state.can_cancel());
            assert!(!state.can_expire());
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderState::Pending.is_terminal());
        assert!(!OrderState::RequiresPayment.is_terminal());
        assert!(!OrderState::Active.is_terminal());
        assert!(OrderState::Used.is_terminal());
        assert!(OrderState::Refunded.is_terminal());
        assert!(OrderState::Expired.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderState::Pending.to_string(), "Pending");
        assert_eq!(OrderState::RequiresPayment.to_string(), "RequiresPayment");
        assert_eq!(OrderState::Active.to_string(), "Active");
        assert_eq!(OrderState::Used.to_string(), "Used");
        assert_eq!(OrderState::Refunded.to_string(), "Refunded");
    }

    #[test]
    fn test_serialization() {
        let state = OrderState::RequiresPayment;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"RequiresPayment\"");
        let deserialized: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
