//! Order entity implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Currency, Money, OrderId, PaymentRef, ProductId, RefundId, Version};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderState};

/// A line item with price and label frozen at order creation.
///
/// Later catalog edits never change what the buyer agreed to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product identifier from the catalog.
    pub product_id: ProductId,

    /// Product label as shown to the buyer at purchase time.
    pub label: String,

    /// Number of units ordered.
    pub quantity: u32,

    /// Price per unit at purchase time, in minor units.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new line item.
    pub fn new(
        product_id: impl Into<ProductId>,
        label: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            label: label.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity times unit price.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The effect of recording one refund notification on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The notification matched the ledger exactly; nothing changed.
    Unchanged,

    /// The refund was recorded; the refunded total is below the order total.
    PartialRecorded,

    /// The refund was recorded and the order transitioned to `Refunded`.
    FullyRefunded,
}

/// A customer order.
///
/// Carries the full purchase lifecycle from creation through payment,
/// pickup, and refunds. Item snapshots are immutable after creation and
/// the order total is frozen exactly once, at activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    id: OrderId,

    /// Current state of the order.
    state: OrderState,

    /// Frozen line items.
    items: Vec<OrderItem>,

    /// Total charged at activation. `None` until payment is captured.
    amount_total: Option<Money>,

    /// Currency of the captured payment.
    currency: Option<Currency>,

    /// Payment provider reference for this order's payment session.
    payment_ref: Option<PaymentRef>,

    /// Cumulative refunded amount per provider refund id.
    refunds: BTreeMap<RefundId, Money>,

    /// When the order was created.
    created_at: DateTime<Utc>,

    /// Current version for optimistic concurrency.
    version: Version,
}

// Query methods
impl Order {
    /// Returns the order identifier.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Returns the frozen line items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the frozen order total, if payment was captured.
    pub fn amount_total(&self) -> Option<Money> {
        self.amount_total
    }

    /// Returns the payment currency, if payment was captured.
    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    /// Returns the payment provider reference, if a session was opened.
    pub fn payment_ref(&self) -> Option<&PaymentRef> {
        self.payment_ref.as_ref()
    }

    /// Returns the refund ledger.
    pub fn refunds(&self) -> &BTreeMap<RefundId, Money> {
        &self.refunds
    }

    /// Returns the sum of all item subtotals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|item| item.subtotal()).sum()
    }

    /// Returns the sum of all recorded refunds.
    pub fn refunded_total(&self) -> Money {
        self.refunds.values().copied().sum()
    }

    /// Returns when the order was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the current version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods
impl Order {
    /// Creates a new pending order from frozen line items.
    pub fn new(items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.minor(),
                });
            }
        }

        Ok(Self {
            id: OrderId::new(),
            state: OrderState::Pending,
            items,
            amount_total: None,
            currency: None,
            payment_ref: None,
            refunds: BTreeMap::new(),
            created_at: Utc::now(),
            version: Version::first(),
        })
    }

    /// Opens (or replaces) a payment session with the provider.
    ///
    /// Re-entrant before activation: abandoning a checkout and starting a
    /// new one simply replaces the payment reference.
    pub fn begin_payment(&mut self, payment_ref: PaymentRef) -> Result<(), OrderError> {
        if !self.state.can_begin_payment() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "begin payment",
            });
        }

        self.state = OrderState::RequiresPayment;
        self.payment_ref = Some(payment_ref);
        Ok(())
    }

    /// Activates the order after payment capture.
    ///
    /// Freezes the order total to the sum of item subtotals and records the
    /// captured currency and payment reference. The total is set exactly
    /// once; activation from any post-payment state is rejected.
    pub fn activate(
        &mut self,
        currency: Currency,
        payment_ref: PaymentRef,
    ) -> Result<(), OrderError> {
        if !self.state.can_activate() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "activate",
            });
        }
        if self.amount_total.is_some() {
            return Err(OrderError::AmountAlreadySet);
        }

        self.state = OrderState::Active;
        self.amount_total = Some(self.items_total());
        self.currency = Some(currency);
        self.payment_ref = Some(payment_ref);
        Ok(())
    }

    /// Consumes the order after a successful pickup.
    pub fn mark_used(&mut self) -> Result<(), OrderError> {
        if !self.state.can_mark_used() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "mark used",
            });
        }

        self.state = OrderState::Used;
        Ok(())
    }

    /// Cancels the order before payment.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.state.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "cancel",
            });
        }

        self.state = OrderState::Cancelled;
        Ok(())
    }

    /// Expires the order after its payment window lapsed.
    pub fn expire(&mut self) -> Result<(), OrderError> {
        if !self.state.can_expire() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "expire",
            });
        }

        self.state = OrderState::Expired;
        Ok(())
    }

    /// Records a refund notification in the ledger.
    ///
    /// The amount is the cumulative refunded amount for `refund_id`, so a
    /// redelivered notification is absorbed without double counting. When
    /// the ledger reaches the order total the order transitions to
    /// `Refunded`. A notification that would push the ledger past the total
    /// is rejected and nothing is recorded.
    pub fn apply_refund(
        &mut self,
        refund_id: RefundId,
        amount: Money,
    ) -> Result<RefundOutcome, OrderError> {
        if amount.is_negative() {
            return Err(OrderError::InvalidRefundAmount { amount });
        }

        match self.state {
            OrderState::Active => {
                let total = self.amount_total.ok_or(OrderError::AmountUnknown)?;
                let previous = self.refunds.get(&refund_id).copied();
                if previous == Some(amount) {
                    return Ok(RefundOutcome::Unchanged);
                }

                let candidate = self.refunded_total() - previous.unwrap_or_default() + amount;
                if candidate > total {
                    return Err(OrderError::RefundExceedsTotal {
                        refunded: candidate,
                        total,
                    });
                }

                self.refunds.insert(refund_id, amount);
                if candidate == total {
                    self.state = OrderState::Refunded;
                    Ok(RefundOutcome::FullyRefunded)
                } else {
                    Ok(RefundOutcome::PartialRecorded)
                }
            }
            // A fully refunded order absorbs redeliveries of refunds it
            // already knows about but accepts no new ones.
            OrderState::Refunded if self.refunds.get(&refund_id) == Some(&amount) => {
                Ok(RefundOutcome::Unchanged)
            }
            _ => Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "record refund",
            }),
        }
    }
}

// Persistence support
impl Order {
    /// Reassembles an order from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        state: OrderState,
        items: Vec<OrderItem>,
        amount_total: Option<Money>,
        currency: Option<Currency>,
        payment_ref: Option<PaymentRef>,
        refunds: BTreeMap<RefundId, Money>,
        created_at: DateTime<Utc>,
        version: Version,
    ) -> Self {
        Self {
            id,
            state,
            items,
            amount_total,
            currency,
            payment_ref,
            refunds,
            created_at,
            version,
        }
    }

    /// Sets the version after a successful store write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
