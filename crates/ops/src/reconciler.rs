//! Payment provider event reconciliation.
//!
//! The provider delivers events at least once and in no particular
//! order. Both handlers are idempotent: redelivering an event that was
//! already applied reports [`ReconcileOutcome::AlreadyApplied`] and
//! writes nothing, so the webhook can always acknowledge duplicates.

use std::sync::Arc;

use common::{Currency, Money, OrderId, PaymentRef, RefundId};
use domain::{OrderState, RefundOutcome};
use serde::{Deserialize, Serialize};
use store::{StoreError, VendingStore};

use crate::MAX_COMMIT_ATTEMPTS;
use crate::error::{OpsError, Result};

/// A captured payment reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    /// The order the payment was taken for.
    pub order_ref: OrderId,
    /// Provider reference for the payment session.
    pub payment_ref: PaymentRef,
    /// Captured amount in minor units.
    pub amount: Money,
    /// Captured currency.
    pub currency: Currency,
}

/// A refund state report from the provider.
///
/// `refunded_amount` is the cumulative amount refunded under
/// `refund_id`, not an increment; redeliveries carry the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundUpdated {
    /// Provider reference of the refunded payment.
    pub payment_ref: PaymentRef,
    /// Provider identifier of the refund itself.
    pub refund_id: RefundId,
    /// Cumulative refunded amount for this refund id.
    pub refunded_amount: Money,
}

/// The visible effect of reconciling one provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The payment activated its order.
    Activated,
    /// The refund was recorded; the order stays active.
    RefundRecorded,
    /// The refund completed the ledger; the order is now refunded.
    Refunded,
    /// A redelivered event matched what is already recorded.
    AlreadyApplied,
}

impl ReconcileOutcome {
    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Activated => "activated",
            ReconcileOutcome::RefundRecorded => "refund_recorded",
            ReconcileOutcome::Refunded => "refunded",
            ReconcileOutcome::AlreadyApplied => "already_applied",
        }
    }
}

/// Applies provider payment and refund events to orders.
pub struct PaymentReconciler<S: VendingStore> {
    store: Arc<S>,
}

impl<S: VendingStore> PaymentReconciler<S> {
    /// Creates a new reconciler.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Applies a captured payment to its order.
    ///
    /// Activation freezes the order total from its own line items; the
    /// provider's reported amount is only compared against it and a
    /// mismatch is logged as drift, never adopted.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_ref))]
    pub async fn payment_succeeded(&self, event: &PaymentSucceeded) -> Result<ReconcileOutcome> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut order = self
                .store
                .get_order(event.order_ref)
                .await?
                .ok_or_else(|| OpsError::not_found("order", event.order_ref))?;

            if matches!(
                order.state(),
                OrderState::Active | OrderState::Used | OrderState::Refunded
            ) {
                if order.payment_ref() != Some(&event.payment_ref) {
                    tracing::warn!(
                        order_id = %event.order_ref,
                        payment_ref = %event.payment_ref,
                        "order already paid under a different payment reference"
                    );
                }
                metrics::counter!("payment_events_duplicate_total").increment(1);
                tracing::debug!(order_id = %event.order_ref, "payment already applied");
                return Ok(ReconcileOutcome::AlreadyApplied);
            }

            // Expired and cancelled orders reject activation here; that
            // error surfaces for manual resolution instead of being
            // silently absorbed.
            order.activate(event.currency.clone(), event.payment_ref.clone())?;

            if order.amount_total() != Some(event.amount) {
                metrics::counter!("payment_amount_drift_total").increment(1);
                tracing::warn!(
                    order_id = %event.order_ref,
                    captured = event.amount.minor(),
                    frozen = order.items_total().minor(),
                    "captured amount differs from the order total"
                );
            }

            match self.store.update_order(&order).await {
                Ok(_) => {
                    metrics::counter!("payments_applied_total").increment(1);
                    tracing::info!(order_id = %event.order_ref, "order activated by payment");
                    return Ok(ReconcileOutcome::Activated);
                }
                // Lost the race; reload and observe the winner's state.
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("order", event.order_ref))
    }

    /// Applies a refund report to the order owning the payment reference.
    ///
    /// Arrival before the payment has been reconciled fails with the
    /// distinguishable `RefundBeforePayment` kind so the provider's retry
    /// policy redelivers later.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_ref = %event.payment_ref, refund_id = %event.refund_id)
    )]
    pub async fn refund_updated(&self, event: &RefundUpdated) -> Result<ReconcileOutcome> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut order = self
                .store
                .find_order_by_payment_ref(&event.payment_ref)
                .await?
                .ok_or_else(|| OpsError::not_found("order", &event.payment_ref))?;

            if matches!(
                order.state(),
                OrderState::Pending | OrderState::RequiresPayment
            ) {
                return Err(OpsError::RefundBeforePayment {
                    order_id: order.id(),
                });
            }

            let outcome = order.apply_refund(event.refund_id.clone(), event.refunded_amount)?;
            if outcome == RefundOutcome::Unchanged {
                metrics::counter!("refund_events_duplicate_total").increment(1);
                tracing::debug!(order_id = %order.id(), "refund already recorded");
                return Ok(ReconcileOutcome::AlreadyApplied);
            }

            match self.store.update_order(&order).await {
                Ok(_) => {
                    return Ok(if outcome == RefundOutcome::FullyRefunded {
                        metrics::counter!("orders_refunded_total").increment(1);
                        tracing::info!(order_id = %order.id(), "order fully refunded");
                        ReconcileOutcome::Refunded
                    } else {
                        metrics::counter!("refunds_recorded_total").increment(1);
                        tracing::info!(
                            order_id = %order.id(),
                            refunded = order.refunded_total().minor(),
                            "partial refund recorded"
                        );
                        ReconcileOutcome::RefundRecorded
                    });
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("order", &event.payment_ref))
    }
}
