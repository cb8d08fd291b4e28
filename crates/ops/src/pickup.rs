//! Pickup attempts at machines.

use std::sync::Arc;

use chrono::Utc;
use common::{MachineId, OrderId, PickupId};
use domain::{Order, OrderError, Pickup, PickupState};
use store::{StoreError, VendingStore};

use crate::MAX_COMMIT_ATTEMPTS;
use crate::error::{OpsError, Result};

/// Starts, completes, and fails pickup attempts.
///
/// Completing a pickup consumes its order; the pickup write and the order
/// write happen in one store transaction so the pair can never drift
/// apart.
pub struct PickupService<S: VendingStore> {
    store: Arc<S>,
}

impl<S: VendingStore> PickupService<S> {
    /// Creates a new pickup service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Starts a pickup for an active order at a machine.
    ///
    /// An order has at most one pending pickup at a time; the store
    /// enforces this atomically on insert.
    #[tracing::instrument(skip(self))]
    pub async fn create_pickup(&self, order_id: OrderId, machine_id: MachineId) -> Result<Pickup> {
        let order = self.load_order(order_id).await?;
        if !order.state().can_mark_used() {
            return Err(OpsError::Order(OrderError::InvalidStateTransition {
                current_state: order.state(),
                action: "start pickup",
            }));
        }

        let pickup = Pickup::new(order_id, machine_id);
        self.store.insert_pickup(&pickup).await?;

        metrics::counter!("pickups_started_total").increment(1);
        tracing::info!(pickup_id = %pickup.id(), order_id = %order_id, "pickup started");
        Ok(pickup)
    }

    /// Completes a pickup and consumes its order in one unit of work.
    ///
    /// The outcome is always exactly one of {pickup completed and order
    /// used} or the pre-call state.
    #[tracing::instrument(skip(self))]
    pub async fn complete_pickup(&self, pickup_id: PickupId) -> Result<Pickup> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut pickup = self.load_pickup(pickup_id).await?;
            pickup.complete(Utc::now())?;

            let mut order = self.load_order(pickup.order_id()).await?;
            order.mark_used()?;

            match self.store.complete_pickup(&pickup, &order).await {
                Ok(_) => {
                    metrics::counter!("pickups_completed_total").increment(1);
                    tracing::info!(
                        pickup_id = %pickup_id,
                        order_id = %order.id(),
                        "pickup completed, order consumed"
                    );
                    return Ok(pickup);
                }
                // The order moved; reload both and re-validate. If it was
                // refunded in the meantime, mark_used rejects the retry.
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("pickup", pickup_id))
    }

    /// Marks a pickup as failed, leaving the order available for another
    /// attempt.
    #[tracing::instrument(skip(self))]
    pub async fn fail_pickup(&self, pickup_id: PickupId) -> Result<Pickup> {
        let mut pickup = self.load_pickup(pickup_id).await?;
        pickup.fail()?;
        self.store
            .update_pickup(&pickup, PickupState::Pending)
            .await?;

        metrics::counter!("pickups_failed_total").increment(1);
        tracing::info!(
            pickup_id = %pickup_id,
            order_id = %pickup.order_id(),
            "pickup failed, order stays available"
        );
        Ok(pickup)
    }

    /// Loads one pickup.
    pub async fn get_pickup(&self, pickup_id: PickupId) -> Result<Pickup> {
        self.load_pickup(pickup_id).await
    }

    /// Lists an order's pickups, oldest first.
    pub async fn pickups_for_order(&self, order_id: OrderId) -> Result<Vec<Pickup>> {
        Ok(self.store.list_pickups_for_order(order_id).await?)
    }

    async fn load_pickup(&self, pickup_id: PickupId) -> Result<Pickup> {
        self.store
            .get_pickup(pickup_id)
            .await?
            .ok_or_else(|| OpsError::not_found("pickup", pickup_id))
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OpsError::not_found("order", order_id))
    }
}
