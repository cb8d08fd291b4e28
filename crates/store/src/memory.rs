use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{MachineId, OrderId, PaymentRef, PickupId, RestockId, StockId, Version};
use domain::{Alert, Order, Pickup, PickupState, Restock, Stock};

use crate::{Result, StoreError, store::VendingStore};

#[derive(Default)]
struct StoreState {
    orders: HashMap<OrderId, Order>,
    stock: HashMap<StockId, Stock>,
    restocks: HashMap<RestockId, Restock>,
    pickups: HashMap<PickupId, Pickup>,
    alerts: HashMap<MachineId, Vec<Alert>>,
}

/// In-memory store implementation for testing.
///
/// All records live behind a single lock, so multi-row operations are
/// atomic exactly like their PostgreSQL counterparts.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all stored records.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = StoreState::default();
    }
}

#[async_trait]
impl VendingStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn find_order_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Order>> {
        let state = self.state.read().await;
        let order = state
            .orders
            .values()
            .filter(|o| o.payment_ref() == Some(payment_ref))
            .max_by_key(|o| o.created_at())
            .cloned();
        Ok(order)
    }

    async fn update_order(&self, order: &Order) -> Result<Version> {
        let mut state = self.state.write().await;
        let current = state.orders.get(&order.id()).ok_or(StoreError::NotFound {
            entity: "order",
            id: order.id().as_uuid(),
        })?;
        if current.version() != order.version() {
            return Err(StoreError::VersionConflict {
                entity: "order",
                id: order.id().as_uuid(),
                expected: order.version(),
                actual: current.version(),
            });
        }

        let next = order.version().next();
        let mut stored = order.clone();
        stored.set_version(next);
        state.orders.insert(order.id(), stored);
        Ok(next)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn insert_stock(&self, stock: &Stock) -> Result<()> {
        let mut state = self.state.write().await;
        let taken = state.stock.values().any(|s| {
            s.machine_id() == stock.machine_id() && s.slot_number() == stock.slot_number()
        });
        if taken {
            return Err(StoreError::SlotTaken {
                machine_id: stock.machine_id(),
                slot_number: stock.slot_number(),
            });
        }

        state.stock.insert(stock.id(), stock.clone());
        Ok(())
    }

    async fn get_stock(&self, id: StockId) -> Result<Option<Stock>> {
        let state = self.state.read().await;
        Ok(state.stock.get(&id).cloned())
    }

    async fn get_stock_scoped(
        &self,
        id: StockId,
        machine_id: MachineId,
    ) -> Result<Option<Stock>> {
        let state = self.state.read().await;
        Ok(state
            .stock
            .get(&id)
            .filter(|s| s.machine_id() == machine_id)
            .cloned())
    }

    async fn list_stock_for_machine(&self, machine_id: MachineId) -> Result<Vec<Stock>> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .stock
            .values()
            .filter(|s| s.machine_id() == machine_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.slot_number());
        Ok(rows)
    }

    async fn update_stock(&self, stock: &Stock) -> Result<Version> {
        let mut state = self.state.write().await;
        let current = state.stock.get(&stock.id()).ok_or(StoreError::NotFound {
            entity: "stock",
            id: stock.id().as_uuid(),
        })?;
        if current.version() != stock.version() {
            return Err(StoreError::VersionConflict {
                entity: "stock",
                id: stock.id().as_uuid(),
                expected: stock.version(),
                actual: current.version(),
            });
        }

        let next = stock.version().next();
        let mut stored = stock.clone();
        stored.set_version(next);
        state.stock.insert(stock.id(), stored);
        Ok(next)
    }

    async fn apply_restock(&self, restock: &Restock, updated: &[Stock]) -> Result<()> {
        let mut state = self.state.write().await;

        // Check every guard before mutating anything
        for stock in updated {
            let current = state.stock.get(&stock.id()).ok_or(StoreError::NotFound {
                entity: "stock",
                id: stock.id().as_uuid(),
            })?;
            if current.version() != stock.version() {
                return Err(StoreError::VersionConflict {
                    entity: "stock",
                    id: stock.id().as_uuid(),
                    expected: stock.version(),
                    actual: current.version(),
                });
            }
        }

        for stock in updated {
            let mut stored = stock.clone();
            stored.set_version(stock.version().next());
            state.stock.insert(stock.id(), stored);
        }
        state.restocks.insert(restock.id, restock.clone());
        Ok(())
    }

    async fn get_restock(&self, id: RestockId) -> Result<Option<Restock>> {
        let state = self.state.read().await;
        Ok(state.restocks.get(&id).cloned())
    }

    async fn list_restocks_for_machine(&self, machine_id: MachineId) -> Result<Vec<Restock>> {
        let state = self.state.read().await;
        let mut restocks: Vec<_> = state
            .restocks
            .values()
            .filter(|r| r.machine_id == machine_id)
            .cloned()
            .collect();
        restocks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(restocks)
    }

    async fn insert_pickup(&self, pickup: &Pickup) -> Result<()> {
        let mut state = self.state.write().await;
        let pending_exists = state
            .pickups
            .values()
            .any(|p| p.order_id() == pickup.order_id() && p.state() == PickupState::Pending);
        if pending_exists {
            return Err(StoreError::PendingPickupExists(pickup.order_id()));
        }

        state.pickups.insert(pickup.id(), pickup.clone());
        Ok(())
    }

    async fn get_pickup(&self, id: PickupId) -> Result<Option<Pickup>> {
        let state = self.state.read().await;
        Ok(state.pickups.get(&id).cloned())
    }

    async fn list_pickups_for_order(&self, order_id: OrderId) -> Result<Vec<Pickup>> {
        let state = self.state.read().await;
        let mut pickups: Vec<_> = state
            .pickups
            .values()
            .filter(|p| p.order_id() == order_id)
            .cloned()
            .collect();
        pickups.sort_by_key(|p| p.created_at());
        Ok(pickups)
    }

    async fn update_pickup(&self, pickup: &Pickup, expected: PickupState) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state.pickups.get(&pickup.id()).ok_or(StoreError::NotFound {
            entity: "pickup",
            id: pickup.id().as_uuid(),
        })?;
        if current.state() != expected {
            return Err(StoreError::PickupNotPending {
                id: pickup.id(),
                state: current.state(),
            });
        }

        state.pickups.insert(pickup.id(), pickup.clone());
        Ok(())
    }

    async fn complete_pickup(&self, pickup: &Pickup, order: &Order) -> Result<Version> {
        let mut state = self.state.write().await;

        // Check both guards before mutating anything
        let current_pickup = state.pickups.get(&pickup.id()).ok_or(StoreError::NotFound {
            entity: "pickup",
            id: pickup.id().as_uuid(),
        })?;
        if current_pickup.state() != PickupState::Pending {
            return Err(StoreError::PickupNotPending {
                id: pickup.id(),
                state: current_pickup.state(),
            });
        }

        let current_order = state.orders.get(&order.id()).ok_or(StoreError::NotFound {
            entity: "order",
            id: order.id().as_uuid(),
        })?;
        if current_order.version() != order.version() {
            return Err(StoreError::VersionConflict {
                entity: "order",
                id: order.id().as_uuid(),
                expected: order.version(),
                actual: current_order.version(),
            });
        }

        let next = order.version().next();
        let mut stored_order = order.clone();
        stored_order.set_version(next);
        state.orders.insert(order.id(), stored_order);
        state.pickups.insert(pickup.id(), pickup.clone());
        Ok(next)
    }

    async fn replace_alerts(&self, machine_id: MachineId, alerts: Vec<Alert>) -> Result<()> {
        let mut state = self.state.write().await;
        state.alerts.insert(machine_id, alerts);
        Ok(())
    }

    async fn list_alerts_for_machine(&self, machine_id: MachineId) -> Result<Vec<Alert>> {
        let state = self.state.read().await;
        let mut alerts = state.alerts.get(&machine_id).cloned().unwrap_or_default();
        alerts.sort_by_key(|a| a.alert_type.as_str());
        Ok(alerts)
    }

    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let state = self.state.read().await;
        let mut alerts: Vec<_> = state
            .alerts
            .values()
            .flatten()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| (a.machine_id.as_uuid(), a.alert_type.as_str()));
        Ok(alerts)
    }
}
