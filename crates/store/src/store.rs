use async_trait::async_trait;

use common::{MachineId, OrderId, PaymentRef, PickupId, RestockId, StockId, Version};
use domain::{Alert, Order, Pickup, PickupState, Restock, Stock};

use crate::Result;

/// Core trait for vending platform persistence.
///
/// Each method is one atomic unit of work: a method that touches several
/// rows either applies all of its writes or none of them. Writes to
/// versioned entities use optimistic concurrency; a write made against a
/// stale version fails with `VersionConflict` and the caller is expected
/// to reload and retry.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait VendingStore: Send + Sync {
    /// Persists a new order together with its frozen item snapshots.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Loads an order with its items and refund ledger.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Finds the order a payment provider reference belongs to.
    ///
    /// If several orders share the reference, the most recently created
    /// one wins.
    async fn find_order_by_payment_ref(&self, payment_ref: &PaymentRef)
    -> Result<Option<Order>>;

    /// Writes an order's mutable state back, guarded by its version.
    ///
    /// Item snapshots are never rewritten; the refund ledger is replaced
    /// in the same unit of work. Fails with `VersionConflict` if the row
    /// moved past the version the order was loaded at.
    ///
    /// Returns the new version. The caller stamps it onto the entity.
    async fn update_order(&self, order: &Order) -> Result<Version>;

    /// Lists all orders, most recently created first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Persists a new stock row.
    ///
    /// Fails with `SlotTaken` if the machine slot is already configured.
    async fn insert_stock(&self, stock: &Stock) -> Result<()>;

    /// Loads a stock row by id.
    async fn get_stock(&self, id: StockId) -> Result<Option<Stock>>;

    /// Loads a stock row by id, but only if it belongs to the machine.
    async fn get_stock_scoped(&self, id: StockId, machine_id: MachineId)
    -> Result<Option<Stock>>;

    /// Lists a machine's stock rows in slot order.
    async fn list_stock_for_machine(&self, machine_id: MachineId) -> Result<Vec<Stock>>;

    /// Writes a stock row's quantity back, guarded by its version.
    ///
    /// Returns the new version. The caller stamps it onto the entity.
    async fn update_stock(&self, stock: &Stock) -> Result<Version>;

    /// Applies a restock batch atomically.
    ///
    /// Every updated stock row is written with a version guard and the
    /// restock audit record is inserted in the same unit of work. If any
    /// row fails its guard, nothing is applied.
    async fn apply_restock(&self, restock: &Restock, updated: &[Stock]) -> Result<()>;

    /// Loads a restock record with its per-slot items.
    async fn get_restock(&self, id: RestockId) -> Result<Option<Restock>>;

    /// Lists a machine's restock records, most recent first.
    async fn list_restocks_for_machine(&self, machine_id: MachineId) -> Result<Vec<Restock>>;

    /// Persists a new pickup.
    ///
    /// Fails with `PendingPickupExists` if the order already has a
    /// pending pickup.
    async fn insert_pickup(&self, pickup: &Pickup) -> Result<()>;

    /// Loads a pickup by id.
    async fn get_pickup(&self, id: PickupId) -> Result<Option<Pickup>>;

    /// Lists an order's pickups, oldest first.
    async fn list_pickups_for_order(&self, order_id: OrderId) -> Result<Vec<Pickup>>;

    /// Writes a pickup back, guarded by the state it was loaded in.
    ///
    /// Fails with `PickupNotPending` if the row left that state in the
    /// meantime.
    async fn update_pickup(&self, pickup: &Pickup, expected: PickupState) -> Result<()>;

    /// Completes a pickup and consumes its order in one unit of work.
    ///
    /// The pickup write is guarded by the pending state and the order
    /// write by its version; if either guard fails, neither row changes.
    ///
    /// Returns the order's new version.
    async fn complete_pickup(&self, pickup: &Pickup, order: &Order) -> Result<Version>;

    /// Replaces a machine's alerts with a freshly derived set.
    ///
    /// The delete and the inserts are one unit of work, so readers never
    /// observe a half-swapped set.
    async fn replace_alerts(&self, machine_id: MachineId, alerts: Vec<Alert>) -> Result<()>;

    /// Lists a machine's alerts ordered by alert type.
    async fn list_alerts_for_machine(&self, machine_id: MachineId) -> Result<Vec<Alert>>;

    /// Lists active alerts across all machines.
    async fn list_active_alerts(&self) -> Result<Vec<Alert>>;
}
