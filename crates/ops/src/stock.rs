//! Slot configuration and the stock quantity ledger.

use std::sync::Arc;

use alerts::AlertService;
use common::{MachineId, ProductId, StockId};
use domain::Stock;
use store::{StoreError, VendingStore};

use crate::MAX_COMMIT_ATTEMPTS;
use crate::error::{OpsError, Result};

/// Configures machine slots and applies quantity changes.
///
/// Every quantity change, including dispense-time decrements reported by
/// machines, goes through [`StockService::apply_delta`] so the
/// `0..=max_capacity` bounds hold everywhere.
pub struct StockService<S: VendingStore> {
    store: Arc<S>,
    alerts: AlertService<S>,
}

impl<S: VendingStore> StockService<S> {
    /// Creates a new stock service.
    pub fn new(store: Arc<S>) -> Self {
        let alerts = AlertService::new(Arc::clone(&store));
        Self { store, alerts }
    }

    /// Configures a new slot on a machine.
    ///
    /// New slots start empty; the first fill is a restock.
    #[tracing::instrument(skip(self))]
    pub async fn configure_slot(
        &self,
        machine_id: MachineId,
        slot_number: u32,
        product_id: ProductId,
        max_capacity: u32,
        low_threshold: u32,
    ) -> Result<Stock> {
        if max_capacity == 0 {
            return Err(OpsError::InvalidInput(
                "max_capacity must be at least 1".to_string(),
            ));
        }
        if low_threshold > max_capacity {
            return Err(OpsError::InvalidInput(format!(
                "low_threshold {low_threshold} exceeds max_capacity {max_capacity}"
            )));
        }

        let stock = Stock::new(machine_id, slot_number, product_id, max_capacity, low_threshold);
        self.store.insert_stock(&stock).await?;
        self.alerts.recompute_best_effort(machine_id).await;

        metrics::counter!("slots_configured_total").increment(1);
        tracing::info!(machine_id = %machine_id, slot_number, "slot configured");
        Ok(stock)
    }

    /// Applies a signed quantity change to one slot and returns it updated.
    ///
    /// Dispensing passes a negative delta; manual corrections go either way.
    #[tracing::instrument(skip(self))]
    pub async fn apply_delta(&self, stock_id: StockId, delta: i32) -> Result<Stock> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut stock = self.load(stock_id).await?;
            stock.apply_delta(delta)?;
            match self.store.update_stock(&stock).await {
                Ok(version) => {
                    stock.set_version(version);
                    self.alerts.recompute_best_effort(stock.machine_id()).await;
                    metrics::counter!("stock_deltas_applied_total").increment(1);
                    tracing::debug!(
                        stock_id = %stock_id,
                        delta,
                        quantity = stock.quantity(),
                        "stock delta applied"
                    );
                    return Ok(stock);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("stock", stock_id))
    }

    /// Loads one stock row.
    pub async fn get_stock(&self, stock_id: StockId) -> Result<Stock> {
        self.load(stock_id).await
    }

    /// Lists a machine's slots in slot order.
    pub async fn stock_for_machine(&self, machine_id: MachineId) -> Result<Vec<Stock>> {
        Ok(self.store.list_stock_for_machine(machine_id).await?)
    }

    async fn load(&self, stock_id: StockId) -> Result<Stock> {
        self.store
            .get_stock(stock_id)
            .await?
            .ok_or_else(|| OpsError::not_found("stock", stock_id))
    }
}
