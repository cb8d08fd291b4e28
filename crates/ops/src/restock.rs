//! Restock batches.

use std::sync::Arc;

use alerts::AlertService;
use common::{MachineId, RestockId, StockId, UserId};
use domain::{Restock, RestockItem};
use store::{StoreError, VendingStore};

use crate::MAX_COMMIT_ATTEMPTS;
use crate::collaborators::AdminDirectory;
use crate::error::{OpsError, Result};

/// One requested refill line.
#[derive(Debug, Clone)]
pub struct RestockLine {
    /// The stock row to refill.
    pub stock_id: StockId,
    /// Units to add.
    pub quantity_to_add: u32,
}

/// Records restock visits as all-or-nothing batches.
///
/// A batch moves every touched slot and writes the audit record in one
/// store transaction; a single over-capacity line aborts the whole batch.
pub struct RestockManager<S: VendingStore, D: AdminDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    alerts: AlertService<S>,
}

impl<S, D> RestockManager<S, D>
where
    S: VendingStore,
    D: AdminDirectory,
{
    /// Creates a new restock manager.
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        let alerts = AlertService::new(Arc::clone(&store));
        Self {
            store,
            directory,
            alerts,
        }
    }

    /// Records a restock of specific slots.
    ///
    /// Each line is loaded scoped to the machine, so a stock id belonging
    /// to another machine reads as absent. On a version conflict the whole
    /// batch is re-read and re-validated against the winner's quantities.
    #[tracing::instrument(skip(self, lines, notes))]
    pub async fn create_restock(
        &self,
        machine_id: MachineId,
        user_id: UserId,
        lines: Vec<RestockLine>,
        notes: Option<String>,
    ) -> Result<Restock> {
        if lines.is_empty() {
            return Err(OpsError::InvalidInput(
                "a restock needs at least one line".to_string(),
            ));
        }
        for line in &lines {
            if line.quantity_to_add == 0 {
                return Err(OpsError::InvalidInput(format!(
                    "quantity_to_add for stock {} must be at least 1",
                    line.stock_id
                )));
            }
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut updated = Vec::with_capacity(lines.len());
            let mut items = Vec::with_capacity(lines.len());
            for line in &lines {
                let mut stock = self
                    .store
                    .get_stock_scoped(line.stock_id, machine_id)
                    .await?
                    .ok_or_else(|| OpsError::not_found("stock", line.stock_id))?;
                let delta = i32::try_from(line.quantity_to_add).map_err(|_| {
                    OpsError::InvalidInput(format!(
                        "quantity_to_add {} is out of range",
                        line.quantity_to_add
                    ))
                })?;
                let before = stock.quantity();
                let after = stock.apply_delta(delta)?;
                items.push(RestockItem::new(line.stock_id, before, after));
                updated.push(stock);
            }

            let restock = Restock::new(machine_id, user_id, items, notes.clone());
            match self.store.apply_restock(&restock, &updated).await {
                Ok(()) => {
                    self.finish(&restock).await;
                    return Ok(restock);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("machine", machine_id))
    }

    /// Refills every slot of a machine to capacity.
    ///
    /// Slots already at capacity are skipped rather than recorded as
    /// zero-delta items. When no operator is given the restock is
    /// attributed to an administrator from the directory.
    #[tracing::instrument(skip(self, notes))]
    pub async fn restock_to_max(
        &self,
        machine_id: MachineId,
        user_id: Option<UserId>,
        notes: Option<String>,
    ) -> Result<Restock> {
        let user_id = match user_id {
            Some(id) => id,
            None => self
                .directory
                .find_admin()
                .await?
                .ok_or_else(|| OpsError::not_found("admin", "none configured"))?,
        };

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let rows = self.store.list_stock_for_machine(machine_id).await?;
            if rows.is_empty() {
                return Err(OpsError::InvalidInput(format!(
                    "machine {machine_id} has no configured slots"
                )));
            }

            let mut updated = Vec::new();
            let mut items = Vec::new();
            for mut stock in rows {
                let space = stock.space_remaining();
                if space == 0 {
                    continue;
                }
                let delta = i32::try_from(space).map_err(|_| {
                    OpsError::InvalidInput(format!("slot capacity {space} is out of range"))
                })?;
                let before = stock.quantity();
                let after = stock.apply_delta(delta)?;
                items.push(RestockItem::new(stock.id(), before, after));
                updated.push(stock);
            }

            if items.is_empty() {
                return Err(OpsError::InvalidInput(format!(
                    "machine {machine_id} is already stocked to capacity"
                )));
            }

            let restock = Restock::new(machine_id, user_id, items, notes.clone());
            match self.store.apply_restock(&restock, &updated).await {
                Ok(()) => {
                    self.finish(&restock).await;
                    return Ok(restock);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("machine", machine_id))
    }

    /// Loads one restock record.
    pub async fn get_restock(&self, id: RestockId) -> Result<Restock> {
        self.store
            .get_restock(id)
            .await?
            .ok_or_else(|| OpsError::not_found("restock", id))
    }

    /// Lists a machine's restock records, most recent first.
    pub async fn restocks_for_machine(&self, machine_id: MachineId) -> Result<Vec<Restock>> {
        Ok(self.store.list_restocks_for_machine(machine_id).await?)
    }

    /// Post-commit bookkeeping shared by both entry points.
    async fn finish(&self, restock: &Restock) {
        self.alerts.recompute_best_effort(restock.machine_id).await;
        metrics::counter!("restocks_recorded_total").increment(1);
        metrics::histogram!("restock_units_added").record(f64::from(restock.total_added()));
        tracing::info!(
            machine_id = %restock.machine_id,
            restock_id = %restock.id,
            slots = restock.items.len(),
            units = restock.total_added(),
            "restock recorded"
        );
    }
}
