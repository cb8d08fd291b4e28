//! Recomputes derived alerts and persists them through the store.

use std::sync::Arc;

use common::MachineId;
use domain::Alert;
use store::VendingStore;

use crate::Result;
use crate::engine::AlertEngine;

/// Keeps the stored alert set in step with a machine's stock.
///
/// Recomputation reads the machine's stock rows, derives the alert set,
/// and replaces the stored set in one store call. Running it twice in a
/// row leaves the same set stored.
pub struct AlertService<S: VendingStore> {
    store: Arc<S>,
    engine: AlertEngine,
}

impl<S: VendingStore> AlertService<S> {
    /// Creates a service with the default engine.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_engine(store, AlertEngine::default())
    }

    /// Creates a service with a custom engine.
    pub fn with_engine(store: Arc<S>, engine: AlertEngine) -> Self {
        Self { store, engine }
    }

    /// Recomputes the alert set for a machine from its current stock.
    #[tracing::instrument(skip(self))]
    pub async fn recompute(&self, machine_id: MachineId) -> Result<Vec<Alert>> {
        let stock = self.store.list_stock_for_machine(machine_id).await?;
        let alerts = self.engine.derive(machine_id, &stock);
        self.store
            .replace_alerts(machine_id, alerts.clone())
            .await?;

        metrics::counter!("alert_recomputes_total").increment(1);
        tracing::debug!(
            machine_id = %machine_id,
            alerts = alerts.len(),
            "alert set recomputed"
        );

        Ok(alerts)
    }

    /// Recomputes after a stock write without failing the caller.
    ///
    /// The stored set lags at most until the next recomputation, so a
    /// failure here is logged and swallowed instead of bubbling up into
    /// the write that triggered it.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_best_effort(&self, machine_id: MachineId) {
        for attempt in 1..=3 {
            match self.recompute(machine_id).await {
                Ok(_) => return,
                Err(e) => {
                    metrics::counter!("alert_recompute_failures_total").increment(1);
                    tracing::warn!(
                        machine_id = %machine_id,
                        attempt,
                        error = %e,
                        "alert recomputation failed"
                    );
                }
            }
        }
    }

    /// Returns the stored alert set for a machine.
    pub async fn alerts_for_machine(&self, machine_id: MachineId) -> Result<Vec<Alert>> {
        Ok(self.store.list_alerts_for_machine(machine_id).await?)
    }

    /// Returns active alerts across all machines.
    pub async fn active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.store.list_active_alerts().await?)
    }
}
