//! Alert rules evaluated against a machine's stock levels.

use common::MachineId;
use domain::{Alert, AlertMetadata, AlertType, Stock};

/// Number of physical slots a standard machine has.
pub const DEFAULT_SLOTS_PER_MACHINE: u32 = 6;

/// Evaluates the alert rules for one machine.
///
/// The engine is pure: it looks only at the stock rows it is given and
/// returns the complete alert set for the machine. Callers persist the
/// result by replacing whatever set was stored before.
#[derive(Debug, Clone, Copy)]
pub struct AlertEngine {
    slots_per_machine: u32,
}

impl AlertEngine {
    /// Creates an engine expecting the given number of physical slots.
    pub fn new(slots_per_machine: u32) -> Self {
        Self { slots_per_machine }
    }

    /// Derives the current alert set for a machine from its stock rows.
    ///
    /// At most one stock-level alert is produced: `Critical` when any slot
    /// is empty, otherwise `LowStock` when at least half the configured
    /// slots are at or below their threshold. An `Incomplete` alert is
    /// added independently when fewer slots are configured than the
    /// machine physically has.
    pub fn derive(&self, machine_id: MachineId, stock: &[Stock]) -> Vec<Alert> {
        let configured = stock.len() as u32;
        let empty = stock.iter().filter(|s| s.is_empty()).count() as u32;
        let low = stock.iter().filter(|s| s.is_low()).count() as u32;
        let at_threshold = empty + low;

        let metadata = AlertMetadata {
            configured_slots: configured,
            empty_slots: empty,
            low_stock_slots: low,
            slots_at_threshold: at_threshold,
        };

        let mut alerts = Vec::new();

        if configured < self.slots_per_machine {
            alerts.push(Alert::new(
                machine_id,
                AlertType::Incomplete,
                format!(
                    "machine has {} of {} slots configured",
                    configured, self.slots_per_machine
                ),
                metadata,
            ));
        }

        if empty > 0 {
            alerts.push(Alert::new(
                machine_id,
                AlertType::Critical,
                format!("{} of {} slots are empty", empty, configured),
                metadata,
            ));
        } else if configured > 0 && at_threshold >= configured.div_ceil(2) {
            alerts.push(Alert::new(
                machine_id,
                AlertType::LowStock,
                format!(
                    "{} of {} slots are at or below their threshold",
                    at_threshold, configured
                ),
                metadata,
            ));
        }

        alerts
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS_PER_MACHINE)
    }
}
