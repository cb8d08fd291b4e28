//! Restock audit records.

use chrono::{DateTime, Utc};
use common::{MachineId, RestockId, StockId, UserId};
use serde::{Deserialize, Serialize};

/// The before and after quantities of one slot touched by a restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockItem {
    /// The stock row that was refilled.
    pub stock_id: StockId,

    /// Slot quantity before the refill.
    pub quantity_before: u32,

    /// Slot quantity after the refill.
    pub quantity_after: u32,

    /// Units added by the refill.
    pub quantity_added: u32,
}

impl RestockItem {
    /// Records a refill from the observed before and after quantities.
    pub fn new(stock_id: StockId, quantity_before: u32, quantity_after: u32) -> Self {
        Self {
            stock_id,
            quantity_before,
            quantity_after,
            quantity_added: quantity_after - quantity_before,
        }
    }
}

/// A write-once record of one restock visit to a machine.
///
/// Restocks are never edited after the fact; they are the audit trail for
/// who refilled which slots and by how much.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restock {
    /// Unique restock identifier.
    pub id: RestockId,

    /// The machine that was refilled.
    pub machine_id: MachineId,

    /// The operator who performed the refill.
    pub user_id: UserId,

    /// Free-form operator notes.
    pub notes: Option<String>,

    /// Per-slot quantity changes.
    pub items: Vec<RestockItem>,

    /// When the restock was recorded.
    pub created_at: DateTime<Utc>,
}

impl Restock {
    /// Creates a new restock record.
    pub fn new(
        machine_id: MachineId,
        user_id: UserId,
        items: Vec<RestockItem>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: RestockId::new(),
            machine_id,
            user_id,
            notes,
            items,
            created_at: Utc::now(),
        }
    }

    /// Returns the total units added across all slots.
    pub fn total_added(&self) -> u32 {
        self.items.iter().map(|item| item.quantity_added).sum()
    }
}
