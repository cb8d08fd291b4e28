//! Machine slot inventory.

use common::{MachineId, ProductId, StockId, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by slot quantity arithmetic.
#[derive(Debug, Error)]
pub enum StockError {
    /// Applying the delta would push the slot past its physical capacity.
    #[error("Slot holds {quantity} of {max_capacity}; cannot apply delta {delta}")]
    CapacityExceeded {
        quantity: u32,
        delta: i32,
        max_capacity: u32,
    },

    /// Applying the delta would make the slot quantity negative.
    #[error("Slot holds {quantity}; cannot apply delta {delta}")]
    NegativeQuantity { quantity: u32, delta: i32 },
}

/// One physical slot of one machine.
///
/// The quantity always stays within `0..=max_capacity`; every change goes
/// through [`Stock::apply_delta`] so the bounds cannot be skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// Unique stock row identifier.
    id: StockId,

    /// Machine this slot belongs to.
    machine_id: MachineId,

    /// Physical slot number within the machine.
    slot_number: u32,

    /// Product loaded in this slot.
    product_id: ProductId,

    /// Units currently in the slot.
    quantity: u32,

    /// Physical capacity of the slot.
    max_capacity: u32,

    /// Quantities at or below this value count as low stock.
    low_threshold: u32,

    /// Current version for optimistic concurrency.
    version: Version,
}

// Query methods
impl Stock {
    /// Returns the stock row identifier.
    pub fn id(&self) -> StockId {
        self.id
    }

    /// Returns the machine this slot belongs to.
    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    /// Returns the physical slot number.
    pub fn slot_number(&self) -> u32 {
        self.slot_number
    }

    /// Returns the product loaded in this slot.
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Returns the units currently in the slot.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns the physical capacity of the slot.
    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Returns the low stock threshold.
    pub fn low_threshold(&self) -> u32 {
        self.low_threshold
    }

    /// Returns the current version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if the slot is empty.
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Returns true if the slot is non-empty but at or below its threshold.
    pub fn is_low(&self) -> bool {
        self.quantity > 0 && self.quantity <= self.low_threshold
    }

    /// Returns how many units fit before the slot is full.
    pub fn space_remaining(&self) -> u32 {
        self.max_capacity - self.quantity
    }
}

// Command methods
impl Stock {
    /// Creates a new empty slot.
    pub fn new(
        machine_id: MachineId,
        slot_number: u32,
        product_id: ProductId,
        max_capacity: u32,
        low_threshold: u32,
    ) -> Self {
        Self {
            id: StockId::new(),
            machine_id,
            slot_number,
            product_id,
            quantity: 0,
            max_capacity,
            low_threshold,
            version: Version::first(),
        }
    }

    /// Applies a signed quantity change and returns the new quantity.
    ///
    /// Dispensing passes a negative delta, restocking a positive one. The
    /// change is rejected without effect if it would leave the quantity
    /// outside `0..=max_capacity`.
    pub fn apply_delta(&mut self, delta: i32) -> Result<u32, StockError> {
        let next = self.quantity as i64 + delta as i64;
        if next < 0 {
            return Err(StockError::NegativeQuantity {
                quantity: self.quantity,
                delta,
            });
        }
        if next > self.max_capacity as i64 {
            return Err(StockError::CapacityExceeded {
                quantity: self.quantity,
                delta,
                max_capacity: self.max_capacity,
            });
        }

        self.quantity = next as u32;
        Ok(self.quantity)
    }
}

// Persistence support
impl Stock {
    /// Reassembles a stock row from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: StockId,
        machine_id: MachineId,
        slot_number: u32,
        product_id: ProductId,
        quantity: u32,
        max_capacity: u32,
        low_threshold: u32,
        version: Version,
    ) -> Self {
        Self {
            id,
            machine_id,
            slot_number,
            product_id,
            quantity,
            max_capacity,
            low_threshold,
            version,
        }
    }

    /// Sets the version after a successful store write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
