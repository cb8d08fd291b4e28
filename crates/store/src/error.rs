use common::{MachineId, OrderId, PickupId, Version};
use domain::PickupState;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row exists for the requested id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// An optimistic concurrency check failed.
    /// The entity was loaded at a version the row no longer holds.
    #[error("Version conflict for {entity} {id}: expected version {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: Uuid,
        expected: Version,
        actual: Version,
    },

    /// Another stock row already occupies this machine slot.
    #[error("Slot {slot_number} on machine {machine_id} is already configured")]
    SlotTaken {
        machine_id: MachineId,
        slot_number: u32,
    },

    /// The order already has a pickup in the pending state.
    #[error("Order {0} already has a pending pickup")]
    PendingPickupExists(OrderId),

    /// A guarded pickup update found the row in a different state.
    #[error("Pickup {id} is not pending (current state: {state})")]
    PickupNotPending { id: PickupId, state: PickupState },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
