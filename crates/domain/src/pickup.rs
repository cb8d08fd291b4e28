//! Pickup attempts at a machine.

use chrono::{DateTime, Utc};
use common::{MachineId, OrderId, PickupId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during pickup operations.
#[derive(Debug, Error)]
pub enum PickupError {
    /// The pickup already reached a terminal state.
    #[error("Cannot {action} a pickup in {current_state} state")]
    NotPending {
        current_state: PickupState,
        action: &'static str,
    },
}

/// The state of a pickup attempt.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PickupState {
    /// The buyer is at the machine; dispensing has not finished.
    #[default]
    Pending,

    /// The goods were dispensed (terminal state).
    Completed,

    /// Dispensing failed; the order stays available (terminal state).
    Failed,
}

impl PickupState {
    /// Returns true if the pickup can still complete.
    pub fn can_complete(&self) -> bool {
        matches!(self, PickupState::Pending)
    }

    /// Returns true if the pickup can still fail.
    pub fn can_fail(&self) -> bool {
        matches!(self, PickupState::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PickupState::Completed | PickupState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupState::Pending => "Pending",
            PickupState::Completed => "Completed",
            PickupState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PickupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt to collect an order at a machine.
///
/// An order has at most one pending pickup at a time; a failed attempt
/// leaves the order available for another try.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    /// Unique pickup identifier.
    id: PickupId,

    /// The order being collected.
    order_id: OrderId,

    /// The machine dispensing the goods.
    machine_id: MachineId,

    /// Current state of the pickup.
    state: PickupState,

    /// When the pickup was started.
    created_at: DateTime<Utc>,

    /// When the goods were dispensed, if they were.
    picked_up_at: Option<DateTime<Utc>>,
}

// Query methods
impl Pickup {
    /// Returns the pickup identifier.
    pub fn id(&self) -> PickupId {
        self.id
    }

    /// Returns the order being collected.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Returns the dispensing machine.
    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    /// Returns the current state.
    pub fn state(&self) -> PickupState {
        self.state
    }

    /// Returns when the pickup was started.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the goods were dispensed, if they were.
    pub fn picked_up_at(&self) -> Option<DateTime<Utc>> {
        self.picked_up_at
    }
}

// Command methods
impl Pickup {
    /// Starts a new pending pickup for an order at a machine.
    pub fn new(order_id: OrderId, machine_id: MachineId) -> Self {
        Self {
            id: PickupId::new(),
            order_id,
            machine_id,
            state: PickupState::Pending,
            created_at: Utc::now(),
            picked_up_at: None,
        }
    }

    /// Marks the goods as dispensed.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), PickupError> {
        if !self.state.can_complete() {
            return Err(PickupError::NotPending {
                current_state: self.state,
                action: "complete",
            });
        }

        self.state = PickupState::Completed;
        self.picked_up_at = Some(at);
        Ok(())
    }

    /// Marks the attempt as failed.
    pub fn fail(&mut self) -> Result<(), PickupError> {
        if !self.state.can_fail() {
            return Err(PickupError::NotPending {
                current_state: self.state,
                action: "fail",
            });
        }

        self.state = PickupState::Failed;
        Ok(())
    }
}

// Persistence support
impl Pickup {
    /// Reassembles a pickup from stored state.
    pub fn from_parts(
        id: PickupId,
        order_id: OrderId,
        machine_id: MachineId,
        state: PickupState,
        created_at: DateTime<Utc>,
        picked_up_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            order_id,
            machine_id,
            state,
            created_at,
            picked_up_at,
        }
    }
}
