//! Derived inventory alerts.
//!
//! Alerts are not directly mutable state. They are recomputed from the
//! stock rows of a machine after every inventory change; the previous set
//! is discarded and replaced wholesale.

use chrono::{DateTime, Utc};
use common::{AlertId, MachineId};
use serde::{Deserialize, Serialize};

/// The condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    /// The machine has fewer configured slots than its physical layout.
    Incomplete,

    /// At least one configured slot is empty.
    Critical,

    /// Half or more of the configured slots are at or below threshold.
    LowStock,
}

impl AlertType {
    /// Returns the severity this condition is reported at.
    pub fn default_level(&self) -> AlertLevel {
        match self {
            AlertType::Incomplete => AlertLevel::Warning,
            AlertType::Critical => AlertLevel::Critical,
            AlertType::LowStock => AlertLevel::Warning,
        }
    }

    /// Returns the alert type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Incomplete => "Incomplete",
            AlertType::Critical => "Critical",
            AlertType::LowStock => "LowStock",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    /// Needs attention on the next service round.
    Warning,

    /// Needs attention now; buyers are hitting empty slots.
    Critical,
}

impl AlertLevel {
    /// Returns the level as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "Warning",
            AlertLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an alert is still in force.
///
/// Recomputation deletes alerts rather than resolving them, so stored
/// alerts are active in practice; `Resolved` exists for consumers that
/// archive alert history elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    /// The condition currently holds.
    Active,

    /// The condition no longer holds.
    Resolved,
}

impl AlertStatus {
    /// Returns the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "Active",
            AlertStatus::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The slot counts an alert was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMetadata {
    /// Stock rows configured for the machine.
    pub configured_slots: u32,

    /// Configured slots with quantity zero.
    pub empty_slots: u32,

    /// Configured slots that are non-empty but at or below threshold.
    pub low_stock_slots: u32,

    /// Empty plus low stock slots.
    pub slots_at_threshold: u32,
}

/// A derived alert for one machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier.
    pub id: AlertId,

    /// The machine the alert is about.
    pub machine_id: MachineId,

    /// The condition being reported.
    pub alert_type: AlertType,

    /// Severity of the condition.
    pub level: AlertLevel,

    /// Whether the alert is in force.
    pub status: AlertStatus,

    /// Whether the alert is in force, as a flat flag for filtering.
    pub is_active: bool,

    /// Human readable description of the condition.
    pub message: String,

    /// The slot counts the alert was derived from.
    pub metadata: AlertMetadata,

    /// When the alert was derived.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Creates a new active alert.
    pub fn new(
        machine_id: MachineId,
        alert_type: AlertType,
        message: impl Into<String>,
        metadata: AlertMetadata,
    ) -> Self {
        Self {
            id: AlertId::new(),
            machine_id,
            alert_type,
            level: alert_type.default_level(),
            status: AlertStatus::Active,
            is_active: true,
            message: message.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}
