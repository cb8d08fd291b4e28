//! Domain layer for the vending platform.
//!
//! This crate provides the core domain model:
//! - Order lifecycle state machine with frozen item snapshots and the
//!   refund ledger
//! - Stock slots with bounded quantity arithmetic
//! - Pickup attempts tied to orders
//! - Write-once restock audit records
//! - Derived inventory alerts
//!
//! Everything here is pure: persistence and concurrency control live in
//! the store crate.

pub mod alert;
pub mod order;
pub mod pickup;
pub mod restock;
pub mod stock;

pub use alert::{Alert, AlertLevel, AlertMetadata, AlertStatus, AlertType};
pub use order::{Order, OrderError, OrderItem, OrderState, RefundOutcome};
pub use pickup::{Pickup, PickupError, PickupState};
pub use restock::{Restock, RestockItem};
pub use stock::{Stock, StockError};
