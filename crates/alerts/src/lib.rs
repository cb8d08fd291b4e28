//! Derived stock alerts.
//!
//! This crate derives machine-level alerts from current stock levels:
//! - [`AlertEngine`] evaluates the alert rules against a machine's slots
//! - [`AlertService`] recomputes the set and persists it through the store
//!
//! Alerts are a pure function of stock, so recomputation always replaces
//! the stored set for a machine instead of mutating individual alerts.

pub mod engine;
pub mod error;
pub mod service;

pub use engine::{AlertEngine, DEFAULT_SLOTS_PER_MACHINE};
pub use error::{AlertError, Result};
pub use service::AlertService;
