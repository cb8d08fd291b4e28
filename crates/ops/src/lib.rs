//! Operational services for the vending platform.
//!
//! Each service wires the pure domain entities to the store and carries
//! one slice of the platform's behavior:
//! - [`CheckoutService`] — order creation with frozen catalog snapshots
//!   and the pre-payment lifecycle
//! - [`StockService`] — slot configuration and the quantity ledger
//! - [`RestockManager`] — all-or-nothing restock batches with audit
//!   records
//! - [`PickupService`] — pickup attempts that consume orders atomically
//! - [`PaymentReconciler`] — idempotent payment and refund event
//!   reconciliation
//!
//! External lookups (product catalog, admin directory) sit behind the
//! traits in [`collaborators`], resolved before any store transaction
//! opens. Writes guarded by optimistic versions retry a bounded number
//! of times before reporting a conflict.

pub mod checkout;
pub mod collaborators;
pub mod error;
pub mod pickup;
pub mod reconciler;
pub mod restock;
pub mod stock;

pub use checkout::{CheckoutService, OrderLine};
pub use collaborators::{
    AdminDirectory, InMemoryCatalog, InMemoryDirectory, ProductCatalog, ProductInfo,
};
pub use error::{OpsError, Result};
pub use pickup::PickupService;
pub use reconciler::{
    PaymentReconciler, PaymentSucceeded, ReconcileOutcome, RefundUpdated,
};
pub use restock::{RestockLine, RestockManager};
pub use stock::StockService;

/// How many times a versioned write is retried before the operation
/// reports a conflict.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;
