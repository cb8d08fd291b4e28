//! Shared kernel for the vending platform.
//!
//! Identifier newtypes, money arithmetic, and optimistic concurrency
//! versions used by every other crate in the workspace.

pub mod ids;
pub mod money;
pub mod version;

pub use ids::{
    AlertId, MachineId, OrderId, PaymentRef, PickupId, ProductId, RefundId, RestockId, StockId,
    UserId,
};
pub use money::{Currency, Money};
pub use version::Version;
