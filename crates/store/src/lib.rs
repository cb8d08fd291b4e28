//! Persistence layer for the vending platform.
//!
//! The [`VendingStore`] trait is the storage seam: every method is one
//! atomic unit of work and versioned writes are guarded by optimistic
//! concurrency checks. Two implementations are provided:
//! - [`InMemoryStore`] for tests and local development
//! - [`PostgresStore`] backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::Version;
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::VendingStore;
