//! Traits for external collaborators, with in-memory implementations for
//! tests and the dev server.

pub mod catalog;
pub mod directory;

pub use catalog::{InMemoryCatalog, ProductCatalog, ProductInfo};
pub use directory::{AdminDirectory, InMemoryDirectory};
