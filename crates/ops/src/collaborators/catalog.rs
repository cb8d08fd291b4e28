//! Product catalog trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId};

use crate::error::OpsError;

/// Catalog data for one product at lookup time.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    /// Product label as currently listed.
    pub name: String,
    /// Current price per unit.
    pub price: Money,
}

/// Trait for product catalog lookups.
///
/// The catalog is consulted exactly once per product, at order creation;
/// the returned name and price are frozen into the order's line items and
/// later catalog edits never reach existing orders.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks up a product. Returns None for unknown products.
    async fn get_product(&self, product_id: &ProductId)
    -> Result<Option<ProductInfo>, OpsError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, ProductInfo>,
    fail_on_lookup: bool,
}

/// In-memory product catalog for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product listing.
    pub fn put_product(
        &self,
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
    ) {
        let info = ProductInfo {
            name: name.into(),
            price,
        };
        self.state
            .write()
            .unwrap()
            .products
            .insert(product_id.into(), info);
    }

    /// Removes a product listing.
    pub fn remove_product(&self, product_id: &ProductId) {
        self.state.write().unwrap().products.remove(product_id);
    }

    /// Configures the catalog to fail lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }

    /// Returns the number of listed products.
    pub fn product_count(&self) -> usize {
        self.state.read().unwrap().products.len()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductInfo>, OpsError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(OpsError::Catalog("Catalog unavailable".to_string()));
        }
        Ok(state.products.get(product_id).cloned())
    }
}
