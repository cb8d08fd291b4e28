//! Checkout and pre-payment order lifecycle.

use std::sync::Arc;

use common::{OrderId, PaymentRef, ProductId};
use domain::{Order, OrderError, OrderItem};
use store::{StoreError, VendingStore};

use crate::MAX_COMMIT_ATTEMPTS;
use crate::collaborators::ProductCatalog;
use crate::error::{OpsError, Result};

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct OrderLine {
    /// The product to order.
    pub product_id: ProductId,
    /// Number of units.
    pub quantity: u32,
}

/// Creates orders and drives them up to (or out of) payment.
///
/// Activation itself is not here: it belongs to the payment reconciler,
/// which reacts to provider events rather than user requests.
pub struct CheckoutService<S: VendingStore, C: ProductCatalog> {
    store: Arc<S>,
    catalog: Arc<C>,
}

impl<S, C> CheckoutService<S, C>
where
    S: VendingStore,
    C: ProductCatalog,
{
    /// Creates a new checkout service.
    pub fn new(store: Arc<S>, catalog: Arc<C>) -> Self {
        Self { store, catalog }
    }

    /// Creates a new order, freezing current catalog names and prices
    /// into its line items.
    #[tracing::instrument(skip(self, lines))]
    pub async fn create_order(&self, lines: Vec<OrderLine>) -> Result<Order> {
        if lines.is_empty() {
            return Err(OpsError::InvalidInput(
                "an order needs at least one line".to_string(),
            ));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            if line.quantity == 0 {
                return Err(OpsError::InvalidInput(format!(
                    "quantity for {} must be at least 1",
                    line.product_id
                )));
            }
            let info = self
                .catalog
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| OpsError::not_found("product", &line.product_id))?;
            items.push(OrderItem::new(
                line.product_id.clone(),
                info.name,
                line.quantity,
                info.price,
            ));
        }

        let order = Order::new(items)?;
        self.store.insert_order(&order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            lines = lines.len(),
            total = order.items_total().minor(),
            "order created"
        );
        Ok(order)
    }

    /// Opens a payment session for an order.
    ///
    /// Re-entrant before activation: abandoning a checkout and starting
    /// another replaces the payment reference.
    #[tracing::instrument(skip(self))]
    pub async fn begin_payment(
        &self,
        order_id: OrderId,
        payment_ref: PaymentRef,
    ) -> Result<Order> {
        let order = self
            .commit_order(order_id, |order| order.begin_payment(payment_ref.clone()))
            .await?;

        metrics::counter!("payment_sessions_opened_total").increment(1);
        tracing::info!(order_id = %order_id, payment_ref = %payment_ref, "payment session opened");
        Ok(order)
    }

    /// Cancels an order that has not been paid.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.commit_order(order_id, Order::cancel).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %order_id, "order cancelled");
        Ok(order)
    }

    /// Expires an order whose payment window lapsed.
    #[tracing::instrument(skip(self))]
    pub async fn expire_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.commit_order(order_id, Order::expire).await?;

        metrics::counter!("orders_expired_total").increment(1);
        tracing::info!(order_id = %order_id, "order expired");
        Ok(order)
    }

    /// Loads one order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.load(order_id).await
    }

    /// Lists all orders, most recently created first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OpsError::not_found("order", order_id))
    }

    /// Loads, mutates, and writes back an order, retrying lost races.
    ///
    /// On a version conflict the order is reloaded so the mutation is
    /// re-validated against the winner's state.
    async fn commit_order<F>(&self, order_id: OrderId, mut apply: F) -> Result<Order>
    where
        F: FnMut(&mut Order) -> std::result::Result<(), OrderError>,
    {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut order = self.load(order_id).await?;
            apply(&mut order)?;
            match self.store.update_order(&order).await {
                Ok(version) => {
                    order.set_version(version);
                    return Ok(order);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OpsError::conflict("order", order_id))
    }
}
