use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{
    AlertId, Currency, MachineId, Money, OrderId, PaymentRef, PickupId, ProductId, RefundId,
    RestockId, StockId, UserId, Version,
};
use domain::{
    Alert, AlertMetadata, Order, OrderItem, Pickup, PickupState, Restock, RestockItem, Stock,
};

use crate::{Result, StoreError, store::VendingStore};

/// Parses an enum column stored as its serde string form.
fn enum_from_text<T: serde::de::DeserializeOwned>(raw: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(raw))?)
}

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(
        row: &PgRow,
        items: Vec<OrderItem>,
        refunds: BTreeMap<RefundId, Money>,
    ) -> Result<Order> {
        let state = enum_from_text(row.try_get::<String, _>("state")?)?;
        let amount_total = row
            .try_get::<Option<i64>, _>("amount_total")?
            .map(Money::from_minor);
        let currency = row
            .try_get::<Option<String>, _>("currency")?
            .map(Currency::new);
        let payment_ref = row
            .try_get::<Option<String>, _>("payment_ref")?
            .map(PaymentRef::new);

        Ok(Order::from_parts(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            state,
            items,
            amount_total,
            currency,
            payment_ref,
            refunds,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            Version::new(row.try_get("version")?),
        ))
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem::new(
            ProductId::new(row.try_get::<String, _>("product_id")?),
            row.try_get::<String, _>("label")?,
            row.try_get::<i32, _>("quantity")? as u32,
            Money::from_minor(row.try_get("unit_price")?),
        ))
    }

    fn row_to_stock(row: PgRow) -> Result<Stock> {
        Ok(Stock::from_parts(
            StockId::from_uuid(row.try_get::<Uuid, _>("id")?),
            MachineId::from_uuid(row.try_get::<Uuid, _>("machine_id")?),
            row.try_get::<i32, _>("slot_number")? as u32,
            ProductId::new(row.try_get::<String, _>("product_id")?),
            row.try_get::<i32, _>("quantity")? as u32,
            row.try_get::<i32, _>("max_capacity")? as u32,
            row.try_get::<i32, _>("low_threshold")? as u32,
            Version::new(row.try_get("version")?),
        ))
    }

    fn row_to_pickup(row: PgRow) -> Result<Pickup> {
        let state = enum_from_text(row.try_get::<String, _>("state")?)?;
        Ok(Pickup::from_parts(
            PickupId::from_uuid(row.try_get::<Uuid, _>("id")?),
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            MachineId::from_uuid(row.try_get::<Uuid, _>("machine_id")?),
            state,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<Option<DateTime<Utc>>, _>("picked_up_at")?,
        ))
    }

    fn row_to_restock_item(row: PgRow) -> Result<RestockItem> {
        Ok(RestockItem {
            stock_id: StockId::from_uuid(row.try_get::<Uuid, _>("stock_id")?),
            quantity_before: row.try_get::<i32, _>("quantity_before")? as u32,
            quantity_after: row.try_get::<i32, _>("quantity_after")? as u32,
            quantity_added: row.try_get::<i32, _>("quantity_added")? as u32,
        })
    }

    fn row_to_alert(row: PgRow) -> Result<Alert> {
        let metadata: AlertMetadata = serde_json::from_value(row.try_get("metadata")?)?;
        Ok(Alert {
            id: AlertId::from_uuid(row.try_get::<Uuid, _>("id")?),
            machine_id: MachineId::from_uuid(row.try_get::<Uuid, _>("machine_id")?),
            alert_type: enum_from_text(row.try_get::<String, _>("alert_type")?)?,
            level: enum_from_text(row.try_get::<String, _>("level")?)?,
            status: enum_from_text(row.try_get::<String, _>("status")?)?,
            is_active: row.try_get("is_active")?,
            message: row.try_get("message")?,
            metadata,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, label, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn load_refunds(&self, order_id: Uuid) -> Result<BTreeMap<RefundId, Money>> {
        let rows = sqlx::query(
            r#"
            SELECT refund_id, amount
            FROM order_refunds
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        let mut refunds = BTreeMap::new();
        for row in rows {
            refunds.insert(
                RefundId::new(row.try_get::<String, _>("refund_id")?),
                Money::from_minor(row.try_get("amount")?),
            );
        }
        Ok(refunds)
    }

    async fn hydrate_order(&self, row: PgRow) -> Result<Order> {
        let id: Uuid = row.try_get("id")?;
        let items = self.load_items(id).await?;
        let refunds = self.load_refunds(id).await?;
        Self::row_to_order(&row, items, refunds)
    }

    async fn hydrate_restock(&self, row: PgRow) -> Result<Restock> {
        let id: Uuid = row.try_get("id")?;
        let item_rows = sqlx::query(
            r#"
            SELECT stock_id, quantity_before, quantity_after, quantity_added
            FROM restock_items
            WHERE restock_id = $1
            ORDER BY stock_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .into_iter()
            .map(Self::row_to_restock_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Restock {
            id: RestockId::from_uuid(id),
            machine_id: MachineId::from_uuid(row.try_get::<Uuid, _>("machine_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            notes: row.try_get("notes")?,
            items,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Builds the right error for a guarded update that matched no rows.
    async fn stale_row_error(
        &self,
        entity: &'static str,
        table: &'static str,
        id: Uuid,
        expected: Version,
    ) -> StoreError {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        match sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(actual)) => {
                tracing::debug!(entity, %id, %expected, actual, "optimistic concurrency conflict");
                StoreError::VersionConflict {
                    entity,
                    id,
                    expected,
                    actual: Version::new(actual),
                }
            }
            Ok(None) => StoreError::NotFound { entity, id },
            Err(e) => StoreError::Database(e),
        }
    }

    async fn stale_pickup_error(&self, id: PickupId) -> StoreError {
        match sqlx::query_scalar::<_, String>("SELECT state FROM pickups WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(raw)) => match enum_from_text::<PickupState>(raw) {
                Ok(state) => {
                    tracing::debug!(%id, %state, "pickup state guard failed");
                    StoreError::PickupNotPending { id, state }
                }
                Err(e) => e,
            },
            Ok(None) => StoreError::NotFound {
                entity: "pickup",
                id: id.as_uuid(),
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl VendingStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, state, amount_total, currency, payment_ref, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.state().as_str())
        .bind(order.amount_total().map(|m| m.minor()))
        .bind(order.currency().map(|c| c.as_str()))
        .bind(order.payment_ref().map(|p| p.as_str()))
        .bind(order.created_at())
        .bind(order.version().as_i64())
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, label, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(&item.label)
            .bind(item.quantity as i32)
            .bind(item.unit_price.minor())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, state, amount_total, currency, payment_ref, created_at, version
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_order_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, state, amount_total, currency, payment_ref, created_at, version
            FROM orders
            WHERE payment_ref = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(payment_ref.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_order(&self, order: &Order) -> Result<Version> {
        let next = order.version().next();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $1, amount_total = $2, currency = $3, payment_ref = $4, version = $5
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(order.state().as_str())
        .bind(order.amount_total().map(|m| m.minor()))
        .bind(order.currency().map(|c| c.as_str()))
        .bind(order.payment_ref().map(|p| p.as_str()))
        .bind(next.as_i64())
        .bind(order.id().as_uuid())
        .bind(order.version().as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .stale_row_error("order", "orders", order.id().as_uuid(), order.version())
                .await);
        }

        // Item snapshots are immutable; only the refund ledger is resynced
        sqlx::query("DELETE FROM order_refunds WHERE order_id = $1")
            .bind(order.id().as_uuid())
            .execute(&mut *tx)
            .await?;

        for (refund_id, amount) in order.refunds() {
            sqlx::query(
                r#"
                INSERT INTO order_refunds (order_id, refund_id, amount)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(refund_id.as_str())
            .bind(amount.minor())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(next)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, state, amount_total, currency, payment_ref, created_at, version
            FROM orders
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate_order(row).await?);
        }
        Ok(orders)
    }

    async fn insert_stock(&self, stock: &Stock) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock (id, machine_id, slot_number, product_id, quantity, max_capacity, low_threshold, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(stock.id().as_uuid())
        .bind(stock.machine_id().as_uuid())
        .bind(stock.slot_number() as i32)
        .bind(stock.product_id().as_str())
        .bind(stock.quantity() as i32)
        .bind(stock.max_capacity() as i32)
        .bind(stock.low_threshold() as i32)
        .bind(stock.version().as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Check if this is the machine slot unique constraint
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_machine_slot")
            {
                return StoreError::SlotTaken {
                    machine_id: stock.machine_id(),
                    slot_number: stock.slot_number(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_stock(&self, id: StockId) -> Result<Option<Stock>> {
        let row = sqlx::query(
            r#"
            SELECT id, machine_id, slot_number, product_id, quantity, max_capacity, low_threshold, version
            FROM stock
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock).transpose()
    }

    async fn get_stock_scoped(
        &self,
        id: StockId,
        machine_id: MachineId,
    ) -> Result<Option<Stock>> {
        let row = sqlx::query(
            r#"
            SELECT id, machine_id, slot_number, product_id, quantity, max_capacity, low_threshold, version
            FROM stock
            WHERE id = $1 AND machine_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(machine_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock).transpose()
    }

    async fn list_stock_for_machine(&self, machine_id: MachineId) -> Result<Vec<Stock>> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, slot_number, product_id, quantity, max_capacity, low_threshold, version
            FROM stock
            WHERE machine_id = $1
            ORDER BY slot_number ASC
            "#,
        )
        .bind(machine_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_stock).collect()
    }

    async fn update_stock(&self, stock: &Stock) -> Result<Version> {
        let next = stock.version().next();

        let result = sqlx::query(
            r#"
            UPDATE stock
            SET quantity = $1, version = $2
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(stock.quantity() as i32)
        .bind(next.as_i64())
        .bind(stock.id().as_uuid())
        .bind(stock.version().as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .stale_row_error("stock", "stock", stock.id().as_uuid(), stock.version())
                .await);
        }

        Ok(next)
    }

    async fn apply_restock(&self, restock: &Restock, updated: &[Stock]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for stock in updated {
            let next = stock.version().next();
            let result = sqlx::query(
                r#"
                UPDATE stock
                SET quantity = $1, version = $2
                WHERE id = $3 AND version = $4
                "#,
            )
            .bind(stock.quantity() as i32)
            .bind(next.as_i64())
            .bind(stock.id().as_uuid())
            .bind(stock.version().as_i64())
            .execute(&mut *tx)
            .await?;

            // Any failed guard rolls back the whole batch
            if result.rows_affected() == 0 {
                return Err(self
                    .stale_row_error("stock", "stock", stock.id().as_uuid(), stock.version())
                    .await);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO restocks (id, machine_id, user_id, notes, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(restock.id.as_uuid())
        .bind(restock.machine_id.as_uuid())
        .bind(restock.user_id.as_uuid())
        .bind(restock.notes.as_deref())
        .bind(restock.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &restock.items {
            sqlx::query(
                r#"
                INSERT INTO restock_items (restock_id, stock_id, quantity_before, quantity_after, quantity_added)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(restock.id.as_uuid())
            .bind(item.stock_id.as_uuid())
            .bind(item.quantity_before as i32)
            .bind(item.quantity_after as i32)
            .bind(item.quantity_added as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_restock(&self, id: RestockId) -> Result<Option<Restock>> {
        let row = sqlx::query(
            r#"
            SELECT id, machine_id, user_id, notes, created_at
            FROM restocks
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_restock(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_restocks_for_machine(&self, machine_id: MachineId) -> Result<Vec<Restock>> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, user_id, notes, created_at
            FROM restocks
            WHERE machine_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(machine_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut restocks = Vec::with_capacity(rows.len());
        for row in rows {
            restocks.push(self.hydrate_restock(row).await?);
        }
        Ok(restocks)
    }

    async fn insert_pickup(&self, pickup: &Pickup) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pickups (id, order_id, machine_id, state, created_at, picked_up_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(pickup.id().as_uuid())
        .bind(pickup.order_id().as_uuid())
        .bind(pickup.machine_id().as_uuid())
        .bind(pickup.state().as_str())
        .bind(pickup.created_at())
        .bind(pickup.picked_up_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Check if this is the one-pending-pickup-per-order index
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_pending_pickup_per_order")
            {
                return StoreError::PendingPickupExists(pickup.order_id());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_pickup(&self, id: PickupId) -> Result<Option<Pickup>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, machine_id, state, created_at, picked_up_at
            FROM pickups
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_pickup).transpose()
    }

    async fn list_pickups_for_order(&self, order_id: OrderId) -> Result<Vec<Pickup>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, machine_id, state, created_at, picked_up_at
            FROM pickups
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_pickup).collect()
    }

    async fn update_pickup(&self, pickup: &Pickup, expected: PickupState) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE pickups
            SET state = $1, picked_up_at = $2
            WHERE id = $3 AND state = $4
            "#,
        )
        .bind(pickup.state().as_str())
        .bind(pickup.picked_up_at())
        .bind(pickup.id().as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_pickup_error(pickup.id()).await);
        }

        Ok(())
    }

    async fn complete_pickup(&self, pickup: &Pickup, order: &Order) -> Result<Version> {
        let next = order.version().next();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE pickups
            SET state = $1, picked_up_at = $2
            WHERE id = $3 AND state = $4
            "#,
        )
        .bind(pickup.state().as_str())
        .bind(pickup.picked_up_at())
        .bind(pickup.id().as_uuid())
        .bind(PickupState::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_pickup_error(pickup.id()).await);
        }

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $1, version = $2
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(order.state().as_str())
        .bind(next.as_i64())
        .bind(order.id().as_uuid())
        .bind(order.version().as_i64())
        .execute(&mut *tx)
        .await?;

        // Dropping the transaction rolls the pickup update back too
        if result.rows_affected() == 0 {
            return Err(self
                .stale_row_error("order", "orders", order.id().as_uuid(), order.version())
                .await);
        }

        tx.commit().await?;
        Ok(next)
    }

    async fn replace_alerts(&self, machine_id: MachineId, alerts: Vec<Alert>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM alerts WHERE machine_id = $1")
            .bind(machine_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for alert in &alerts {
            let metadata = serde_json::to_value(alert.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO alerts (id, machine_id, alert_type, level, status, is_active, message, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(alert.id.as_uuid())
            .bind(alert.machine_id.as_uuid())
            .bind(alert.alert_type.as_str())
            .bind(alert.level.as_str())
            .bind(alert.status.as_str())
            .bind(alert.is_active)
            .bind(&alert.message)
            .bind(metadata)
            .bind(alert.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_alerts_for_machine(&self, machine_id: MachineId) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, alert_type, level, status, is_active, message, metadata, created_at
            FROM alerts
            WHERE machine_id = $1
            ORDER BY alert_type ASC
            "#,
        )
        .bind(machine_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_alert).collect()
    }

    async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, alert_type, level, status, is_active, message, metadata, created_at
            FROM alerts
            WHERE is_active
            ORDER BY machine_id ASC, alert_type ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_alert).collect()
    }
}
