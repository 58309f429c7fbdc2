//! libSQL backend: implements `CustomerStore` and `CheckpointStore`.
//!
//! Supports local file and in-memory databases. All customer queries are
//! parameterized and read-only; the insert helpers exist for seeding.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::ConversationState;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::model::{Customer, CustomerInfo, Order, OrderItem, Product, Segment};
use crate::store::traits::{Checkpoint, CheckpointStore, CustomerStore};
use crate::verification::Step;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Run pending migrations.
    pub async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Seeding ─────────────────────────────────────────────────────

    /// Insert or replace a customer.
    pub async fn upsert_customer(&self, customer: &Customer) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO customers (customer_id, email, name, phone, city, state, segment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    customer.customer_id.as_str(),
                    customer.email.as_str(),
                    customer.name.as_str(),
                    opt_text(customer.phone.as_deref()),
                    customer.city.as_str(),
                    customer.state.as_str(),
                    customer.segment.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_customer: {e}")))?;
        Ok(())
    }

    /// Insert or replace a product.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO products (product_id, name, category, price, in_stock)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    product.product_id.as_str(),
                    product.name.as_str(),
                    product.category.as_str(),
                    decimal_to_real(product.price),
                    i64::from(product.in_stock)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_product: {e}")))?;
        Ok(())
    }

    /// Insert or replace an order header.
    pub async fn upsert_order(&self, order: &Order) -> Result<(), DatabaseError> {
        let shipped = order.shipped_date.map(|d| d.to_string());
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO orders
                 (order_id, customer_id, order_date, status, shipped_date, tracking_number, total_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    order.order_id.as_str(),
                    order.customer_id.as_str(),
                    order.order_date.to_string(),
                    order.status.as_str(),
                    opt_text(shipped.as_deref()),
                    opt_text(order.tracking_number.as_deref()),
                    decimal_to_real(order.total_amount)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_order: {e}")))?;
        Ok(())
    }

    /// Append a line item to an order.
    pub async fn insert_order_item(&self, item: &OrderItem) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO order_items (order_id, product_id, quantity, price_per_unit)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    item.order_id.as_str(),
                    item.product_id.as_str(),
                    i64::from(item.quantity),
                    decimal_to_real(item.price_per_unit)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_order_item: {e}")))?;
        Ok(())
    }

    /// Remove every catalog row (customers, products, orders, items).
    pub async fn clear_catalog(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(
                "DELETE FROM order_items;
                 DELETE FROM orders;
                 DELETE FROM products;
                 DELETE FROM customers;",
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_catalog: {e}")))?;
        Ok(())
    }

    /// Row counts per catalog table, in schema order.
    pub async fn catalog_counts(&self) -> Result<[(&'static str, i64); 4], DatabaseError> {
        let mut counts = [
            ("customers", 0),
            ("products", 0),
            ("orders", 0),
            ("order_items", 0),
        ];
        for (table, count) in counts.iter_mut() {
            let mut rows = self
                .conn()
                .query(&format!("SELECT COUNT(*) FROM {table}"), ())
                .await
                .map_err(|e| DatabaseError::Query(format!("catalog_counts: {e}")))?;
            if let Ok(Some(row)) = rows.next().await {
                *count = row.get::<i64>(0).unwrap_or(0);
            }
        }
        Ok(counts)
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn opt_text(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn decimal_to_real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn real_to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(2)
}

/// Canonical timestamp format: fixed-width RFC 3339 in UTC, so text
/// comparison in SQL orders correctly.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("bad timestamp '{s}': {e}")))
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Serialization(format!("bad date '{s}': {e}")))
}

fn query_err(op: &'static str) -> impl Fn(libsql::Error) -> DatabaseError {
    move |e| DatabaseError::Query(format!("{op}: {e}"))
}

const CUSTOMER_COLUMNS: &str = "customer_id, email, name, phone, city, state, segment";

const ORDER_COLUMNS: &str =
    "order_id, customer_id, order_date, status, shipped_date, tracking_number, total_amount";

const PRODUCT_COLUMNS: &str = "product_id, name, category, price, in_stock";

const CHECKPOINT_COLUMNS: &str =
    "thread_id, state, pending_step, prompt, created_at, updated_at, expires_at";

fn row_to_customer(row: &libsql::Row) -> Result<Customer, DatabaseError> {
    let map = query_err("row_to_customer");
    let segment: String = row.get(6).map_err(&map)?;
    Ok(Customer {
        customer_id: row.get(0).map_err(&map)?,
        email: row.get(1).map_err(&map)?,
        name: row.get(2).map_err(&map)?,
        phone: row.get::<String>(3).ok(),
        city: row.get(4).map_err(&map)?,
        state: row.get(5).map_err(&map)?,
        segment: segment
            .parse::<Segment>()
            .map_err(DatabaseError::Serialization)?,
    })
}

fn row_to_order(row: &libsql::Row) -> Result<Order, DatabaseError> {
    let map = query_err("row_to_order");
    let order_date: String = row.get(2).map_err(&map)?;
    let status: String = row.get(3).map_err(&map)?;
    let shipped_date = match row.get::<String>(4).ok() {
        Some(s) => Some(parse_date(&s)?),
        None => None,
    };
    Ok(Order {
        order_id: row.get(0).map_err(&map)?,
        customer_id: row.get(1).map_err(&map)?,
        order_date: parse_date(&order_date)?,
        status: status.parse().map_err(DatabaseError::Serialization)?,
        shipped_date,
        tracking_number: row.get::<String>(5).ok(),
        total_amount: real_to_decimal(row.get::<f64>(6).map_err(&map)?),
    })
}

fn row_to_product(row: &libsql::Row) -> Result<Product, DatabaseError> {
    let map = query_err("row_to_product");
    Ok(Product {
        product_id: row.get(0).map_err(&map)?,
        name: row.get(1).map_err(&map)?,
        category: row.get(2).map_err(&map)?,
        price: real_to_decimal(row.get::<f64>(3).map_err(&map)?),
        in_stock: row.get::<i64>(4).map_err(&map)? != 0,
    })
}

fn row_to_checkpoint(row: &libsql::Row) -> Result<Checkpoint, DatabaseError> {
    let map = query_err("row_to_checkpoint");
    let thread_id: String = row.get(0).map_err(&map)?;
    let state_json: String = row.get(1).map_err(&map)?;
    let pending = match row.get::<String>(2).ok() {
        Some(s) => Some(
            s.parse::<Step>()
                .map_err(DatabaseError::Serialization)?,
        ),
        None => None,
    };
    let created: String = row.get(4).map_err(&map)?;
    let updated: String = row.get(5).map_err(&map)?;
    let expires: String = row.get(6).map_err(&map)?;

    let state: ConversationState = serde_json::from_str(&state_json)
        .map_err(|e| DatabaseError::Serialization(format!("checkpoint state: {e}")))?;

    Ok(Checkpoint {
        thread_id: Uuid::parse_str(&thread_id)
            .map_err(|e| DatabaseError::Serialization(format!("thread id: {e}")))?,
        state,
        pending,
        prompt: row.get::<String>(3).ok(),
        created_at: parse_datetime(&created)?,
        updated_at: parse_datetime(&updated)?,
        expires_at: parse_datetime(&expires)?,
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl CustomerStore for LibSqlBackend {
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerInfo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT customer_id, name FROM customers WHERE email = ?1",
                params![email],
            )
            .await
            .map_err(query_err("find_customer_by_email"))?;

        match rows.next().await.map_err(query_err("find_customer_by_email"))? {
            Some(row) => {
                let map = query_err("find_customer_by_email");
                Ok(Some(CustomerInfo {
                    customer_id: row.get(0).map_err(&map)?,
                    customer_name: row.get(1).map_err(&map)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = ?1"),
                params![customer_id],
            )
            .await
            .map_err(query_err("get_customer"))?;

        match rows.next().await.map_err(query_err("get_customer"))? {
            Some(row) => Ok(Some(row_to_customer(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_customer_orders(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1
                     ORDER BY order_date DESC, order_id DESC LIMIT ?2"
                ),
                params![customer_id, limit as i64],
            )
            .await
            .map_err(query_err("get_customer_orders"))?;

        let mut orders = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err("get_customer_orders"))? {
            orders.push(row_to_order(&row)?);
        }
        Ok(orders)
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
                params![order_id],
            )
            .await
            .map_err(query_err("get_order"))?;

        match rows.next().await.map_err(query_err("get_order"))? {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_order_items(&self, order_id: &str) -> Result<Vec<OrderItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT order_id, product_id, quantity, price_per_unit FROM order_items
                 WHERE order_id = ?1 ORDER BY order_item_id ASC",
                params![order_id],
            )
            .await
            .map_err(query_err("get_order_items"))?;

        let map = query_err("get_order_items");
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(&map)? {
            let quantity: i64 = row.get(2).map_err(&map)?;
            items.push(OrderItem {
                order_id: row.get(0).map_err(&map)?,
                product_id: row.get(1).map_err(&map)?,
                quantity: u32::try_from(quantity).map_err(|e| {
                    DatabaseError::Serialization(format!("quantity {quantity}: {e}"))
                })?,
                price_per_unit: real_to_decimal(row.get::<f64>(3).map_err(&map)?),
            });
        }
        Ok(items)
    }

    async fn get_product(&self, identifier: &str) -> Result<Option<Product>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
                params![identifier],
            )
            .await
            .map_err(query_err("get_product"))?;

        if let Some(row) = rows.next().await.map_err(query_err("get_product"))? {
            return Ok(Some(row_to_product(&row)?));
        }

        debug!(identifier, "No product id match, trying name search");
        let pattern = format!("%{identifier}%");
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE name LIKE ?1
                     ORDER BY product_id LIMIT 1"
                ),
                params![pattern],
            )
            .await
            .map_err(query_err("get_product"))?;

        match rows.next().await.map_err(query_err("get_product"))? {
            Some(row) => Ok(Some(row_to_product(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CheckpointStore for LibSqlBackend {
    async fn load_checkpoint(&self, thread_id: Uuid) -> Result<Option<Checkpoint>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CHECKPOINT_COLUMNS} FROM conversation_checkpoints WHERE thread_id = ?1"
                ),
                params![thread_id.to_string()],
            )
            .await
            .map_err(query_err("load_checkpoint"))?;

        match rows.next().await.map_err(query_err("load_checkpoint"))? {
            Some(row) => Ok(Some(row_to_checkpoint(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), DatabaseError> {
        let state_json = serde_json::to_string(&checkpoint.state)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let pending = checkpoint.pending.map(|s| s.to_string());

        self.conn()
            .execute(
                "INSERT INTO conversation_checkpoints
                 (thread_id, state, pending_step, prompt, created_at, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (thread_id) DO UPDATE SET
                    state = ?2, pending_step = ?3, prompt = ?4, updated_at = ?6, expires_at = ?7",
                params![
                    checkpoint.thread_id.to_string(),
                    state_json,
                    opt_text(pending.as_deref()),
                    opt_text(checkpoint.prompt.as_deref()),
                    format_datetime(checkpoint.created_at),
                    format_datetime(checkpoint.updated_at),
                    format_datetime(checkpoint.expires_at)
                ],
            )
            .await
            .map_err(query_err("save_checkpoint"))?;

        debug!(
            thread_id = %checkpoint.thread_id,
            pending = ?checkpoint.pending,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn delete_checkpoint(&self, thread_id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM conversation_checkpoints WHERE thread_id = ?1",
                params![thread_id.to_string()],
            )
            .await
            .map_err(query_err("delete_checkpoint"))?;
        Ok(count > 0)
    }

    async fn purge_expired_checkpoints(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM conversation_checkpoints WHERE expires_at <= ?1",
                params![format_datetime(now)],
            )
            .await
            .map_err(query_err("purge_expired_checkpoints"))?;
        if count > 0 {
            info!(count, "Purged expired conversation checkpoints");
        }
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::seed::SeedData;

    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        SeedData::demo().load_into(&db).await.unwrap();
        db
    }

    fn checkpoint(thread_id: Uuid, pending: Option<Step>, ttl: Duration) -> Checkpoint {
        let now = Utc::now();
        let mut state = ConversationState::new();
        state.push_user("What's the status of my last order?");
        state.push_assistant("Please provide your email address.");
        Checkpoint {
            thread_id,
            state,
            pending,
            prompt: pending.map(|_| "Please provide your email:".to_string()),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    // ── Customer tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn find_customer_by_email_exact_match() {
        let db = test_db().await;
        let info = db
            .find_customer_by_email("sarah.chen@gmail.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.customer_id, "CUST-001");
        assert_eq!(info.customer_name, "Sarah Chen");
    }

    #[tokio::test]
    async fn find_customer_by_email_is_exact() {
        let db = test_db().await;
        assert!(db.find_customer_by_email("sarah.chen").await.unwrap().is_none());
        assert!(
            db.find_customer_by_email("nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn get_customer_full_record() {
        let db = test_db().await;
        let customer = db.get_customer("CUST-001").await.unwrap().unwrap();
        assert_eq!(customer.email, "sarah.chen@gmail.com");
        assert_eq!(customer.segment, Segment::Consumer);
        assert!(db.get_customer("CUST-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn customer_orders_newest_first() {
        let db = test_db().await;
        let orders = db.get_customer_orders("CUST-001", 10).await.unwrap();
        assert!(orders.len() >= 2);
        for pair in orders.windows(2) {
            assert!(pair[0].order_date >= pair[1].order_date);
        }
        assert!(orders.iter().all(|o| o.customer_id == "CUST-001"));

        let limited = db.get_customer_orders("CUST-001", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0], orders[0]);
    }

    #[tokio::test]
    async fn order_and_items_roundtrip_money() {
        let db = test_db().await;
        let order = db.get_order("ORD-2024-0001").await.unwrap().unwrap();
        let items = db.get_order_items("ORD-2024-0001").await.unwrap();
        assert!(!items.is_empty());

        let sum: Decimal = items
            .iter()
            .map(|i| i.price_per_unit * Decimal::from(i.quantity))
            .sum();
        assert_eq!(sum, order.total_amount);
    }

    #[tokio::test]
    async fn product_lookup_by_id_then_name() {
        let db = test_db().await;
        let by_id = db.get_product("TECH-LAP-001").await.unwrap().unwrap();
        assert_eq!(by_id.price, dec!(1299.00));

        let by_name = db.get_product("MX Keys").await.unwrap().unwrap();
        assert_eq!(by_name.product_id, "TECH-KEY-001");

        assert!(db.get_product("Flux Capacitor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_counts_after_seed() {
        let db = test_db().await;
        let seed = SeedData::demo();
        let counts = db.catalog_counts().await.unwrap();
        assert_eq!(counts[0], ("customers", seed.customers.len() as i64));
        assert_eq!(counts[3], ("order_items", seed.order_items.len() as i64));

        db.clear_catalog().await.unwrap();
        let counts = db.catalog_counts().await.unwrap();
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    // ── Checkpoint tests ────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_save_and_load() {
        let db = test_db().await;
        let thread_id = Uuid::new_v4();
        let cp = checkpoint(thread_id, Some(Step::Collect), Duration::hours(1));

        db.save_checkpoint(&cp).await.unwrap();
        let loaded = db.load_checkpoint(thread_id).await.unwrap().unwrap();

        assert_eq!(loaded.state, cp.state);
        assert_eq!(loaded.pending, Some(Step::Collect));
        assert_eq!(loaded.prompt.as_deref(), Some("Please provide your email:"));
        assert!(loaded.is_suspended());
    }

    #[tokio::test]
    async fn checkpoint_upsert_clears_pending() {
        let db = test_db().await;
        let thread_id = Uuid::new_v4();
        db.save_checkpoint(&checkpoint(thread_id, Some(Step::Collect), Duration::hours(1)))
            .await
            .unwrap();

        let mut resumed = checkpoint(thread_id, None, Duration::hours(1));
        resumed.state.resolve_customer("CUST-001");
        db.save_checkpoint(&resumed).await.unwrap();

        let loaded = db.load_checkpoint(thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.pending, None);
        assert_eq!(loaded.prompt, None);
        assert_eq!(loaded.state.customer_id(), Some("CUST-001"));
    }

    #[tokio::test]
    async fn checkpoint_missing_is_none() {
        let db = test_db().await;
        assert!(db.load_checkpoint(Uuid::new_v4()).await.unwrap().is_none());
        assert!(!db.delete_checkpoint(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let db = test_db().await;
        let live = Uuid::new_v4();
        let stale = Uuid::new_v4();
        db.save_checkpoint(&checkpoint(live, None, Duration::hours(1)))
            .await
            .unwrap();
        db.save_checkpoint(&checkpoint(stale, Some(Step::Collect), Duration::seconds(-5)))
            .await
            .unwrap();

        let purged = db.purge_expired_checkpoints(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
        assert!(db.load_checkpoint(live).await.unwrap().is_some());
        assert!(db.load_checkpoint(stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.init_schema().await.unwrap();
    }
}
