//! Demo catalog used by `techhub-support seed` and by tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::DatabaseError;
use crate::store::libsql_backend::LibSqlBackend;
use crate::store::model::{Customer, Order, OrderItem, OrderStatus, Product, Segment};

/// A self-consistent set of customers, products, orders, and line items.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn customer(
    id: &str,
    email: &str,
    name: &str,
    phone: Option<&str>,
    city: &str,
    state: &str,
    segment: Segment,
) -> Customer {
    Customer {
        customer_id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        phone: phone.map(str::to_string),
        city: city.to_string(),
        state: state.to_string(),
        segment,
    }
}

fn product(id: &str, name: &str, category: &str, cents: i64, in_stock: bool) -> Product {
    Product {
        product_id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        price: money(cents),
        in_stock,
    }
}

impl SeedData {
    /// The demo dataset. `sarah.chen@gmail.com` is always `CUST-001`.
    pub fn demo() -> Self {
        let customers = vec![
            customer(
                "CUST-001",
                "sarah.chen@gmail.com",
                "Sarah Chen",
                Some("512-555-0142"),
                "Austin",
                "TX",
                Segment::Consumer,
            ),
            customer(
                "CUST-002",
                "marcus.johnson@outlook.com",
                "Marcus Johnson",
                Some("206-555-0199"),
                "Seattle",
                "WA",
                Segment::Corporate,
            ),
            customer(
                "CUST-003",
                "priya.patel@yahoo.com",
                "Priya Patel",
                None,
                "Denver",
                "CO",
                Segment::HomeOffice,
            ),
            customer(
                "CUST-004",
                "diego.ramirez@gmail.com",
                "Diego Ramirez",
                Some("305-555-0117"),
                "Miami",
                "FL",
                Segment::Consumer,
            ),
        ];

        let products = vec![
            product("TECH-LAP-001", "MacBook Air M3 13-inch", "Laptops", 129_900, true),
            product("TECH-LAP-002", "Dell XPS 15", "Laptops", 149_999, true),
            product("TECH-MON-001", "LG UltraFine 27-inch 4K", "Monitors", 44_999, true),
            product("TECH-MON-002", "Dell UltraSharp 32 Curved", "Monitors", 89_999, false),
            product("TECH-KEY-001", "Logitech MX Keys", "Keyboards", 9_999, true),
            product("TECH-AUD-001", "Sony WH-1000XM5 Headphones", "Audio", 39_999, true),
            product("TECH-ACC-001", "Anker USB-C Hub 7-in-1", "Accessories", 3_499, true),
        ];

        let mut data = Self {
            customers,
            products,
            ..Self::default()
        };

        data.push_order(
            "ORD-2024-0001",
            "CUST-001",
            date(2024, 10, 14),
            OrderStatus::Delivered,
            Some((date(2024, 10, 15), "1Z999AA10123456784")),
            &[("TECH-LAP-001", 1), ("TECH-ACC-001", 1)],
        );
        data.push_order(
            "ORD-2024-0002",
            "CUST-001",
            date(2024, 11, 2),
            OrderStatus::Shipped,
            Some((date(2024, 11, 4), "1Z999AA10123456791")),
            &[("TECH-KEY-001", 1), ("TECH-MON-001", 1)],
        );
        data.push_order(
            "ORD-2024-0003",
            "CUST-002",
            date(2024, 9, 21),
            OrderStatus::Delivered,
            Some((date(2024, 9, 23), "1Z999AA10123456802")),
            &[("TECH-LAP-002", 2)],
        );
        data.push_order(
            "ORD-2024-0004",
            "CUST-003",
            date(2024, 11, 10),
            OrderStatus::Processing,
            None,
            &[("TECH-AUD-001", 1)],
        );
        data.push_order(
            "ORD-2024-0005",
            "CUST-004",
            date(2024, 8, 30),
            OrderStatus::Cancelled,
            None,
            &[("TECH-MON-002", 1)],
        );

        data
    }

    /// Add an order whose total is the sum of its lines at catalog price.
    fn push_order(
        &mut self,
        order_id: &str,
        customer_id: &str,
        order_date: NaiveDate,
        status: OrderStatus,
        shipment: Option<(NaiveDate, &str)>,
        lines: &[(&str, u32)],
    ) {
        let mut total = Decimal::ZERO;
        for &(product_id, quantity) in lines {
            let price = self
                .products
                .iter()
                .find(|p| p.product_id == product_id)
                .map(|p| p.price)
                .unwrap_or_default();
            total += price * Decimal::from(quantity);
            self.order_items.push(OrderItem {
                order_id: order_id.to_string(),
                product_id: product_id.to_string(),
                quantity,
                price_per_unit: price,
            });
        }

        self.orders.push(Order {
            order_id: order_id.to_string(),
            customer_id: customer_id.to_string(),
            order_date,
            status,
            shipped_date: shipment.map(|(d, _)| d),
            tracking_number: shipment.map(|(_, t)| t.to_string()),
            total_amount: total,
        });
    }

    /// Write every record into `db`. Existing rows with the same ids are replaced.
    pub async fn load_into(&self, db: &LibSqlBackend) -> Result<(), DatabaseError> {
        for customer in &self.customers {
            db.upsert_customer(customer).await?;
        }
        for product in &self.products {
            db.upsert_product(product).await?;
        }
        for order in &self.orders {
            db.upsert_order(order).await?;
        }
        for item in &self.order_items {
            db.insert_order_item(item).await?;
        }
        info!(
            customers = self.customers.len(),
            products = self.products.len(),
            orders = self.orders.len(),
            "Seed data loaded"
        );
        Ok(())
    }
}
