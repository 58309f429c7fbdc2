//! Customer and catalog records read from the TechHub store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity returned by a successful email lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub customer_id: String,
    pub customer_name: String,
}

/// Customer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Consumer,
    Corporate,
    #[serde(rename = "Home Office")]
    HomeOffice,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "Consumer",
            Self::Corporate => "Corporate",
            Self::HomeOffice => "Home Office",
        }
    }
}

impl std::str::FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Consumer" => Ok(Self::Consumer),
            "Corporate" => Ok(Self::Corporate),
            "Home Office" => Ok(Self::HomeOffice),
            other => Err(format!("unknown segment '{other}'")),
        }
    }
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub city: String,
    pub state: String,
    pub segment: Segment,
}

impl Customer {
    pub fn info(&self) -> CustomerInfo {
        CustomerInfo {
            customer_id: self.customer_id.clone(),
            customer_name: self.name.clone(),
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub in_stock: bool,
}

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub status: OrderStatus,
    pub shipped_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    pub total_amount: Decimal,
}

impl Order {
    /// One-line summary used in responder context.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}: {}, {}, ${:.2}",
            self.order_id, self.order_date, self.status, self.total_amount
        );
        if let Some(ref tracking) = self.tracking_number {
            line.push_str(&format!(", tracking {tracking}"));
        }
        line
    }
}

/// A line in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price_per_unit: Decimal,
}
