//! Store traits: the read-only customer store and the checkpoint store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationState;
use crate::error::DatabaseError;
use crate::store::model::{Customer, CustomerInfo, Order, OrderItem, Product};
use crate::verification::Step;

/// Read-only access to customers, products, and orders.
///
/// A `None`/empty result is a normal outcome; `Err` always means the store
/// itself could not answer.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Exact-match lookup by email. Emails are unique, so at most one row.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerInfo>, DatabaseError>;

    /// Full customer record.
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, DatabaseError>;

    /// Orders for a customer, newest first, up to `limit`.
    async fn get_customer_orders(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, DatabaseError>;

    /// A single order by id.
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, DatabaseError>;

    /// Line items of an order.
    async fn get_order_items(&self, order_id: &str) -> Result<Vec<OrderItem>, DatabaseError>;

    /// Product by exact id, falling back to the first name containing `identifier`.
    async fn get_product(&self, identifier: &str) -> Result<Option<Product>, DatabaseError>;
}

/// Persisted continuation of one conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: Uuid,
    pub state: ConversationState,
    /// Step to resume at when the next human message arrives.
    pub pending: Option<Step>,
    /// Prompt emitted at the suspension point.
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Whether this checkpoint is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the thread is suspended waiting for human input.
    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }
}

/// Durable storage for conversation checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load a thread's checkpoint, expired or not.
    async fn load_checkpoint(&self, thread_id: Uuid) -> Result<Option<Checkpoint>, DatabaseError>;

    /// Insert or replace a thread's checkpoint.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), DatabaseError>;

    /// Delete a thread's checkpoint. Returns whether one existed.
    async fn delete_checkpoint(&self, thread_id: Uuid) -> Result<bool, DatabaseError>;

    /// Delete every checkpoint that expired at or before `now`.
    /// Returns the number deleted.
    async fn purge_expired_checkpoints(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}
