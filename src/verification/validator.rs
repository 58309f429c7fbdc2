//! Email validation against the customer store.

use tracing::debug;

use crate::error::DatabaseError;
use crate::store::{CustomerInfo, CustomerStore};

/// Result of checking an email against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified(CustomerInfo),
    /// Structurally invalid, or no customer has this email.
    NotFound,
}

impl VerificationOutcome {
    pub fn customer(&self) -> Option<&CustomerInfo> {
        match self {
            Self::Verified(info) => Some(info),
            Self::NotFound => None,
        }
    }
}

/// Cheap shape check run before any lookup.
pub fn is_plausible_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

/// Validate `email` and look it up by exact match.
///
/// A store failure is an error, never `NotFound`.
pub async fn validate_customer_email(
    store: &dyn CustomerStore,
    email: &str,
) -> Result<VerificationOutcome, DatabaseError> {
    if !is_plausible_email(email) {
        debug!(email, "Rejected email before lookup");
        return Ok(VerificationOutcome::NotFound);
    }

    match store.find_customer_by_email(email).await? {
        Some(info) => Ok(VerificationOutcome::Verified(info)),
        None => Ok(VerificationOutcome::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{Customer, Order, OrderItem, Product};

    /// In-memory store that counts lookups and can be told to fail.
    #[derive(Default)]
    struct CountingStore {
        lookups: AtomicUsize,
        broken: bool,
    }

    #[async_trait]
    impl CustomerStore for CountingStore {
        async fn find_customer_by_email(
            &self,
            email: &str,
        ) -> Result<Option<CustomerInfo>, DatabaseError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(DatabaseError::Query("disk I/O error".into()));
            }
            Ok((email == "sarah.chen@gmail.com").then(|| CustomerInfo {
                customer_id: "CUST-001".into(),
                customer_name: "Sarah Chen".into(),
            }))
        }

        async fn get_customer(&self, _: &str) -> Result<Option<Customer>, DatabaseError> {
            Ok(None)
        }

        async fn get_customer_orders(&self, _: &str, _: usize) -> Result<Vec<Order>, DatabaseError> {
            Ok(Vec::new())
        }

        async fn get_order(&self, _: &str) -> Result<Option<Order>, DatabaseError> {
            Ok(None)
        }

        async fn get_order_items(&self, _: &str) -> Result<Vec<OrderItem>, DatabaseError> {
            Ok(Vec::new())
        }

        async fn get_product(&self, _: &str) -> Result<Option<Product>, DatabaseError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn malformed_email_skips_lookup() {
        let store = CountingStore::default();
        for email in ["", "sarah.chen", "gmail.com"] {
            let outcome = validate_customer_email(&store, email).await.unwrap();
            assert_eq!(outcome, VerificationOutcome::NotFound);
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registered_email_is_verified_every_time() {
        let store = CountingStore::default();
        let first = validate_customer_email(&store, "sarah.chen@gmail.com")
            .await
            .unwrap();
        let second = validate_customer_email(&store, "sarah.chen@gmail.com")
            .await
            .unwrap();
        assert_eq!(first, second);
        let info = first.customer().unwrap();
        assert_eq!(info.customer_id, "CUST-001");
        assert_eq!(info.customer_name, "Sarah Chen");
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let store = CountingStore::default();
        let outcome = validate_customer_email(&store, "ghost@example.com")
            .await
            .unwrap();
        assert_eq!(outcome, VerificationOutcome::NotFound);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failure_is_an_error() {
        let store = CountingStore {
            broken: true,
            ..Default::default()
        };
        let result = validate_customer_email(&store, "sarah.chen@gmail.com").await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));
    }
}
