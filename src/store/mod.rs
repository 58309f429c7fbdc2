//! Persistence layer: libSQL-backed customer catalog and conversation checkpoints.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{Customer, CustomerInfo, Order, OrderItem, OrderStatus, Product, Segment};
pub use seed::SeedData;
pub use traits::{Checkpoint, CheckpointStore, CustomerStore};
