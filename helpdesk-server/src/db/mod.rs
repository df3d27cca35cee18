//! Database layer - connection pool, schema and repositories
//!
//! - All list operations JOIN for display names - no N+1 queries
//! - Rely on DB constraints and map unique violations to conflicts
//! - Transactions for multi-step writes

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
