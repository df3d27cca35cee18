//! Command implementations for the helpdesk CLI

pub mod escalate;
pub mod migrate;
pub mod serve;
pub mod user;

pub use escalate::run_escalate;
pub use migrate::run_migrate;
pub use serve::run_serve;
pub use user::run_user;

use anyhow::{Context, Result};
use helpdesk_core::HelpdeskConfig;
use helpdesk_server::db::create_pool_with_options;
use sqlx::PgPool;

/// Open the pool described by `config` (after any `--database-url` override).
pub(crate) async fn connect(config: &HelpdeskConfig) -> Result<PgPool> {
    create_pool_with_options(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to create database pool")
}
