//! Application state shared across handlers

use helpdesk_core::EscalationPolicy;
use sqlx::PgPool;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Used to report when a ticket will escalate
    pub policy: EscalationPolicy,
}

impl AppState {
    pub fn new(pool: PgPool, policy: EscalationPolicy) -> Self {
        Self { pool, policy }
    }
}
