//! HTTP layer
//!
//! Axum server with:
//! - CORS (localhost only by default)
//! - Request tracing
//! - Trailing-slash tolerant routing
//! - Graceful shutdown shared with the escalation worker
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_app, run_server, EscalationWorker, ServerConfig, ServerError};
