//! helpdesk-server: HTTP API, persistence and the escalation worker
//!
//! - `db`: PostgreSQL pool, schema and repositories
//! - `auth`: password hashing and bearer tokens
//! - `http`: axum router, handlers, JSON errors
//! - `escalation`: the periodic sweep and its worker loop
//! - `mail`: notification delivery

pub mod auth;
pub mod db;
pub mod escalation;
pub mod http;
pub mod mail;
pub mod state;

pub use state::AppState;
