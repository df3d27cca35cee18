//! helpdesk-core: domain model for the helpdesk service
//!
//! Everything here is pure: validated input types, the ticket status
//! lifecycle, role-based access rules and the escalation policy. The
//! server crate layers persistence and HTTP on top of these.

pub mod config;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod reports;

pub use config::HelpdeskConfig;
pub use error::{CoreError, Result};
pub use escalation::{EscalationCutoffs, EscalationPolicy};
pub use models::{
    Paginated, Pagination, PaginationParams, Priority, Role, TicketStatus, ValidationError,
};
pub use policy::{Actor, TicketOwnership, TicketScope};
pub use reports::ActivitySummary;
