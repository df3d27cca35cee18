//! Repository implementations for database access
//!
//! Each repository borrows the pool and follows these patterns:
//! - JOINs for display names on list operations (no N+1)
//! - Unique violations surface as `DbError::Conflict` (no check-then-insert)
//! - Transactions for multi-step writes

pub mod comments;
pub mod escalation;
pub mod reports;
pub mod tickets;
pub mod tokens;
pub mod users;

pub use comments::{CommentRecord, CommentRepo};
pub use escalation::{DueTickets, EscalatedTicket, EscalationRepo};
pub use reports::ReportRepo;
pub use tickets::{StatusChange, TicketChanges, TicketFilter, TicketOrdering, TicketRecord, TicketRepo};
pub use tokens::TokenRepo;
pub use users::{NewUser, UserChanges, UserRecord, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Turn a unique-constraint violation into a conflict with `message`.
    pub(crate) fn unique_as_conflict(err: sqlx::Error, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                message: message.to_owned(),
            },
            _ => Self::Sqlx(err),
        }
    }
}

/// SQL expression for a user's display name: "first last", else the username.
///
/// `alias` is the table alias of a `users` row.
pub(crate) fn display_name_sql(alias: &str) -> String {
    format!(
        "COALESCE(NULLIF(TRIM({a}.first_name || ' ' || {a}.last_name), ''), {a}.username)",
        a = alias
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_uses_alias() {
        let sql = display_name_sql("a");
        assert!(sql.contains("a.first_name"));
        assert!(sql.contains("a.username"));
        assert!(!sql.contains("c."));
    }

    #[test]
    fn non_unique_errors_pass_through() {
        let err = DbError::unique_as_conflict(sqlx::Error::RowNotFound, "taken");
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
