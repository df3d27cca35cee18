//! Escalation sweep queries
//!
//! The due-ticket rule from `EscalationPolicy` is bound in as three
//! per-priority `updated_at` cutoffs. Cutoffs are taken from the database
//! clock, the same clock that stamps `updated_at`.

use chrono::{DateTime, Utc};
use helpdesk_core::{EscalationPolicy, Priority, TicketStatus};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{display_name_sql, DbError};

/// A ticket moved (or about to be moved) to `escalated`, with the contact
/// details needed to notify people about it
#[derive(Debug, Clone, FromRow)]
pub struct EscalatedTicket {
    pub id: Uuid,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub previous_status: TicketStatus,
    pub updated_at: DateTime<Utc>,
    /// None for dry-run previews
    pub escalation_date: Option<DateTime<Utc>>,
    pub created_by_name: String,
    pub creator_email: String,
    pub assigned_to: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub assignee_email: Option<String>,
}

/// `$1..$3` are the cutoffs in `Priority::ALL` order.
const DUE_PREDICATE: &str = r#"
    status IN ('open', 'in_progress')
    AND (
        (priority = 'high' AND updated_at < $1)
        OR (priority = 'medium' AND updated_at < $2)
        OR (priority = 'low' AND updated_at < $3)
    )
"#;

fn contacts_select(source: &str, escalation_date: &str) -> String {
    format!(
        r#"
        SELECT e.id, e.title, e.priority, e.previous_status, e.updated_at,
               {escalation_date} AS escalation_date,
               {creator} AS created_by_name, c.email AS creator_email,
               e.assigned_to, {assignee} AS assignee_name, a.email AS assignee_email
        FROM {source} e
        JOIN users c ON c.id = e.created_by
        LEFT JOIN users a ON a.id = e.assigned_to
        ORDER BY e.updated_at, e.id
        "#,
        escalation_date = escalation_date,
        creator = display_name_sql("c"),
        assignee = display_name_sql("a"),
        source = source,
    )
}

/// Result of one due-ticket query, with the database time it was evaluated at
#[derive(Debug, Clone)]
pub struct DueTickets {
    pub as_of: DateTime<Utc>,
    pub tickets: Vec<EscalatedTicket>,
}

async fn db_now(conn: &mut PgConnection) -> Result<DateTime<Utc>, DbError> {
    let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
        .fetch_one(conn)
        .await?;
    Ok(now)
}

/// Escalation repository
pub struct EscalationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> EscalationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Escalate every due ticket in one statement.
    ///
    /// Rows locked by an in-flight API update are skipped and picked up by
    /// the next sweep. `updated_at` is left alone: escalation is not
    /// activity on the ticket. `NOW()` is fixed for the transaction, so the
    /// cutoffs and `escalation_date` share one instant.
    pub async fn escalate_due(&self, policy: &EscalationPolicy) -> Result<DueTickets, DbError> {
        let sql = format!(
            r#"
            WITH due AS (
                SELECT id, status AS previous_status
                FROM tickets
                WHERE {due}
                FOR UPDATE SKIP LOCKED
            ),
            escalated AS (
                UPDATE tickets t
                SET status = 'escalated', escalation_date = $4
                FROM due
                WHERE t.id = due.id
                RETURNING t.id, t.title, t.priority, due.previous_status,
                          t.created_by, t.assigned_to, t.updated_at, t.escalation_date
            )
            {select}
            "#,
            due = DUE_PREDICATE,
            select = contacts_select("escalated", "e.escalation_date"),
        );

        let mut tx = self.pool.begin().await?;
        let as_of = db_now(&mut *tx).await?;
        let cutoffs = policy.cutoffs(as_of);

        let mut query = sqlx::query_as::<_, EscalatedTicket>(&sql);
        for priority in Priority::ALL {
            query = query.bind(cutoffs.for_priority(priority));
        }
        let tickets = query.bind(as_of).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(DueTickets { as_of, tickets })
    }

    /// Tickets that a sweep would escalate right now, without changing anything.
    pub async fn preview_due(&self, policy: &EscalationPolicy) -> Result<DueTickets, DbError> {
        let sql = format!(
            r#"
            WITH due AS (
                SELECT id, title, priority, status AS previous_status,
                       created_by, assigned_to, updated_at
                FROM tickets
                WHERE {due}
            )
            {select}
            "#,
            due = DUE_PREDICATE,
            select = contacts_select("due", "NULL::timestamptz"),
        );

        let mut conn = self.pool.acquire().await?;
        let as_of = db_now(&mut *conn).await?;
        let cutoffs = policy.cutoffs(as_of);

        let mut query = sqlx::query_as::<_, EscalatedTicket>(&sql);
        for priority in Priority::ALL {
            query = query.bind(cutoffs.for_priority(priority));
        }
        let tickets = query.fetch_all(&mut *conn).await?;

        Ok(DueTickets { as_of, tickets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_predicate_excludes_terminal_statuses() {
        assert!(DUE_PREDICATE.contains("status IN ('open', 'in_progress')"));
        assert!(!DUE_PREDICATE.contains("resolved"));
    }

    #[test]
    fn cutoff_placeholders_follow_priority_order() {
        for (n, priority) in Priority::ALL.iter().enumerate() {
            let arm = format!("priority = '{}' AND updated_at < ${}", priority.as_str(), n + 1);
            assert!(DUE_PREDICATE.contains(&arm), "{arm}");
        }
    }

    #[test]
    fn preview_has_no_escalation_date() {
        let sql = contacts_select("due", "NULL::timestamptz");
        assert!(sql.contains("NULL::timestamptz AS escalation_date"));
    }
}
