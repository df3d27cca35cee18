//! Ticket repository
//!
//! Every read returns creator/assignee display names via JOIN. Writes use a
//! CTE so the new row comes back with names in the same round trip.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use helpdesk_core::models::{TicketDescription, TicketTitle};
use helpdesk_core::{Paginated, Pagination, Priority, TicketOwnership, TicketScope, TicketStatus, ValidationError};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{display_name_sql, DbError};

/// Ticket with display names, as returned by every query here
#[derive(Debug, Clone, FromRow)]
pub struct TicketRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub assigned_to: Option<Uuid>,
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub escalation_date: Option<DateTime<Utc>>,
}

impl TicketRecord {
    pub fn ownership(&self) -> TicketOwnership {
        TicketOwnership {
            created_by: self.created_by,
            assigned_to: self.assigned_to,
        }
    }
}

/// Projection over `source` (a table or CTE holding ticket rows), aliased `t`.
fn ticket_select(source: &str, extra_columns: &str) -> String {
    format!(
        r#"
        SELECT
            t.id, t.title, t.description, t.priority, t.status,
            t.created_by, {creator} AS created_by_name,
            t.assigned_to, {assignee} AS assigned_to_name,
            t.created_at, t.updated_at, t.resolved_at, t.escalation_date
            {extra}
        FROM {source} t
        JOIN users c ON c.id = t.created_by
        LEFT JOIN users a ON a.id = t.assigned_to
        "#,
        creator = display_name_sql("c"),
        assignee = display_name_sql("a"),
        extra = extra_columns,
        source = source,
    )
}

/// Sortable ticket columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    UpdatedAt,
    Priority,
}

/// `?ordering=` value: a field with an optional leading `-` for descending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketOrdering {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for TicketOrdering {
    /// Newest first
    fn default() -> Self {
        Self {
            field: OrderField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for TicketOrdering {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "created_at" => OrderField::CreatedAt,
            "updated_at" => OrderField::UpdatedAt,
            "priority" => OrderField::Priority,
            _ => {
                return Err(ValidationError::InvalidVariant {
                    field: "ordering",
                    value: s.to_owned(),
                })
            }
        };
        Ok(Self { field, descending })
    }
}

impl TicketOrdering {
    /// ORDER BY clause body. Ties broken by id for stable paging.
    fn sql(&self) -> String {
        let column = match self.field {
            OrderField::CreatedAt => "t.created_at".to_owned(),
            OrderField::UpdatedAt => "t.updated_at".to_owned(),
            OrderField::Priority => priority_rank_sql(),
        };
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}, t.id {}", column, direction, direction)
    }
}

/// `CASE` expression mapping the stored priority to [`Priority::rank`].
fn priority_rank_sql() -> String {
    let arms: String = Priority::ALL
        .iter()
        .map(|p| format!(" WHEN '{}' THEN {}", p.as_str(), p.rank()))
        .collect();
    format!("CASE t.priority{} END", arms)
}

/// List filters from the query string
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    pub ordering: TicketOrdering,
}

/// Escape LIKE metacharacters and wrap in `%...%`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: TicketScope) {
    match scope {
        TicketScope::All => {}
        TicketScope::CreatedOrAssigned(id) => {
            builder.push(" AND (t.created_by = ");
            builder.push_bind(id);
            builder.push(" OR t.assigned_to = ");
            builder.push_bind(id);
            builder.push(")");
        }
        TicketScope::CreatedBy(id) => {
            builder.push(" AND t.created_by = ");
            builder.push_bind(id);
        }
    }
}

/// Visibility scope plus list filters, appended after `WHERE 1=1`.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, scope: TicketScope, filter: &TicketFilter) {
    push_scope(builder, scope);

    if let Some(status) = filter.status {
        builder.push(" AND t.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND t.priority = ");
        builder.push_bind(priority.as_str());
    }
    if let Some(assignee) = filter.assigned_to {
        builder.push(" AND t.assigned_to = ");
        builder.push_bind(assignee);
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        builder.push(" AND (t.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR t.description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// A status move with its recomputed resolution stamp
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub status: TicketStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Partial ticket update. `None` leaves a field untouched;
/// `assigned_to: Some(None)` unassigns.
#[derive(Debug, Default)]
pub struct TicketChanges {
    pub title: Option<TicketTitle>,
    pub description: Option<TicketDescription>,
    pub priority: Option<Priority>,
    pub status: Option<StatusChange>,
    pub assigned_to: Option<Option<Uuid>>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.assigned_to.is_none()
    }
}

/// Ticket repository
pub struct TicketRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        created_by: Uuid,
        title: TicketTitle,
        description: TicketDescription,
        priority: Priority,
    ) -> Result<TicketRecord, DbError> {
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO tickets (title, description, priority, created_by)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            {}
            "#,
            ticket_select("inserted", "")
        );

        let ticket = sqlx::query_as::<_, TicketRecord>(&sql)
            .bind(title.as_str())
            .bind(description.as_str())
            .bind(priority.as_str())
            .bind(created_by)
            .fetch_one(self.pool)
            .await?;

        Ok(ticket)
    }

    pub async fn get(&self, id: Uuid) -> Result<TicketRecord, DbError> {
        let sql = format!("{} WHERE t.id = $1", ticket_select("tickets", ""));
        sqlx::query_as::<_, TicketRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("ticket", id))
    }

    /// List tickets visible under `scope`, filtered and paged.
    pub async fn list(
        &self,
        scope: TicketScope,
        filter: &TicketFilter,
        page: Pagination,
    ) -> Result<Paginated<TicketRecord>, DbError> {
        let mut builder = QueryBuilder::new(ticket_select("tickets", ", COUNT(*) OVER() AS total"));
        builder.push(" WHERE 1=1");
        push_filters(&mut builder, scope, filter);

        builder.push(" ORDER BY ");
        builder.push(filter.ordering.sql());
        builder.push(" LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(self.pool).await?;

        let total = match rows.first() {
            Some(row) => row.try_get::<i64, _>("total")?,
            // Past the last page the window count has no row to ride on
            None if page.offset() > 0 => self.count(scope, filter).await?,
            None => 0,
        };
        let items = rows
            .iter()
            .map(TicketRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    /// Number of tickets matching `scope` and `filter`, ignoring paging.
    pub async fn count(&self, scope: TicketScope, filter: &TicketFilter) -> Result<i64, DbError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM tickets t WHERE 1=1");
        push_filters(&mut builder, scope, filter);
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;
        Ok(total)
    }

    /// Apply `changes` if the ticket is still in `expected_status`.
    ///
    /// The status guard keeps a manual update from silently overwriting a
    /// concurrent escalation; a lost race comes back as a conflict.
    /// Any change refreshes `updated_at`, which restarts the escalation clock.
    pub async fn update(
        &self,
        id: Uuid,
        expected_status: TicketStatus,
        changes: TicketChanges,
    ) -> Result<TicketRecord, DbError> {
        if changes.is_empty() {
            return self.get(id).await;
        }

        let mut builder = QueryBuilder::new("WITH updated AS (UPDATE tickets SET updated_at = NOW()");
        if let Some(title) = &changes.title {
            builder.push(", title = ");
            builder.push_bind(title.as_str().to_owned());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ");
            builder.push_bind(description.as_str().to_owned());
        }
        if let Some(priority) = changes.priority {
            builder.push(", priority = ");
            builder.push_bind(priority.as_str());
        }
        if let Some(change) = changes.status {
            builder.push(", status = ");
            builder.push_bind(change.status.as_str());
            builder.push(", resolved_at = ");
            builder.push_bind(change.resolved_at);
        }
        if let Some(assignee) = changes.assigned_to {
            builder.push(", assigned_to = ");
            builder.push_bind(assignee);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND status = ");
        builder.push_bind(expected_status.as_str());
        builder.push(" RETURNING *) ");
        builder.push(ticket_select("updated", ""));

        let updated = builder
            .build_query_as::<TicketRecord>()
            .fetch_optional(self.pool)
            .await?;

        match updated {
            Some(ticket) => Ok(ticket),
            None => {
                // Distinguish a missing ticket from a lost race
                let current = self.get(id).await?;
                Err(DbError::Conflict {
                    message: format!(
                        "ticket status changed to {} while updating; reload and retry",
                        current.status
                    ),
                })
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ticket", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_parses_direction() {
        let o: TicketOrdering = "-updated_at".parse().unwrap();
        assert_eq!(o.field, OrderField::UpdatedAt);
        assert!(o.descending);

        let o: TicketOrdering = "priority".parse().unwrap();
        assert_eq!(o.field, OrderField::Priority);
        assert!(!o.descending);

        assert!("title".parse::<TicketOrdering>().is_err());
        assert!("--created_at".parse::<TicketOrdering>().is_err());
    }

    #[test]
    fn default_ordering_is_newest_first() {
        assert_eq!(TicketOrdering::default().sql(), "t.created_at DESC, t.id DESC");
    }

    #[test]
    fn priority_ordering_ranks_high_last_ascending() {
        let sql = TicketOrdering {
            field: OrderField::Priority,
            descending: false,
        }
        .sql();
        assert_eq!(
            sql,
            "CASE t.priority WHEN 'high' THEN 2 WHEN 'medium' THEN 1 WHEN 'low' THEN 0 END ASC, t.id ASC"
        );
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("vpn"), "%vpn%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn scope_sql_binds_actor() {
        let id = Uuid::new_v4();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM tickets t WHERE 1=1");
        push_scope(&mut builder, TicketScope::CreatedOrAssigned(id));
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM tickets t WHERE 1=1 AND (t.created_by = $1 OR t.assigned_to = $2)"
        );

        let mut builder = QueryBuilder::<Postgres>::new("x");
        push_scope(&mut builder, TicketScope::All);
        assert_eq!(builder.sql(), "x");
    }

    #[test]
    fn filters_follow_scope() {
        let id = Uuid::new_v4();
        let filter = TicketFilter {
            status: Some(TicketStatus::Open),
            priority: Some(Priority::High),
            search: Some("  ".into()),
            ..TicketFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets t WHERE 1=1");
        push_filters(&mut builder, TicketScope::CreatedBy(id), &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM tickets t WHERE 1=1 AND t.created_by = $1 \
             AND t.status = $2 AND t.priority = $3"
        );
    }

    #[test]
    fn select_joins_both_users() {
        let sql = ticket_select("tickets", "");
        assert!(sql.contains("JOIN users c ON c.id = t.created_by"));
        assert!(sql.contains("LEFT JOIN users a ON a.id = t.assigned_to"));
    }
}
