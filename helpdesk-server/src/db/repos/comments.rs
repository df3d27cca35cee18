//! Comment repository
//!
//! Comments hang off a ticket. Posting one counts as activity on the
//! ticket, so it refreshes the ticket's `updated_at` in the same
//! transaction.

use chrono::{DateTime, Utc};
use helpdesk_core::models::CommentContent;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{display_name_sql, DbError};

/// Comment with its author's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub ticket_id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn comment_select(source: &str) -> String {
    format!(
        r#"
        SELECT cm.id, cm.ticket_id, cm.user_id, {name} AS user_name,
               cm.content, cm.created_at, cm.updated_at
        FROM {source} cm
        JOIN users u ON u.id = cm.user_id
        "#,
        name = display_name_sql("u"),
        source = source,
    )
}

/// Comment repository
pub struct CommentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All comments on a ticket, oldest first.
    pub async fn list_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<CommentRecord>, DbError> {
        let sql = format!(
            "{} WHERE cm.ticket_id = $1 ORDER BY cm.created_at, cm.id",
            comment_select("comments")
        );
        let comments = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(ticket_id)
            .fetch_all(self.pool)
            .await?;
        Ok(comments)
    }

    /// Add a comment and bump the ticket's `updated_at` (atomic).
    pub async fn create(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        content: CommentContent,
    ) -> Result<CommentRecord, DbError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE tickets SET updated_at = NOW() WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("ticket", ticket_id));
        }

        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO comments (ticket_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            {}
            "#,
            comment_select("inserted")
        );
        let comment = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(ticket_id)
            .bind(user_id)
            .bind(content.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    /// Fetch one comment, scoped to its ticket.
    pub async fn get(&self, ticket_id: Uuid, comment_id: Uuid) -> Result<CommentRecord, DbError> {
        let sql = format!(
            "{} WHERE cm.ticket_id = $1 AND cm.id = $2",
            comment_select("comments")
        );
        sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(ticket_id)
            .bind(comment_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("comment", comment_id))
    }

    pub async fn update(
        &self,
        comment_id: Uuid,
        content: CommentContent,
    ) -> Result<CommentRecord, DbError> {
        let sql = format!(
            r#"
            WITH updated AS (
                UPDATE comments SET content = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {}
            "#,
            comment_select("updated")
        );
        sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(comment_id)
            .bind(content.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("comment", comment_id))
    }

    pub async fn delete(&self, comment_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("comment", comment_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_author_as_user() {
        let comment = CommentRecord {
            id: Uuid::nil(),
            ticket_id: Uuid::nil(),
            user_id: Uuid::nil(),
            user_name: "Jane Doe".into(),
            content: "Restarted the router".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["user"], Uuid::nil().to_string());
        assert_eq!(json["user_name"], "Jane Doe");
        assert!(json.get("ticket_id").is_none());
    }
}
