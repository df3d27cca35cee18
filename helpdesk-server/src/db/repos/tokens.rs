//! Bearer token repository

use sqlx::PgPool;
use uuid::Uuid;

use super::{DbError, UserRecord};
use crate::auth::generate_token;

/// Bearer token repository
pub struct TokenRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Issue a fresh token for `user_id`.
    pub async fn issue(&self, user_id: Uuid) -> Result<String, DbError> {
        let token = generate_token();
        sqlx::query("INSERT INTO auth_tokens (token, user_id) VALUES ($1, $2)")
            .bind(&token)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(token)
    }

    /// Resolve a token to its user, touching `last_used_at`.
    ///
    /// Single query: CTE for the touch + JOIN for the user row.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, DbError> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            WITH touched AS (
                UPDATE auth_tokens SET last_used_at = NOW()
                WHERE token = $1
                RETURNING user_id
            )
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.role,
                   u.phone_number, u.department, u.created_at, u.updated_at
            FROM touched t
            JOIN users u ON u.id = t.user_id
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Revoke one token. Unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM auth_tokens WHERE token = $1")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every token held by a user, as after a password reset.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
