//! User repository

use chrono::{DateTime, Utc};
use helpdesk_core::models::{Department, Email, PhoneNumber, Username};
use helpdesk_core::{Actor, Paginated, Pagination, Role};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::DbError;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role, \
                            phone_number, department, created_at, updated_at";

/// User record from database (never carries the password hash)
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    /// "First Last", or the username when both names are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }

    /// "First Last - email"
    pub fn name_email(&self) -> String {
        format!("{} {} - {}", self.first_name, self.last_name, self.email)
    }
}

/// Validated input for a new account
#[derive(Debug)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: Option<PhoneNumber>,
    pub department: Option<Department>,
    pub password_hash: String,
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<Option<PhoneNumber>>,
    pub department: Option<Option<Department>>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.department.is_none()
            && self.role.is_none()
    }
}

fn push_role(builder: &mut QueryBuilder<'_, Postgres>, role: Option<Role>) {
    if let Some(role) = role {
        builder.push(" AND role = ");
        builder.push_bind(role.as_str());
    }
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. Duplicate username or email is a conflict.
    pub async fn create(&self, user: NewUser) -> Result<UserRecord, DbError> {
        let sql = format!(
            r#"
            INSERT INTO users
                (username, email, first_name, last_name, role, phone_number, department, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.username.as_str())
            .bind(user.email.as_str())
            .bind(user.first_name.trim())
            .bind(user.last_name.trim())
            .bind(user.role.as_str())
            .bind(user.phone_number.as_ref().map(|p| p.as_str()))
            .bind(user.department.as_ref().map(|d| d.as_str()))
            .bind(&user.password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| DbError::unique_as_conflict(e, "a user with that username or email already exists"))
    }

    pub async fn get(&self, id: Uuid) -> Result<UserRecord, DbError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    /// Look up a user and their password hash for login.
    pub async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(UserRecord, String)>, DbError> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE username = $1",
            USER_COLUMNS
        );
        let Some(row) = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let user = UserRecord::from_row(&row)?;
        let hash: String = row.try_get("password_hash")?;
        Ok(Some((user, hash)))
    }

    /// List users, optionally restricted to one role. Ordered by username.
    pub async fn list(
        &self,
        role: Option<Role>,
        page: Pagination,
    ) -> Result<Paginated<UserRecord>, DbError> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {}, COUNT(*) OVER() AS total FROM users WHERE 1=1",
            USER_COLUMNS
        ));
        push_role(&mut builder, role);
        builder.push(" ORDER BY username LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(self.pool).await?;

        let total = match rows.first() {
            Some(row) => row.try_get::<i64, _>("total")?,
            None if page.offset() > 0 => self.count(role).await?,
            None => 0,
        };
        let items = rows
            .iter()
            .map(UserRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    /// Number of users, optionally with one role, ignoring paging.
    pub async fn count(&self, role: Option<Role>) -> Result<i64, DbError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_role(&mut builder, role);
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;
        Ok(total)
    }

    /// Apply a partial update and return the new record.
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, DbError> {
        if changes.is_empty() {
            return self.get(id).await;
        }

        let mut builder = QueryBuilder::new("UPDATE users SET updated_at = NOW()");
        if let Some(email) = &changes.email {
            builder.push(", email = ");
            builder.push_bind(email.as_str().to_owned());
        }
        if let Some(first_name) = &changes.first_name {
            builder.push(", first_name = ");
            builder.push_bind(first_name.trim().to_owned());
        }
        if let Some(last_name) = &changes.last_name {
            builder.push(", last_name = ");
            builder.push_bind(last_name.trim().to_owned());
        }
        if let Some(phone) = &changes.phone_number {
            builder.push(", phone_number = ");
            builder.push_bind(phone.as_ref().map(|p| p.as_str().to_owned()));
        }
        if let Some(department) = &changes.department {
            builder.push(", department = ");
            builder.push_bind(department.as_ref().map(|d| d.as_str().to_owned()));
        }
        if let Some(role) = changes.role {
            builder.push(", role = ");
            builder.push_bind(role.as_str());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING ");
        builder.push(USER_COLUMNS);

        builder
            .build_query_as::<UserRecord>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DbError::unique_as_conflict(e, "a user with that email already exists"))?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            first_name: first.into(),
            last_name: last.into(),
            role: Role::User,
            phone_number: None,
            department: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_falls_back_to_username() {
        assert_eq!(record("Jane", "Doe").full_name(), "Jane Doe");
        assert_eq!(record("Jane", "").full_name(), "Jane");
        assert_eq!(record("", "").full_name(), "jdoe");
    }

    #[test]
    fn name_email_format() {
        assert_eq!(
            record("Jane", "Doe").name_email(),
            "Jane Doe - jdoe@example.com"
        );
    }

    #[test]
    fn empty_changes() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            role: Some(Role::Agent),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
