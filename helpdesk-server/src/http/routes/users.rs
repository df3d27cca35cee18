//! User endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use helpdesk_core::models::{Department, Email, PhoneNumber};
use helpdesk_core::policy::{can_edit_profile, can_manage_users, can_view_user};
use helpdesk_core::{Paginated, Pagination, PaginationParams, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, non_empty};
use crate::db::repos::{UserChanges, UserRecord, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, AuthUser, ValidUuid};
use crate::state::AppState;

/// User response (never includes credentials)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    /// "First Last - email"
    pub name_email: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            full_name: u.full_name(),
            name_email: u.name_email(),
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            phone_number: u.phone_number,
            department: u.department,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
    pub role: Option<Role>,
}

/// A one-row listing of the caller; later pages are empty.
fn own_listing(user: UserRecord, page: Pagination) -> Paginated<UserResponse> {
    let items = if page.offset() == 0 {
        vec![UserResponse::from(user)]
    } else {
        Vec::new()
    };
    page.wrap(items, 1)
}

/// GET /api/users - staff see everyone, users only themselves
async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiQuery(paging): ApiQuery<PaginationParams>,
) -> Result<Json<Paginated<UserResponse>>, ApiError> {
    let page = Pagination::from(paging);

    if !auth.user.role.is_staff() {
        return Ok(Json(own_listing(auth.user, page)));
    }

    let role = non_empty(query.role)
        .map(|r| r.parse::<Role>())
        .transpose()?;
    let users = UserRepo::new(&state.pool).list(role, page).await?;
    Ok(Json(users.map(UserResponse::from)))
}

/// GET /api/users/me
async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(auth.user))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<UserResponse>, ApiError> {
    if !can_view_user(&auth.actor(), id) {
        return Err(ApiError::not_found("user", id));
    }
    let user = UserRepo::new(&state.pool).get(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// PATCH /api/users/{id}
async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let actor = auth.actor();
    if !can_view_user(&actor, id) {
        return Err(ApiError::not_found("user", id));
    }
    if !can_edit_profile(&actor, id) {
        return Err(ApiError::forbidden("you can only edit your own profile"));
    }
    if req.role.is_some() && !can_manage_users(&actor) {
        return Err(ApiError::forbidden("only admins can change roles"));
    }

    let changes = UserChanges {
        email: req.email.as_deref().map(Email::new).transpose()?,
        first_name: req.first_name,
        last_name: req.last_name,
        phone_number: req
            .phone_number
            .map(|p| p.as_deref().map(PhoneNumber::parse).transpose().map(Option::flatten))
            .transpose()?,
        department: req
            .department
            .map(|d| d.as_deref().map(Department::parse).transpose().map(Option::flatten))
            .transpose()?,
        role: req.role,
    };

    let user = UserRepo::new(&state.pool).update(id, changes).await?;
    tracing::info!(user_id = %user.id, by = %actor.id, "user updated");
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/users/{id} - admin only, never yourself
async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    let actor = auth.actor();
    if !can_manage_users(&actor) {
        return Err(ApiError::forbidden("only admins can delete users"));
    }
    if actor.id == id {
        return Err(ApiError::invalid("you cannot delete your own account"));
    }

    UserRepo::new(&state.pool).delete(id).await?;
    tracing::info!(user_id = %id, by = %actor.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/me", get(me))
        .route(
            "/api/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_clearing_phone() {
        let clear: UpdateUserRequest =
            serde_json::from_str(r#"{"phone_number": null}"#).unwrap();
        assert_eq!(clear.phone_number, Some(None));

        let untouched: UpdateUserRequest = serde_json::from_str(r#"{"first_name": "Ada"}"#).unwrap();
        assert_eq!(untouched.phone_number, None);
        assert_eq!(untouched.first_name.as_deref(), Some("Ada"));
    }

    fn record() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: Role::User,
            phone_number: None,
            department: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn own_listing_only_fills_first_page() {
        let first = own_listing(record(), Pagination::new(1, 20));
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.total, 1);

        let second = own_listing(record(), Pagination::new(2, 20));
        assert!(second.items.is_empty());
        assert_eq!(second.total, 1);
        assert!(!second.has_next());
    }

    #[test]
    fn response_carries_derived_names() {
        let response = UserResponse::from(record());
        assert_eq!(response.full_name, "Ada Lovelace");
        assert_eq!(response.name_email, "Ada Lovelace - ada@example.com");
    }

    #[test]
    fn role_must_be_known() {
        assert!(serde_json::from_str::<UpdateUserRequest>(r#"{"role": "root"}"#).is_err());
    }
}
