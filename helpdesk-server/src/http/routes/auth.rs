//! Account endpoints: register, login, logout

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use helpdesk_core::models::{Department, Email, Password, PhoneNumber, Username};
use helpdesk_core::Role;
use serde::{Deserialize, Serialize};

use super::users::UserResponse;
use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::db::repos::{NewUser, TokenRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone_number: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// POST /api/auth/register - always creates a plain `user`
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let password = Password::confirmed(&req.password, &req.password2)?;
    let username = Username::new(&req.username)?;
    let email = Email::new(&req.email)?;
    let phone_number = req.phone_number.as_deref().map(PhoneNumber::parse).transpose()?.flatten();
    let department = req.department.as_deref().map(Department::parse).transpose()?.flatten();

    let password_hash = hash_password_blocking(password.expose().to_owned()).await?;

    let user = UserRepo::new(&state.pool)
        .create(NewUser {
            username,
            email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: Role::User,
            phone_number,
            department,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/auth/login - exchange credentials for a bearer token
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some((user, hash)) = UserRepo::new(&state.pool)
        .find_credentials(req.username.trim())
        .await?
    else {
        return Err(ApiError::invalid(INVALID_CREDENTIALS));
    };

    if !verify_password_blocking(req.password, hash).await? {
        tracing::debug!(username = %user.username, "login rejected");
        return Err(ApiError::invalid(INVALID_CREDENTIALS));
    }

    let token = TokenRepo::new(&state.pool).issue(user.id).await?;
    tracing::info!(user_id = %user.id, "login");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// POST /api/auth/logout - revoke the presented token
async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    TokenRepo::new(&state.pool).revoke(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}
