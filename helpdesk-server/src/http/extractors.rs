//! Custom Axum extractors
//!
//! Rejections are `ApiError`s so malformed input still gets the JSON error
//! body instead of axum's plain-text one.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use helpdesk_core::{Actor, ValidationError};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;
use crate::auth::parse_authorization;
use crate::db::repos::{TokenRepo, UserRecord};
use crate::state::AppState;

/// The caller, resolved from `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRecord,
    pub token: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        self.user.actor()
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Header problems are rejected before any database access
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_authorization)
            .ok_or(ApiError::Unauthorized)?
            .to_owned();

        let user = TokenRepo::new(&state.pool)
            .authenticate(&token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self { user, token })
    }
}

pub(crate) fn parse_uuid(field: &'static str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::Validation(ValidationError::InvalidFormat {
            field,
            reason: "invalid UUID format",
        })
    })
}

/// Extract and validate a UUID from a single-segment path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        Ok(Self(parse_uuid("id", &id)?))
    }
}

/// `/{id}/comments/{comment_id}` path pair
pub struct TicketCommentPath {
    pub ticket_id: Uuid,
    pub comment_id: Uuid,
}

impl<S> FromRequestParts<S> for TicketCommentPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((ticket, comment)): Path<(String, String)> =
            Path::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        Ok(Self {
            ticket_id: parse_uuid("id", &ticket)?,
            comment_id: parse_uuid("comment_id", &comment)?,
        })
    }
}

/// `Json<T>` with a JSON error body on malformed input
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::invalid(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query<T>` with a JSON error body on malformed input
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::invalid(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_uuid("id", "nope"),
            Err(ApiError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }
}
