//! Ticket comment endpoints
//!
//! Comment access follows ticket visibility; editing and deleting are
//! limited to the author and admins.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use helpdesk_core::models::CommentContent;
use helpdesk_core::policy::{can_comment, can_edit_comment};
use serde::Deserialize;

use super::tickets::visible_ticket;
use crate::db::repos::{CommentRecord, CommentRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, TicketCommentPath, ValidUuid};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// GET /api/tickets/{id}/comments
async fn list_comments(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(ticket_id): ValidUuid,
) -> Result<Json<Vec<CommentRecord>>, ApiError> {
    visible_ticket(&state, &auth.actor(), ticket_id).await?;
    let comments = CommentRepo::new(&state.pool).list_for_ticket(ticket_id).await?;
    Ok(Json(comments))
}

/// POST /api/tickets/{id}/comments (also `/add_comment`)
///
/// Counts as activity: the ticket's escalation clock restarts.
async fn add_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(ticket_id): ValidUuid,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentRecord>), ApiError> {
    let actor = auth.actor();
    let ticket = visible_ticket(&state, &actor, ticket_id).await?;
    if !can_comment(&actor, &ticket.ownership()) {
        return Err(ApiError::forbidden("you cannot comment on this ticket"));
    }
    let content = CommentContent::new(&req.content)?;

    let comment = CommentRepo::new(&state.pool)
        .create(ticket_id, actor.id, content)
        .await?;
    tracing::debug!(ticket_id = %ticket_id, comment_id = %comment.id, "comment added");
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/tickets/{id}/comments/{comment_id}
async fn get_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: TicketCommentPath,
) -> Result<Json<CommentRecord>, ApiError> {
    visible_ticket(&state, &auth.actor(), path.ticket_id).await?;
    let comment = CommentRepo::new(&state.pool)
        .get(path.ticket_id, path.comment_id)
        .await?;
    Ok(Json(comment))
}

/// PATCH /api/tickets/{id}/comments/{comment_id}
async fn update_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: TicketCommentPath,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<Json<CommentRecord>, ApiError> {
    let actor = auth.actor();
    visible_ticket(&state, &actor, path.ticket_id).await?;

    let repo = CommentRepo::new(&state.pool);
    let comment = repo.get(path.ticket_id, path.comment_id).await?;
    if !can_edit_comment(&actor, comment.user_id) {
        return Err(ApiError::forbidden("you can only edit your own comments"));
    }

    let content = CommentContent::new(&req.content)?;
    Ok(Json(repo.update(comment.id, content).await?))
}

/// DELETE /api/tickets/{id}/comments/{comment_id}
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: TicketCommentPath,
) -> Result<StatusCode, ApiError> {
    let actor = auth.actor();
    visible_ticket(&state, &actor, path.ticket_id).await?;

    let repo = CommentRepo::new(&state.pool);
    let comment = repo.get(path.ticket_id, path.comment_id).await?;
    if !can_edit_comment(&actor, comment.user_id) {
        return Err(ApiError::forbidden("you can only delete your own comments"));
    }

    repo.delete(comment.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Comment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/tickets/{id}/add_comment", post(add_comment))
        .route(
            "/api/tickets/{id}/comments/{comment_id}",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
}
