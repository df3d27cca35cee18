//! Ticket endpoints
//!
//! Tickets outside the caller's visibility are reported as 404. Every
//! write re-checks the policy against the freshly loaded row and is
//! guarded on the status it was checked against.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use helpdesk_core::lifecycle::resolution_stamp;
use helpdesk_core::models::{TicketDescription, TicketTitle};
use helpdesk_core::policy::{
    can_assign, can_be_assigned, can_change_status, can_delete_ticket, can_edit_ticket,
    can_view_ticket,
};
use helpdesk_core::{
    Actor, EscalationPolicy, Paginated, Pagination, PaginationParams, Priority, TicketScope,
    TicketStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, non_empty};
use crate::db::repos::{
    CommentRecord, CommentRepo, DbError, StatusChange, TicketChanges, TicketFilter, TicketOrdering,
    TicketRecord, TicketRepo, UserRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{parse_uuid, ApiJson, ApiQuery, AuthUser, ValidUuid};
use crate::state::AppState;

/// Ticket response
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub assigned_to: Option<Uuid>,
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub escalation_date: Option<DateTime<Utc>>,
    /// When the ticket escalates without further activity
    pub escalates_at: Option<DateTime<Utc>>,
}

impl TicketResponse {
    pub fn new(t: TicketRecord, policy: &EscalationPolicy) -> Self {
        Self {
            escalates_at: policy.due_at(t.status, t.priority, t.updated_at),
            id: t.id,
            title: t.title,
            description: t.description,
            priority: t.priority,
            status: t.status,
            created_by: t.created_by,
            created_by_name: t.created_by_name,
            assigned_to: t.assigned_to,
            assigned_to_name: t.assigned_to_name,
            created_at: t.created_at,
            updated_at: t.updated_at,
            resolved_at: t.resolved_at,
            escalation_date: t.escalation_date,
        }
    }
}

/// Ticket detail: the ticket plus its comment thread
#[derive(Debug, Serialize)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl TicketQuery {
    fn into_filter(self) -> Result<TicketFilter, ApiError> {
        Ok(TicketFilter {
            status: non_empty(self.status)
                .map(|s| s.parse::<TicketStatus>())
                .transpose()?,
            priority: non_empty(self.priority)
                .map(|p| p.parse::<Priority>())
                .transpose()?,
            assigned_to: non_empty(self.assigned_to)
                .map(|a| parse_uuid("assigned_to", a.trim()))
                .transpose()?,
            search: non_empty(self.search),
            ordering: non_empty(self.ordering)
                .map(|o| o.parse::<TicketOrdering>())
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TicketStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

/// Load a ticket, hiding it from callers who may not see it.
pub(crate) async fn visible_ticket(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> Result<TicketRecord, ApiError> {
    let ticket = TicketRepo::new(&state.pool).get(id).await?;
    if !can_view_ticket(actor, &ticket.ownership()) {
        return Err(ApiError::not_found("ticket", id));
    }
    Ok(ticket)
}

fn status_change(
    actor: &Actor,
    ticket: &TicketRecord,
    next: TicketStatus,
) -> Result<StatusChange, ApiError> {
    if !can_change_status(actor, &ticket.ownership()) {
        return Err(ApiError::forbidden(
            "only agents and admins can change ticket status",
        ));
    }
    let status = ticket.status.transition_to(next)?;
    Ok(StatusChange {
        status,
        resolved_at: resolution_stamp(status, ticket.resolved_at, Utc::now()),
    })
}

/// Validate a new assignee; `None` unassigns.
async fn assignment(
    state: &AppState,
    actor: &Actor,
    ticket: &TicketRecord,
    assignee: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    if !can_assign(actor, &ticket.ownership()) {
        return Err(ApiError::forbidden("only agents and admins can assign tickets"));
    }
    let Some(assignee_id) = assignee else {
        return Ok(None);
    };

    let user = match UserRepo::new(&state.pool).get(assignee_id).await {
        Ok(user) => user,
        Err(DbError::NotFound { .. }) => {
            return Err(ApiError::invalid(format!("user '{}' does not exist", assignee_id)))
        }
        Err(e) => return Err(e.into()),
    };
    if !can_be_assigned(user.role) {
        return Err(ApiError::invalid(
            "tickets can only be assigned to agents or admins",
        ));
    }
    Ok(Some(user.id))
}

async fn apply(
    state: &AppState,
    ticket: &TicketRecord,
    changes: TicketChanges,
) -> Result<Json<TicketResponse>, ApiError> {
    let updated = TicketRepo::new(&state.pool)
        .update(ticket.id, ticket.status, changes)
        .await?;
    Ok(Json(TicketResponse::new(updated, &state.policy)))
}

/// GET /api/tickets - visible tickets, filtered and paged
async fn list_tickets(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<TicketQuery>,
    ApiQuery(paging): ApiQuery<PaginationParams>,
) -> Result<Json<Paginated<TicketResponse>>, ApiError> {
    let filter = query.into_filter()?;
    let page = Pagination::from(paging);
    let scope = TicketScope::for_actor(&auth.actor());

    let tickets = TicketRepo::new(&state.pool).list(scope, &filter, page).await?;
    Ok(Json(tickets.map(|t| TicketResponse::new(t, &state.policy))))
}

/// POST /api/tickets - anyone signed in may open a ticket
async fn create_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let title = TicketTitle::new(&req.title)?;
    let description = TicketDescription::new(&req.description)?;

    let ticket = TicketRepo::new(&state.pool)
        .create(auth.user.id, title, description, req.priority)
        .await?;

    tracing::info!(ticket_id = %ticket.id, priority = %ticket.priority, "ticket created");
    Ok((
        StatusCode::CREATED,
        Json(TicketResponse::new(ticket, &state.policy)),
    ))
}

/// GET /api/tickets/{id} - detail with comments
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<TicketDetailResponse>, ApiError> {
    let ticket = visible_ticket(&state, &auth.actor(), id).await?;
    let comments = CommentRepo::new(&state.pool).list_for_ticket(id).await?;

    Ok(Json(TicketDetailResponse {
        ticket: TicketResponse::new(ticket, &state.policy),
        comments,
    }))
}

/// PATCH /api/tickets/{id}
async fn update_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<UpdateTicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = auth.actor();
    let ticket = visible_ticket(&state, &actor, id).await?;

    let edits_content = req.title.is_some() || req.description.is_some() || req.priority.is_some();
    if edits_content && !can_edit_ticket(&actor, &ticket.ownership()) {
        return Err(ApiError::forbidden("you cannot edit this ticket"));
    }

    let mut changes = TicketChanges {
        title: req.title.as_deref().map(TicketTitle::new).transpose()?,
        description: req.description.as_deref().map(TicketDescription::new).transpose()?,
        priority: req.priority,
        ..TicketChanges::default()
    };
    if let Some(next) = req.status {
        changes.status = Some(status_change(&actor, &ticket, next)?);
    }
    if let Some(assignee) = req.assigned_to {
        changes.assigned_to = Some(assignment(&state, &actor, &ticket, assignee).await?);
    }

    apply(&state, &ticket, changes).await
}

/// DELETE /api/tickets/{id} - admin only
async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    let actor = auth.actor();
    visible_ticket(&state, &actor, id).await?;
    if !can_delete_ticket(&actor) {
        return Err(ApiError::forbidden("only admins can delete tickets"));
    }

    TicketRepo::new(&state.pool).delete(id).await?;
    tracing::info!(ticket_id = %id, by = %actor.id, "ticket deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tickets/{id}/assign - `{"assigned_to": uuid | null}`
async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<AssignRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = auth.actor();
    let ticket = visible_ticket(&state, &actor, id).await?;
    let Some(assignee) = req.assigned_to else {
        return Err(ApiError::invalid("assigned_to is required (use null to unassign)"));
    };

    let changes = TicketChanges {
        assigned_to: Some(assignment(&state, &actor, &ticket, assignee).await?),
        ..TicketChanges::default()
    };
    apply(&state, &ticket, changes).await
}

/// POST /api/tickets/{id}/status - `{"status": ...}`
async fn change_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = auth.actor();
    let ticket = visible_ticket(&state, &actor, id).await?;

    let changes = TicketChanges {
        status: Some(status_change(&actor, &ticket, req.status)?),
        ..TicketChanges::default()
    };
    let response = apply(&state, &ticket, changes).await?;
    tracing::info!(
        ticket_id = %id,
        from = %ticket.status,
        to = %req.status,
        "ticket status changed"
    );
    Ok(response)
}

/// Ticket routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/tickets/{id}",
            get(get_ticket).patch(update_ticket).delete(delete_ticket),
        )
        .route("/api/tickets/{id}/assign", post(assign_ticket))
        .route("/api/tickets/{id}/status", post(change_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parses_filters() {
        let assignee = Uuid::new_v4();
        let query = TicketQuery {
            status: Some("in_progress".into()),
            priority: Some("high".into()),
            assigned_to: Some(assignee.to_string()),
            ordering: Some("-priority".into()),
            ..TicketQuery::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.status, Some(TicketStatus::InProgress));
        assert_eq!(filter.priority, Some(Priority::High));
        assert_eq!(filter.assigned_to, Some(assignee));
        assert!(filter.ordering.descending);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let query = TicketQuery {
            status: Some(String::new()),
            ..TicketQuery::default()
        };
        let filter = query.into_filter().unwrap();
        assert!(filter.status.is_none());
    }

    #[test]
    fn bad_filters_are_validation_errors() {
        let bad_status = TicketQuery {
            status: Some("pending".into()),
            ..TicketQuery::default()
        };
        assert!(matches!(bad_status.into_filter(), Err(ApiError::Validation(_))));

        let bad_assignee = TicketQuery {
            assigned_to: Some("bob".into()),
            ..TicketQuery::default()
        };
        assert!(matches!(bad_assignee.into_filter(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn priority_defaults_to_medium() {
        let req: CreateTicketRequest =
            serde_json::from_str(r#"{"title":"t","description":"d"}"#).unwrap();
        assert_eq!(req.priority, Priority::Medium);
    }

    #[test]
    fn escalates_at_only_for_active_tickets() {
        let policy = EscalationPolicy::default();
        let now = Utc::now();
        let record = |status| TicketRecord {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            priority: Priority::High,
            status,
            created_by: Uuid::new_v4(),
            created_by_name: "c".into(),
            assigned_to: None,
            assigned_to_name: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            escalation_date: None,
        };

        let open = TicketResponse::new(record(TicketStatus::Open), &policy);
        assert_eq!(open.escalates_at, Some(now + chrono::Duration::hours(1)));

        let resolved = TicketResponse::new(record(TicketStatus::Resolved), &policy);
        assert!(resolved.escalates_at.is_none());
    }
}
