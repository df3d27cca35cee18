//! Liveness and readiness
//!
//! `/health` answers whenever the process is serving. `/health/ready` also
//! round-trips to Postgres, so a load balancer can hold traffic until the
//! database is reachable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use helpdesk_core::Priority;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "unavailable"
    pub status: &'static str,
    pub database: DatabaseCheck,
    /// Hours without activity before a ticket of each priority escalates
    pub escalation_hours: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseCheck {
    pub reachable: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/ready - 503 while the database is unreachable
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let started = Instant::now();
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => DatabaseCheck {
            reachable: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "readiness check: database unreachable");
            DatabaseCheck {
                reachable: false,
                latency_ms: None,
            }
        }
    };

    let escalation_hours = Priority::ALL
        .iter()
        .map(|p| (p.as_str(), state.policy.threshold(*p).num_hours()))
        .collect();

    let (code, status) = if database.reachable {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (
        code,
        Json(ReadinessResponse {
            status,
            database,
            escalation_hours,
        }),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use helpdesk_core::EscalationPolicy;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt as _;

    #[tokio::test]
    async fn health_reports_version() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn not_ready_without_database() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(250))
            .connect_lazy("postgres://localhost/helpdesk_unused")
            .unwrap();
        let policy = EscalationPolicy::from_hours(2, 8, 48).unwrap();
        let app = router().with_state(Arc::new(AppState::new(pool, policy)));

        let response = app
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["database"]["reachable"], false);
        assert_eq!(body["escalation_hours"]["high"], 2);
        assert_eq!(body["escalation_hours"]["low"], 48);
    }
}
