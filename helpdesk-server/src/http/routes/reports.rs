//! Reporting endpoints (admin only)

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{NaiveDate, Utc};
use helpdesk_core::policy::can_view_reports;
use helpdesk_core::ActivitySummary;
use serde::Deserialize;

use super::non_empty;
use crate::db::repos::reports::{
    AgentPerformance, CustomRangeReport, DailyTrend, PriorityMetrics, ResponseTimeMetrics,
    StatusDistribution, WeeklyStats,
};
use crate::db::repos::ReportRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiQuery, AuthUser};
use crate::state::AppState;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if can_view_reports(&auth.actor()) {
        Ok(())
    } else {
        Err(ApiError::forbidden("reports are available to admins only"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRangeQuery {
    fn parse(self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let (Some(start), Some(end)) = (non_empty(self.start_date), non_empty(self.end_date))
        else {
            return Err(ApiError::invalid("start_date and end_date are required"));
        };
        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map_err(|_| ApiError::invalid("Invalid date format. Use YYYY-MM-DD"))
        };
        let (start, end) = (parse(&start)?, parse(&end)?);
        if start > end {
            return Err(ApiError::invalid("start_date must not be after end_date"));
        }
        Ok((start, end))
    }
}

/// GET /api/reports/last7days
async fn last_7_days(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ActivitySummary>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(ReportRepo::new(&state.pool).last_7_days(Utc::now()).await?))
}

async fn weekly_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<WeeklyStats>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(ReportRepo::new(&state.pool).weekly_stats(Utc::now()).await?))
}

async fn daily_trends(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<DailyTrend>>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(ReportRepo::new(&state.pool).daily_trends(Utc::now()).await?))
}

async fn agent_performance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<AgentPerformance>>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(
        ReportRepo::new(&state.pool)
            .agent_performance(Utc::now())
            .await?,
    ))
}

async fn priority_analysis(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<PriorityMetrics>>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(
        ReportRepo::new(&state.pool)
            .priority_analysis(Utc::now())
            .await?,
    ))
}

async fn status_distribution(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<StatusDistribution>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(ReportRepo::new(&state.pool).status_distribution().await?))
}

async fn response_time_metrics(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ResponseTimeMetrics>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(
        ReportRepo::new(&state.pool)
            .response_time_metrics(Utc::now())
            .await?,
    ))
}

/// GET /api/reports/custom_time_range?start_date=&end_date=
async fn custom_time_range(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<DateRangeQuery>,
) -> Result<Json<CustomRangeReport>, ApiError> {
    require_admin(&auth)?;
    let (start, end) = query.parse()?;
    Ok(Json(ReportRepo::new(&state.pool).custom_range(start, end).await?))
}

/// Report routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/last7days", get(last_7_days))
        .route("/api/reports/weekly_stats", get(weekly_stats))
        .route("/api/reports/daily_trends", get(daily_trends))
        .route("/api/reports/agent_performance", get(agent_performance))
        .route("/api/reports/priority_analysis", get(priority_analysis))
        .route("/api/reports/status_distribution", get(status_distribution))
        .route("/api/reports/response_time_metrics", get(response_time_metrics))
        .route("/api/reports/custom_time_range", get(custom_time_range))
}
