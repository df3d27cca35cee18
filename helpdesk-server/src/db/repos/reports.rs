//! Aggregate queries behind `/api/reports/`
//!
//! Every report takes its reference time as a parameter so windows are
//! reproducible; windows are half-open `[start, end)`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use helpdesk_core::reports::{percentage, secs_to_hours};
use helpdesk_core::{ActivitySummary, Priority, TicketStatus};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{display_name_sql, DbError};

/// Window used by the trend and performance reports
pub const TREND_DAYS: i64 = 30;

/// Window used by the activity and weekly reports
pub const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyStats {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_tickets: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_priority: BTreeMap<&'static str, i64>,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub created: i64,
    pub resolved: i64,
    pub escalated: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentPerformance {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub username: String,
    pub assigned: i64,
    pub resolved: i64,
    pub escalated: i64,
    pub resolution_rate: f64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityMetrics {
    pub priority: Priority,
    pub total: i64,
    pub resolved: i64,
    pub escalated: i64,
    pub resolution_rate: f64,
    pub escalation_rate: f64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusShare {
    pub status: TicketStatus,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusDistribution {
    pub total: i64,
    pub statuses: Vec<StatusShare>,
}

/// Time from ticket creation to its first comment
#[derive(Debug, Clone, Serialize)]
pub struct ResponseTimeMetrics {
    pub period_days: i64,
    pub tickets_with_response: i64,
    pub avg_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomRangeReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(flatten)]
    pub activity: ActivitySummary,
    pub by_priority: BTreeMap<&'static str, i64>,
}

#[derive(FromRow)]
struct AgentRow {
    agent_id: Uuid,
    agent_name: String,
    username: String,
    assigned: i64,
    resolved: i64,
    escalated: i64,
    avg_resolution_secs: Option<f64>,
}

#[derive(FromRow)]
struct PriorityRow {
    #[sqlx(try_from = "String")]
    priority: Priority,
    total: i64,
    resolved: i64,
    escalated: i64,
    avg_resolution_secs: Option<f64>,
}

/// Count rows keyed by every variant, zero-filled.
fn zero_filled<K>(
    keys: &[K],
    label: fn(&K) -> &'static str,
    rows: impl IntoIterator<Item = (K, i64)>,
) -> BTreeMap<&'static str, i64> {
    let mut map: BTreeMap<&'static str, i64> = keys.iter().map(|k| (label(k), 0)).collect();
    for (key, count) in rows {
        *map.entry(label(&key)).or_insert(0) += count;
    }
    map
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Report repository
pub struct ReportRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Opened, resolved and escalated counts in `[start, end)`.
    pub async fn activity(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ActivitySummary, DbError> {
        let (opened, resolved, escalated): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2),
                COUNT(*) FILTER (WHERE resolved_at >= $1 AND resolved_at < $2),
                COUNT(*) FILTER (WHERE escalation_date >= $1 AND escalation_date < $2)
            FROM tickets
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool)
        .await?;

        Ok(ActivitySummary {
            opened,
            resolved,
            escalated,
        })
    }

    /// Rolling seven days ending at `now`.
    pub async fn last_7_days(&self, now: DateTime<Utc>) -> Result<ActivitySummary, DbError> {
        self.activity(now - Duration::days(WEEK_DAYS), now).await
    }

    pub async fn weekly_stats(&self, now: DateTime<Utc>) -> Result<WeeklyStats, DbError> {
        let start = now - Duration::days(WEEK_DAYS);

        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT status, priority, COUNT(*)
            FROM tickets
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY status, priority
            "#,
        )
        .bind(start)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        let mut statuses = Vec::with_capacity(rows.len());
        let mut priorities = Vec::with_capacity(rows.len());
        for (status, priority, count) in rows {
            // CHECK constraints keep both columns within the enums
            if let Ok(status) = status.parse::<TicketStatus>() {
                statuses.push((status, count));
            }
            if let Ok(priority) = priority.parse::<Priority>() {
                priorities.push((priority, count));
            }
        }

        let total: i64 = statuses.iter().map(|(_, c)| c).sum();
        let done: i64 = statuses
            .iter()
            .filter(|(s, _)| matches!(s, TicketStatus::Resolved | TicketStatus::Closed))
            .map(|(_, c)| c)
            .sum();

        Ok(WeeklyStats {
            period_start: start,
            period_end: now,
            total_tickets: total,
            by_status: zero_filled(&TicketStatus::ALL, TicketStatus::as_str, statuses),
            by_priority: zero_filled(&Priority::ALL, Priority::as_str, priorities),
            resolution_rate: percentage(done, total),
        })
    }

    /// One row per UTC day for the last thirty days, oldest first, including
    /// days with no activity.
    pub async fn daily_trends(&self, now: DateTime<Utc>) -> Result<Vec<DailyTrend>, DbError> {
        let start = now - Duration::days(TREND_DAYS - 1);

        let trends = sqlx::query_as::<_, DailyTrend>(
            r#"
            WITH days AS (
                SELECT generate_series(
                    ($1 AT TIME ZONE 'UTC')::date,
                    ($2 AT TIME ZONE 'UTC')::date,
                    interval '1 day'
                )::date AS day
            )
            SELECT
                d.day AS date,
                (SELECT COUNT(*) FROM tickets t
                  WHERE (t.created_at AT TIME ZONE 'UTC')::date = d.day) AS created,
                (SELECT COUNT(*) FROM tickets t
                  WHERE t.status IN ('resolved', 'closed')
                    AND (t.resolved_at AT TIME ZONE 'UTC')::date = d.day) AS resolved,
                (SELECT COUNT(*) FROM tickets t
                  WHERE (t.escalation_date AT TIME ZONE 'UTC')::date = d.day) AS escalated
            FROM days d
            ORDER BY d.day
            "#,
        )
        .bind(start)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(trends)
    }

    /// Per-agent metrics over tickets created in the last thirty days.
    pub async fn agent_performance(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AgentPerformance>, DbError> {
        let sql = format!(
            r#"
            SELECT
                u.id AS agent_id,
                {name} AS agent_name,
                u.username,
                COUNT(t.id) AS assigned,
                COUNT(t.id) FILTER (WHERE t.status IN ('resolved', 'closed')) AS resolved,
                COUNT(t.id) FILTER (WHERE t.escalation_date IS NOT NULL) AS escalated,
                AVG(EXTRACT(EPOCH FROM (t.resolved_at - t.created_at)))::float8
                    AS avg_resolution_secs
            FROM users u
            LEFT JOIN tickets t
              ON t.assigned_to = u.id AND t.created_at >= $1 AND t.created_at < $2
            WHERE u.role = 'agent'
            GROUP BY u.id
            ORDER BY assigned DESC, u.username
            "#,
            name = display_name_sql("u"),
        );

        let rows = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(now - Duration::days(TREND_DAYS))
            .bind(now)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| AgentPerformance {
                resolution_rate: percentage(r.resolved, r.assigned),
                avg_resolution_hours: secs_to_hours(r.avg_resolution_secs),
                agent_id: r.agent_id,
                agent_name: r.agent_name,
                username: r.username,
                assigned: r.assigned,
                resolved: r.resolved,
                escalated: r.escalated,
            })
            .collect())
    }

    /// Metrics per priority, highest first, zero-filled.
    pub async fn priority_analysis(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PriorityMetrics>, DbError> {
        let rows = sqlx::query_as::<_, PriorityRow>(
            r#"
            SELECT
                priority,
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status IN ('resolved', 'closed')) AS resolved,
                COUNT(*) FILTER (WHERE escalation_date IS NOT NULL) AS escalated,
                AVG(EXTRACT(EPOCH FROM (resolved_at - created_at)))::float8
                    AS avg_resolution_secs
            FROM tickets
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY priority
            "#,
        )
        .bind(now - Duration::days(TREND_DAYS))
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(Priority::ALL
            .iter()
            .map(|&priority| match rows.iter().find(|r| r.priority == priority) {
                Some(r) => PriorityMetrics {
                    priority,
                    total: r.total,
                    resolved: r.resolved,
                    escalated: r.escalated,
                    resolution_rate: percentage(r.resolved, r.total),
                    escalation_rate: percentage(r.escalated, r.total),
                    avg_resolution_hours: secs_to_hours(r.avg_resolution_secs),
                },
                None => PriorityMetrics {
                    priority,
                    total: 0,
                    resolved: 0,
                    escalated: 0,
                    resolution_rate: 0.0,
                    escalation_rate: 0.0,
                    avg_resolution_hours: 0.0,
                },
            })
            .collect())
    }

    /// Current count and share of every status across all tickets.
    pub async fn status_distribution(&self) -> Result<StatusDistribution, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tickets GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let total: i64 = rows.iter().map(|(_, c)| c).sum();
        let statuses = TicketStatus::ALL
            .iter()
            .map(|&status| {
                let count = rows
                    .iter()
                    .find(|(s, _)| s == status.as_str())
                    .map(|(_, c)| *c)
                    .unwrap_or(0);
                StatusShare {
                    status,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        Ok(StatusDistribution { total, statuses })
    }

    pub async fn response_time_metrics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ResponseTimeMetrics, DbError> {
        let (responded, avg, min, max): (i64, Option<f64>, Option<f64>, Option<f64>) =
            sqlx::query_as(
                r#"
                WITH first_response AS (
                    SELECT EXTRACT(EPOCH FROM (MIN(c.created_at) - t.created_at))::float8 AS secs
                    FROM tickets t
                    JOIN comments c ON c.ticket_id = t.id
                    WHERE t.created_at >= $1 AND t.created_at < $2
                    GROUP BY t.id, t.created_at
                )
                SELECT COUNT(*), AVG(secs), MIN(secs), MAX(secs)
                FROM first_response
                "#,
            )
            .bind(now - Duration::days(TREND_DAYS))
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(ResponseTimeMetrics {
            period_days: TREND_DAYS,
            tickets_with_response: responded,
            avg_hours: secs_to_hours(avg),
            min_hours: secs_to_hours(min),
            max_hours: secs_to_hours(max),
        })
    }

    /// Activity between two calendar days, both inclusive.
    pub async fn custom_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<CustomRangeReport, DbError> {
        let start = day_start(start_date);
        let end = day_start(end_date) + Duration::days(1);

        let activity = self.activity(start, end).await?;

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT priority, COUNT(*)
            FROM tickets
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY priority
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        let priorities = rows
            .into_iter()
            .filter_map(|(p, c)| p.parse::<Priority>().ok().map(|p| (p, c)));

        Ok(CustomRangeReport {
            start_date,
            end_date,
            activity,
            by_priority: zero_filled(&Priority::ALL, Priority::as_str, priorities),
        })
    }
}
