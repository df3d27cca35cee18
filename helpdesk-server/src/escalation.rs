//! Periodic escalation of stale tickets
//!
//! Each sweep escalates every due ticket in one statement, then sends one
//! notice per ticket. Due-ness is judged on the database clock. Delivery failures are logged and never undo an
//! escalation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use helpdesk_core::EscalationPolicy;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::db::repos::{DbError, DueTickets, EscalatedTicket, EscalationRepo};
use crate::mail::{escalation_notice, Mailer};

/// Outcome of one sweep
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Database time the sweep was evaluated at
    pub as_of: DateTime<Utc>,
    pub escalated: Vec<EscalatedTicket>,
    pub notified: usize,
    pub notify_failures: usize,
}

/// Escalates due tickets and notifies the people involved
#[derive(Clone)]
pub struct EscalationService {
    pool: PgPool,
    policy: EscalationPolicy,
    mailer: Arc<dyn Mailer>,
    admin_recipients: Vec<String>,
}

impl EscalationService {
    pub fn new(
        pool: PgPool,
        policy: EscalationPolicy,
        mailer: Arc<dyn Mailer>,
        admin_recipients: Vec<String>,
    ) -> Self {
        Self {
            pool,
            policy,
            mailer,
            admin_recipients,
        }
    }

    /// Escalate everything that is due now.
    pub async fn sweep(&self) -> Result<SweepReport, DbError> {
        let DueTickets { as_of, tickets } = EscalationRepo::new(&self.pool)
            .escalate_due(&self.policy)
            .await?;

        let mut notified = 0;
        let mut notify_failures = 0;
        for ticket in &tickets {
            tracing::info!(
                ticket_id = %ticket.id,
                priority = ticket.priority.as_str(),
                previous_status = ticket.previous_status.as_str(),
                "ticket escalated"
            );

            let Some(notice) = escalation_notice(ticket, &self.admin_recipients) else {
                continue;
            };
            match self.mailer.send(&notice).await {
                Ok(()) => notified += 1,
                Err(e) => {
                    notify_failures += 1;
                    tracing::warn!(ticket_id = %ticket.id, error = %e, "escalation notice failed");
                }
            }
        }

        Ok(SweepReport {
            as_of,
            escalated: tickets,
            notified,
            notify_failures,
        })
    }

    /// Tickets a sweep would escalate right now.
    pub async fn preview(&self) -> Result<Vec<EscalatedTicket>, DbError> {
        let due = EscalationRepo::new(&self.pool)
            .preview_due(&self.policy)
            .await?;
        Ok(due.tickets)
    }
}

/// Sweep every `interval` until `shutdown` flips to true.
///
/// The first sweep runs immediately. Ticks missed during a slow sweep are
/// dropped rather than replayed.
pub async fn run_worker(
    service: EscalationService,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "escalation worker started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.sweep().await {
                    Ok(report) if !report.escalated.is_empty() => {
                        tracing::info!(
                            escalated = report.escalated.len(),
                            notified = report.notified,
                            failures = report.notify_failures,
                            "escalation sweep finished"
                        );
                    }
                    Ok(_) => tracing::debug!("escalation sweep: nothing due"),
                    Err(e) => tracing::error!(error = %e, "escalation sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("escalation worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_service() -> EscalationService {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(250))
            .connect_lazy("postgres://localhost/helpdesk_unused")
            .unwrap();
        EscalationService::new(
            pool,
            EscalationPolicy::default(),
            Arc::new(MemoryMailer::default()),
            vec![],
        )
    }

    #[tokio::test]
    async fn worker_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        // The immediate first sweep fails fast against the unreachable pool.
        let handle = tokio::spawn(run_worker(lazy_service(), Duration::from_secs(3600), rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn worker_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(lazy_service(), Duration::from_secs(3600), rx));
        drop(tx);
        tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
