//! Escalation policy
//!
//! A ticket escalates when it has gone longer than its priority's threshold
//! without an update and is still being worked (open or in progress).
//! The rule lives here once; the server runs it in SQL via
//! [`EscalationPolicy::cutoffs`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{Priority, TicketStatus};

/// Largest accepted threshold, one hundred years.
pub const MAX_THRESHOLD_HOURS: u32 = 24 * 365 * 100;

/// Per-priority time without updates before a ticket escalates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub high: Duration,
    pub medium: Duration,
    pub low: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            high: Duration::hours(1),
            medium: Duration::hours(4),
            low: Duration::hours(24),
        }
    }
}

impl EscalationPolicy {
    /// Build from hour counts in `1..=MAX_THRESHOLD_HOURS`.
    pub fn from_hours(high: u32, medium: u32, low: u32) -> Result<Self> {
        for (name, hours) in [("high", high), ("medium", medium), ("low", low)] {
            if hours == 0 {
                return Err(CoreError::config(format!(
                    "escalation.{}_hours must be at least 1",
                    name
                )));
            }
            if hours > MAX_THRESHOLD_HOURS {
                return Err(CoreError::config(format!(
                    "escalation.{}_hours must be at most {}",
                    name, MAX_THRESHOLD_HOURS
                )));
            }
        }
        Ok(Self {
            high: Duration::hours(high as i64),
            medium: Duration::hours(medium as i64),
            low: Duration::hours(low as i64),
        })
    }

    pub fn threshold(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    /// Strictly more than the threshold must have elapsed.
    pub fn is_due(
        &self,
        status: TicketStatus,
        priority: Priority,
        updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        status.is_escalatable() && now - updated_at > self.threshold(priority)
    }

    /// When a ticket with this priority will become due, if it can.
    /// `None` as well when the instant is past the representable range.
    pub fn due_at(
        &self,
        status: TicketStatus,
        priority: Priority,
        updated_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if !status.is_escalatable() {
            return None;
        }
        updated_at.checked_add_signed(self.threshold(priority))
    }

    /// `updated_at` bounds: a ticket is due iff `updated_at < cutoff` for its priority.
    ///
    /// A cutoff before the earliest representable instant saturates there,
    /// so nothing with that priority is due.
    pub fn cutoffs(&self, now: DateTime<Utc>) -> EscalationCutoffs {
        let bound = |threshold: Duration| {
            now.checked_sub_signed(threshold)
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        };
        EscalationCutoffs {
            high: bound(self.high),
            medium: bound(self.medium),
            low: bound(self.low),
        }
    }
}

/// Per-priority `updated_at` cutoffs for one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationCutoffs {
    pub high: DateTime<Utc>,
    pub medium: DateTime<Utc>,
    pub low: DateTime<Utc>,
}

impl EscalationCutoffs {
    pub fn for_priority(&self, priority: Priority) -> DateTime<Utc> {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}
