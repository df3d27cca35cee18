//! Ticket status lifecycle
//!
//! Manual transitions (made by agents and admins through the API) follow a
//! fixed table. `escalated` is never a manual target: only the escalation
//! sweep moves a ticket there, and an escalated ticket can be worked
//! (in_progress / resolved / closed) but never goes back to `open`.

use chrono::{DateTime, Utc};

use crate::models::{TicketStatus, ValidationError};

impl TicketStatus {
    /// Resolved and closed tickets are done with; they never escalate.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    /// Statuses the escalation sweep may move to `escalated`.
    pub fn is_escalatable(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }

    /// Whether a manual status change from `self` to `next` is allowed.
    ///
    /// Same-status updates are no-ops and always allowed.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;

        if *self == next {
            return true;
        }
        match (*self, next) {
            (_, Escalated) => false,
            (Open, InProgress | Resolved | Closed) => true,
            (InProgress, Open | Resolved | Closed) => true,
            (Resolved, Open | InProgress | Closed) => true,
            (Closed, Open) => true,
            (Escalated, InProgress | Resolved | Closed) => true,
            _ => false,
        }
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but with an error
    /// suitable for a 400 response.
    pub fn transition_to(&self, next: TicketStatus) -> Result<TicketStatus, ValidationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else if next == TicketStatus::Escalated {
            Err(ValidationError::rule(
                "tickets are escalated automatically and cannot be set to escalated",
            ))
        } else {
            Err(ValidationError::rule(format!(
                "cannot change status from {} to {}",
                self, next
            )))
        }
    }
}

/// New `resolved_at` after a status change.
///
/// Stamped on the first move into resolved/closed, kept while the ticket
/// stays terminal, cleared when it is reopened.
pub fn resolution_stamp(
    next: TicketStatus,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if next.is_terminal() {
        Some(existing.unwrap_or(now))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use TicketStatus::*;

    #[test]
    fn escalated_is_never_a_manual_target() {
        for from in TicketStatus::ALL {
            if from != Escalated {
                assert!(!from.can_transition_to(Escalated), "{from} -> escalated");
            }
        }
        let err = Open.transition_to(Escalated).unwrap_err();
        assert!(err.to_string().contains("automatically"));
    }

    #[test]
    fn escalated_never_reopens() {
        assert!(!Escalated.can_transition_to(Open));
        assert!(Escalated.can_transition_to(InProgress));
        assert!(Escalated.can_transition_to(Resolved));
        assert!(Escalated.can_transition_to(Closed));
    }

    #[test]
    fn closed_only_reopens() {
        assert!(Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(InProgress));
        assert!(!Closed.can_transition_to(Resolved));
    }

    #[test]
    fn same_status_is_noop() {
        for s in TicketStatus::ALL {
            assert!(s.can_transition_to(s));
        }
    }

    #[test]
    fn only_open_and_in_progress_escalate() {
        let escalatable: Vec<_> = TicketStatus::ALL
            .into_iter()
            .filter(|s| s.is_escalatable())
            .collect();
        assert_eq!(escalatable, vec![Open, InProgress]);
    }

    #[test]
    fn resolution_stamp_lifecycle() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(2);

        let stamped = resolution_stamp(Resolved, None, t0);
        assert_eq!(stamped, Some(t0));

        // Resolved -> closed keeps the original time
        assert_eq!(resolution_stamp(Closed, stamped, t1), Some(t0));

        // Reopen clears it
        assert_eq!(resolution_stamp(Open, stamped, t1), None);
    }
}
