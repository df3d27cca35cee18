//! Property tests for the escalation rule

use chrono::{DateTime, Duration, TimeZone, Utc};
use helpdesk_core::{EscalationPolicy, Priority, TicketStatus};
use proptest::prelude::*;

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High)
    ]
}

fn arb_status() -> impl Strategy<Value = TicketStatus> {
    prop::sample::select(TicketStatus::ALL.to_vec())
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

proptest! {
    /// Property: a ticket is due iff it is still being worked and more
    /// than its threshold has elapsed since the last update
    #[test]
    fn prop_due_iff_elapsed_exceeds_threshold(
        status in arb_status(),
        priority in arb_priority(),
        elapsed_secs in 0i64..(72 * 3600),
    ) {
        let policy = EscalationPolicy::default();
        let updated = base();
        let now = updated + Duration::seconds(elapsed_secs);

        let due = policy.is_due(status, priority, updated, now);
        let expected = status.is_escalatable()
            && Duration::seconds(elapsed_secs) > policy.threshold(priority);
        prop_assert_eq!(due, expected);
    }

    /// Property: resolved and closed tickets never escalate
    #[test]
    fn prop_terminal_never_due(
        priority in arb_priority(),
        elapsed_hours in 0i64..10_000,
    ) {
        let policy = EscalationPolicy::default();
        let now = base() + Duration::hours(elapsed_hours);
        prop_assert!(!policy.is_due(TicketStatus::Resolved, priority, base(), now));
        prop_assert!(!policy.is_due(TicketStatus::Closed, priority, base(), now));
    }

    /// Property: the SQL cutoff agrees with the in-memory rule
    #[test]
    fn prop_cutoff_matches_is_due(
        priority in arb_priority(),
        offset_secs in -(48i64 * 3600)..(48 * 3600),
    ) {
        let policy = EscalationPolicy::default();
        let now = base();
        let updated = now + Duration::seconds(offset_secs);
        let by_cutoff = updated < policy.cutoffs(now).for_priority(priority);
        prop_assert_eq!(by_cutoff, policy.is_due(TicketStatus::Open, priority, updated, now));
    }

    /// Property: no manual transition ever lands on escalated
    #[test]
    fn prop_manual_escalation_rejected(from in arb_status()) {
        if from != TicketStatus::Escalated {
            prop_assert!(from.transition_to(TicketStatus::Escalated).is_err());
        }
    }
}
