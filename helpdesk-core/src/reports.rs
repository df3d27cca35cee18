//! Report arithmetic shared by the reporting endpoints

use serde::{Deserialize, Serialize};

/// Rolling-window activity counts: `{"opened", "resolved", "escalated"}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Tickets created in the window
    pub opened: i64,
    /// Tickets whose resolution was stamped in the window
    pub resolved: i64,
    /// Tickets escalated in the window
    pub escalated: i64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total` as a percentage, 0 when there is nothing to divide by.
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

/// Seconds (as returned by `EXTRACT(EPOCH ...)`) to rounded hours; 0 for no data.
pub fn secs_to_hours(secs: Option<f64>) -> f64 {
    secs.map(|s| round2(s / 3600.0)).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_empty_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 2), 100.0);
    }

    #[test]
    fn hours_from_seconds() {
        assert_eq!(secs_to_hours(None), 0.0);
        assert_eq!(secs_to_hours(Some(5400.0)), 1.5);
        assert_eq!(secs_to_hours(Some(100.0)), 0.03);
    }

    #[test]
    fn summary_serializes_flat() {
        let s = ActivitySummary {
            opened: 4,
            resolved: 2,
            escalated: 1,
        };
        assert_eq!(
            serde_json::to_value(s).unwrap(),
            serde_json::json!({"opened": 4, "resolved": 2, "escalated": 1})
        );
    }
}
