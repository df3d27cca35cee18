//! Route handlers organized by resource

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod comments;
pub mod health;
pub mod reports;
pub mod tickets;
pub mod users;

/// Every API route, without middleware.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(tickets::router())
        .merge(comments::router())
        .merge(reports::router())
}

/// `Option<Option<T>>` for PATCH bodies: absent → `None`, `null` → `Some(None)`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Query-string values where an empty string means "not given".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        assigned_to: Option<Option<u32>>,
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"assigned_to": 7}"#).unwrap();
        assert_eq!(absent.assigned_to, None);
        assert_eq!(null.assigned_to, Some(None));
        assert_eq!(set.assigned_to, Some(Some(7)));
    }

    #[test]
    fn blank_query_values_are_ignored() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("open".into())), Some("open".into()));
    }
}
