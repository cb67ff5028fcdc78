//! Activity feed route.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::{Activity, ActivityView};
use persistence::repositories::ActivityRepository;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;

const DEFAULT_ACTIVITY_LIMIT: i64 = 10;
const MAX_ACTIVITY_LIMIT: i64 = 50;

/// Query string for the feed. `limit` is kept as text so that junk values
/// fall back to the default instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<String>,
}

impl ActivityQuery {
    pub fn effective_limit(&self) -> i64 {
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        limit.min(MAX_ACTIVITY_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityView>,
}

/// The caller's most recent activity entries, newest first.
///
/// GET /api/recent_activity?limit=N
pub async fn recent_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityListResponse>, ApiError> {
    let offset = state.config.app.offset();
    let activities = ActivityRepository::new(state.pool.clone())
        .list_recent(auth.user.id, query.effective_limit())
        .await?
        .into_iter()
        .map(|entity| ActivityView::new(Activity::from(entity), offset))
        .collect();

    Ok(Json(ActivityListResponse { activities }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(value: Option<&str>) -> i64 {
        ActivityQuery {
            limit: value.map(str::to_string),
        }
        .effective_limit()
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(limit(None), 10);
        assert_eq!(limit(Some("")), 10);
        assert_eq!(limit(Some("abc")), 10);
    }

    #[test]
    fn test_non_positive_limit_resets() {
        assert_eq!(limit(Some("0")), 10);
        assert_eq!(limit(Some("-5")), 10);
    }

    #[test]
    fn test_limit_capped() {
        assert_eq!(limit(Some("25")), 25);
        assert_eq!(limit(Some("50")), 50);
        assert_eq!(limit(Some("500")), 50);
    }
}
