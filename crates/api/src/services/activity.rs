//! Activity log writer.

use domain::models::ActivityKind;
use persistence::repositories::ActivityRepository;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::warn;

/// Append an entry to the user's activity log.
///
/// Failures are logged and swallowed: the activity feed never fails the
/// operation it describes.
pub async fn record(
    pool: &PgPool,
    user_id: i32,
    kind: ActivityKind,
    description: Option<&str>,
    metadata: Option<JsonValue>,
) {
    let description = description.unwrap_or_else(|| kind.description());
    let result = ActivityRepository::new(pool.clone())
        .insert(user_id, kind.as_str(), description, metadata.as_ref())
        .await;

    if let Err(e) = result {
        warn!(
            user_id,
            activity_type = kind.as_str(),
            error = %e,
            "Failed to record activity"
        );
    }
}
