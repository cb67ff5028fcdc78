//! Activity repository for the per-user audit feed.

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::entities::ActivityEntity;
use crate::metrics::QueryTimer;

/// Repository for user activity entries.
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an activity entry.
    pub async fn insert(
        &self,
        user_id: i32,
        activity_type: &str,
        description: &str,
        metadata: Option<&JsonValue>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_user_activity");
        let result = sqlx::query(
            r#"
            INSERT INTO user_activity (user_id, activity_type, description, metadata)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(activity_type)
        .bind(description)
        .bind(metadata)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Most recent entries for a user, newest first.
    pub async fn list_recent(
        &self,
        user_id: i32,
        limit: i64,
    ) -> Result<Vec<ActivityEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_recent_user_activity");
        let result = sqlx::query_as::<_, ActivityEntity>(
            r#"
            SELECT id, user_id, activity_type, description, metadata, created_at
            FROM user_activity
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
