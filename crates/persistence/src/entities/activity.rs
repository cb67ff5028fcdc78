//! User activity entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Database row mapping for the user_activity table.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityEntity {
    pub id: i64,
    pub user_id: i32,
    pub activity_type: String,
    pub description: String,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityEntity> for domain::models::Activity {
    fn from(entity: ActivityEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            activity_type: entity.activity_type,
            description: entity.description,
            metadata: entity.metadata,
            created_at: entity.created_at,
        }
    }
}
