//! User account entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::UserRole;
use sqlx::FromRow;
use std::str::FromStr;

/// Columns selected for [`UserEntity`]. The avatar blob itself is never
/// loaded with the account row.
pub const USER_COLUMNS: &str = "id, full_name, email, username, password_hash, role, \
     (avatar IS NOT NULL) AS has_avatar, avatar_updated_at, bio, location, token_version, \
     locked_until, email_verified, created_at, updated_at";

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub has_avatar: bool,
    pub avatar_updated_at: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub token_version: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            full_name: entity.full_name,
            email: entity.email,
            username: entity.username,
            password_hash: entity.password_hash,
            role: UserRole::from_str(&entity.role).unwrap_or_default(),
            has_avatar: entity.has_avatar,
            avatar_updated_at: entity.avatar_updated_at,
            bio: entity.bio,
            location: entity.location,
            token_version: entity.token_version,
            locked_until: entity.locked_until,
            email_verified: entity.email_verified,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// A stored image blob with its recorded mime type.
#[derive(Debug, Clone, FromRow)]
pub struct ImageBlobEntity {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}
