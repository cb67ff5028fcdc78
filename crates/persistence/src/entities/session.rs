//! Session and token entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the web_sessions table.
#[derive(Debug, Clone, FromRow)]
pub struct WebSessionEntity {
    /// SHA-256 hex of the session cookie token.
    pub id: String,
    pub user_id: Option<i32>,
    pub csrf_token: String,
    /// Copy of the user's token_version taken at sign in.
    pub token_version: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Database row mapping for the user_sessions (remember-me) table.
#[derive(Debug, Clone, FromRow)]
pub struct RememberTokenEntity {
    pub id: i32,
    pub user_id: i32,
    pub selector: String,
    pub hashed_validator: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Database row mapping for the password_resets table.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetEntity {
    pub id: i32,
    pub user_id: i32,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}
