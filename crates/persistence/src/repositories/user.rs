//! User repository for account database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::entities::user::USER_COLUMNS;
use crate::entities::{ImageBlobEntity, UserEntity};
use crate::metrics::QueryTimer;

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub email_verified: bool,
}

/// Profile columns a user may change. `None` leaves the column untouched;
/// `Some(None)` stores NULL for the nullable ones.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub location: Option<Option<String>>,
    pub bio: Option<Option<String>>,
}

/// Repository for user account operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: i32) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user whose email or username equals `identifier`.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_identifier");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1 \
             ORDER BY (email = $1) DESC LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Insert a new account.
    pub async fn create(&self, user: NewUser<'_>) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "INSERT INTO users (full_name, email, username, password_hash, role, email_verified) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.role)
        .bind(user.email_verified)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Whether any account holds the admin role.
    pub async fn admin_exists(&self) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("admin_exists");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')",
        )
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Lock the account until the given instant.
    pub async fn lock_until(
        conn: &mut PgConnection,
        id: i32,
        until: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("lock_user");
        let result = sqlx::query("UPDATE users SET locked_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(&mut *conn)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Clear any lock on the account.
    pub async fn unlock(&self, id: i32) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("unlock_user");
        let result = sqlx::query(
            "UPDATE users SET locked_until = NULL WHERE id = $1 AND locked_until IS NOT NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Whether `email` belongs to an account other than `user_id`. Locks the
    /// matching row for the rest of the transaction.
    pub async fn email_taken_by_other(
        conn: &mut PgConnection,
        email: &str,
        user_id: i32,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("email_taken_by_other");
        let result = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM users WHERE LOWER(email) = LOWER($1) AND id <> $2 FOR UPDATE",
        )
        .bind(email)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result.map(|row| row.is_some())
    }

    /// Apply profile changes inside a transaction.
    pub async fn update_profile(
        conn: &mut PgConnection,
        id: i32,
        changes: &ProfileChanges,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_profile");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "UPDATE users SET \
                full_name = COALESCE($2, full_name), \
                email = COALESCE($3, email), \
                location = CASE WHEN $4 THEN $5 ELSE location END, \
                bio = CASE WHEN $6 THEN $7 ELSE bio END, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.full_name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.location.is_some())
        .bind(changes.location.clone().flatten())
        .bind(changes.bio.is_some())
        .bind(changes.bio.clone().flatten())
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Store a new password hash and bump the token version, which
    /// invalidates every existing session. Returns the new version.
    pub async fn update_password(
        conn: &mut PgConnection,
        id: i32,
        password_hash: &str,
    ) -> Result<i32, sqlx::Error> {
        let timer = QueryTimer::new("update_user_password");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET password_hash = $2, token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Replace the stored avatar.
    pub async fn set_avatar(
        &self,
        id: i32,
        data: &[u8],
        mime: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_user_avatar");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "UPDATE users \
             SET avatar = $2, avatar_mime = $3, avatar_updated_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(data)
        .bind(mime)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Load the avatar bytes, if any.
    pub async fn find_avatar(&self, id: i32) -> Result<Option<ImageBlobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_avatar");
        let result = sqlx::query_as::<_, ImageBlobEntity>(
            r#"
            SELECT avatar AS data, avatar_mime AS mime
            FROM users
            WHERE id = $1 AND avatar IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
