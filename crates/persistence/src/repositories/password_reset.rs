//! Password reset token repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::entities::PasswordResetEntity;
use crate::metrics::QueryTimer;

/// Repository for password reset tokens.
#[derive(Clone)]
pub struct PasswordResetRepository {
    pool: PgPool,
}

impl PasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove the user's spent or expired tokens.
    pub async fn purge_stale_for_user(&self, user_id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("purge_stale_password_resets_for_user");
        let result = sqlx::query(
            "DELETE FROM password_resets WHERE user_id = $1 AND (used = TRUE OR expires_at <= NOW())",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Store a new token hash.
    pub async fn create(
        &self,
        user_id: i32,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("create_password_reset");
        let result = sqlx::query(
            r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find and lock a usable token by hash.
    pub async fn lock_valid(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<PasswordResetEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_valid_password_reset");
        let result = sqlx::query_as::<_, PasswordResetEntity>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used, created_at
            FROM password_resets
            WHERE token_hash = $1 AND used = FALSE AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Delete a token once consumed.
    pub async fn delete(conn: &mut PgConnection, id: i32) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("delete_password_reset");
        let result = sqlx::query("DELETE FROM password_resets WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Delete spent and expired tokens of all users.
    pub async fn delete_stale(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_stale_password_resets");
        let result =
            sqlx::query("DELETE FROM password_resets WHERE used = TRUE OR expires_at <= NOW()")
                .execute(&self.pool)
                .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
