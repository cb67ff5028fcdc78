//! Remember-me token repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::entities::RememberTokenEntity;
use crate::metrics::QueryTimer;

/// Repository for persistent login tokens.
#[derive(Clone)]
pub struct RememberTokenRepository {
    pool: PgPool,
}

impl RememberTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a token; the validator is stored hashed.
    pub async fn create(
        &self,
        user_id: i32,
        selector: &str,
        hashed_validator: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("create_remember_token");
        let result = sqlx::query(
            r#"
            INSERT INTO user_sessions (user_id, selector, hashed_validator, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(selector)
        .bind(hashed_validator)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find an unexpired token by selector.
    pub async fn find_active(
        &self,
        selector: &str,
    ) -> Result<Option<RememberTokenEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_remember_token");
        let result = sqlx::query_as::<_, RememberTokenEntity>(
            r#"
            SELECT id, user_id, selector, hashed_validator, expires_at, created_at
            FROM user_sessions
            WHERE selector = $1 AND expires_at > NOW()
            "#,
        )
        .bind(selector)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete the token with this selector.
    pub async fn delete_by_selector(&self, selector: &str) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("delete_remember_token");
        let result = sqlx::query("DELETE FROM user_sessions WHERE selector = $1")
            .bind(selector)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Delete every token of a user, inside the caller's transaction.
    pub async fn delete_for_user(conn: &mut PgConnection, user_id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_remember_tokens_for_user");
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Delete every expired token.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_remember_tokens");
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
