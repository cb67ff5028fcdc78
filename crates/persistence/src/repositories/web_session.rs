//! Web session repository backing the session cookie.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::WebSessionEntity;
use crate::metrics::QueryTimer;

/// Repository for server-side web sessions.
#[derive(Clone)]
pub struct WebSessionRepository {
    pool: PgPool,
}

impl WebSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a session row.
    pub async fn create(
        &self,
        id: &str,
        user_id: Option<i32>,
        csrf_token: &str,
        token_version: Option<i32>,
        expires_at: DateTime<Utc>,
    ) -> Result<WebSessionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_web_session");
        let result = sqlx::query_as::<_, WebSessionEntity>(
            r#"
            INSERT INTO web_sessions (id, user_id, csrf_token, token_version, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, csrf_token, token_version, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(csrf_token)
        .bind(token_version)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an unexpired session.
    pub async fn find_active(&self, id: &str) -> Result<Option<WebSessionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_web_session");
        let result = sqlx::query_as::<_, WebSessionEntity>(
            r#"
            SELECT id, user_id, csrf_token, token_version, created_at, expires_at
            FROM web_sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Refresh the token version snapshot, keeping the session signed in
    /// after its owner changed their password.
    pub async fn set_token_version(&self, id: &str, token_version: i32) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_web_session_token_version");
        let result = sqlx::query("UPDATE web_sessions SET token_version = $2 WHERE id = $1")
            .bind(id)
            .bind(token_version)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Delete a session.
    pub async fn delete(&self, id: &str) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("delete_web_session");
        let result = sqlx::query("DELETE FROM web_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Delete every expired session. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_web_sessions");
        let result = sqlx::query("DELETE FROM web_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
