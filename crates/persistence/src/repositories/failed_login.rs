//! Failed sign-in attempt repository feeding the account lockout.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::metrics::QueryTimer;

/// Column widths of `failed_login_attempts`.
pub const MAX_IDENTIFIER_LEN: usize = 255;
pub const MAX_IP_ADDRESS_LEN: usize = 45;
pub const MAX_USER_AGENT_LEN: usize = 512;

/// First `max_chars` characters of `value`.
pub fn clip(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Repository for failed login attempts.
#[derive(Clone)]
pub struct FailedLoginRepository {
    pool: PgPool,
}

impl FailedLoginRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count failures for an identifier since `since`.
    pub async fn count_since(
        conn: &mut PgConnection,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_failed_logins");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM failed_login_attempts
            WHERE identifier = $1 AND attempt_at > $2
            "#,
        )
        .bind(clip(identifier, MAX_IDENTIFIER_LEN))
        .bind(since)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Record a failed attempt. Values longer than their column are cut to
    /// fit, so a client controlled header can never make the insert fail.
    pub async fn record(
        conn: &mut PgConnection,
        identifier: &str,
        ip_address: &str,
        user_agent: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_failed_login");
        let result = sqlx::query(
            r#"
            INSERT INTO failed_login_attempts (identifier, ip_address, user_agent)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(clip(identifier, MAX_IDENTIFIER_LEN))
        .bind(clip(ip_address, MAX_IP_ADDRESS_LEN))
        .bind(user_agent.map(|ua| clip(ua, MAX_USER_AGENT_LEN)))
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Forget every failure recorded for any of the identifiers.
    pub async fn clear(&self, identifiers: &[String]) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("clear_failed_logins");
        let result = sqlx::query("DELETE FROM failed_login_attempts WHERE identifier = ANY($1)")
            .bind(identifiers)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Delete attempts older than `before`.
    pub async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_old_failed_logins");
        let result = sqlx::query("DELETE FROM failed_login_attempts WHERE attempt_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
