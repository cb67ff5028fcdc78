//! Periodic purge of expired authentication state.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use persistence::repositories::{
    FailedLoginRepository, PasswordResetRepository, RememberTokenRepository,
    WebSessionRepository,
};
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

/// Deletes expired sessions, remember-me tokens, spent or expired reset
/// tokens and failed sign-in attempts that no longer count toward a lockout,
/// then drops idle rate-limit keys.
pub struct SessionCleanupJob {
    pool: PgPool,
    rate_limiter: Arc<RateLimiterState>,
    lockout_window_secs: i64,
}

impl SessionCleanupJob {
    pub fn new(pool: PgPool, rate_limiter: Arc<RateLimiterState>, lockout_window_secs: i64) -> Self {
        Self {
            pool,
            rate_limiter,
            lockout_window_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for SessionCleanupJob {
    fn name(&self) -> &'static str {
        "session_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(15)
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let sessions = WebSessionRepository::new(self.pool.clone())
            .delete_expired()
            .await
            .context("failed to delete expired web sessions")?;

        let remember_tokens = RememberTokenRepository::new(self.pool.clone())
            .delete_expired()
            .await
            .context("failed to delete expired remember-me tokens")?;

        let password_resets = PasswordResetRepository::new(self.pool.clone())
            .delete_stale()
            .await
            .context("failed to delete stale password resets")?;

        let cutoff = Utc::now() - Duration::seconds(self.lockout_window_secs);
        let failed_logins = FailedLoginRepository::new(self.pool.clone())
            .delete_older_than(cutoff)
            .await
            .context("failed to delete old failed login attempts")?;

        let rate_limit_keys = self.rate_limiter.prune();

        info!(
            sessions,
            remember_tokens,
            password_resets,
            failed_logins,
            rate_limit_keys,
            "Expired authentication state purged"
        );
        Ok(())
    }
}
