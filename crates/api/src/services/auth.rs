//! Authentication service for account creation, sign in with lockout, and
//! password reset.

use chrono::{DateTime, Duration, Utc};
use domain::models::User;
use domain::services::LockoutPolicy;
use persistence::repositories::{
    FailedLoginRepository, NewUser, PasswordResetRepository, RememberTokenRepository,
    UserRepository,
};
use rand::Rng;
use shared::crypto::{random_hex, sha256_hex};
use shared::password::{hash_password, verify_password_or_dummy, PasswordError};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::services::email::EmailService;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email or username already registered")]
    AccountExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Fields of a new account, already sanitised and validated.
#[derive(Debug, Clone)]
pub struct Signup<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// A sign-in attempt with the request facts stored on failure.
#[derive(Debug, Clone)]
pub struct SigninAttempt<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
    pub ip_address: &'a str,
    pub user_agent: Option<&'a str>,
}

/// What happened to a password reset request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetRequestOutcome {
    /// No account has this email.
    NoAccount,
    /// A reset mail was handed to the email provider.
    Sent { user_id: i32 },
    /// A token was stored but the mail could not be sent.
    NotSent { user_id: i32 },
}

/// Authentication service.
pub struct AuthService {
    pool: PgPool,
    config: AuthConfig,
}

impl AuthService {
    /// Creates a new AuthService with the given database pool and auth settings.
    pub fn new(pool: PgPool, config: AuthConfig) -> Self {
        Self { pool, config }
    }

    pub fn lockout_policy(&self) -> LockoutPolicy {
        lockout_policy(&self.config)
    }

    /// Create a regular user account.
    pub async fn signup(&self, signup: Signup<'_>) -> Result<User, AuthError> {
        let password_hash = hash_password(signup.password)?;

        let created = UserRepository::new(self.pool.clone())
            .create(NewUser {
                full_name: signup.full_name,
                email: signup.email,
                username: signup.username,
                password_hash: &password_hash,
                role: "user",
                email_verified: false,
            })
            .await;

        match created {
            Ok(entity) => {
                info!(user_id = entity.id, "Account created");
                Ok(entity.into())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(AuthError::AccountExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the lock expiry when the account behind `identifier` is
    /// currently locked.
    pub async fn active_lock(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, AuthError> {
        let user = UserRepository::new(self.pool.clone())
            .find_by_identifier(identifier)
            .await?;
        Ok(user
            .map(User::from)
            .and_then(|user| user.locked_at(Utc::now())))
    }

    /// Check credentials.
    ///
    /// A missing account is verified against a dummy hash so both paths cost
    /// the same. Failures against an existing account are recorded and may
    /// lock it. Every failure waits a random delay before returning.
    pub async fn verify_credentials(&self, attempt: &SigninAttempt<'_>) -> Result<User, AuthError> {
        let user = UserRepository::new(self.pool.clone())
            .find_by_identifier(attempt.identifier)
            .await?
            .map(User::from);

        let valid = verify_password_or_dummy(
            attempt.password,
            user.as_ref().map(|u| u.password_hash.as_str()),
        )?;

        match user {
            Some(user) if valid => Ok(user),
            user => {
                let recorded = match &user {
                    Some(user) => self.record_failure(user, attempt).await,
                    None => Ok(()),
                };
                jitter(self.config.signin_delay_min_ms, self.config.signin_delay_max_ms).await;
                recorded?;
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Store the failure and lock the account once the threshold is reached.
    /// Both steps share one transaction; an error is returned to the caller
    /// rather than letting the attempt through unrecorded.
    async fn record_failure(&self, user: &User, attempt: &SigninAttempt<'_>) -> Result<(), sqlx::Error> {
        let identifier = attempt.identifier.to_lowercase();
        let now = Utc::now();
        let policy = self.lockout_policy();

        warn!(
            identifier = %identifier,
            ip = %attempt.ip_address,
            "Failed login attempt"
        );

        let mut tx = self.pool.begin().await?;
        let prior =
            FailedLoginRepository::count_since(&mut *tx, &identifier, policy.window_start(now))
                .await?;
        FailedLoginRepository::record(&mut *tx, &identifier, attempt.ip_address, attempt.user_agent)
            .await?;
        let lock = policy.should_lock(prior);
        if lock {
            UserRepository::lock_until(&mut *tx, user.id, policy.locked_until(now)).await?;
        }
        tx.commit().await?;

        if lock {
            warn!(user_id = user.id, "Account locked due to failed login attempts");
        }
        Ok(())
    }

    /// Forget failure history after a successful sign in.
    pub async fn clear_failures(&self, user: &User, identifier: &str) -> Result<(), AuthError> {
        FailedLoginRepository::new(self.pool.clone())
            .clear(&[identifier.to_lowercase()])
            .await?;
        if user.locked_until.is_some() {
            UserRepository::new(self.pool.clone()).unlock(user.id).await?;
        }
        Ok(())
    }

    /// Issue a reset token for the account with this email, if any, and mail it.
    ///
    /// Always waits a random delay so callers cannot tell whether the account
    /// exists.
    pub async fn request_password_reset(
        &self,
        email: &str,
        mailer: &EmailService,
    ) -> Result<ResetRequestOutcome, AuthError> {
        let outcome = self.issue_reset_token(email, mailer).await;
        jitter(
            self.config.forgot_password_delay_min_ms,
            self.config.forgot_password_delay_max_ms,
        )
        .await;
        outcome
    }

    async fn issue_reset_token(
        &self,
        email: &str,
        mailer: &EmailService,
    ) -> Result<ResetRequestOutcome, AuthError> {
        let Some(user) = UserRepository::new(self.pool.clone())
            .find_by_email(email)
            .await?
        else {
            return Ok(ResetRequestOutcome::NoAccount);
        };

        let token = random_hex(32);
        let expires_at = Utc::now() + Duration::seconds(self.config.reset_token_ttl_secs);

        let resets = PasswordResetRepository::new(self.pool.clone());
        resets.purge_stale_for_user(user.id).await?;
        resets.create(user.id, &sha256_hex(&token), expires_at).await?;

        match mailer
            .send_password_reset_email(&user.email, &user.full_name, &token)
            .await
        {
            Ok(()) => Ok(ResetRequestOutcome::Sent { user_id: user.id }),
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Failed to send password reset email");
                Ok(ResetRequestOutcome::NotSent { user_id: user.id })
            }
        }
    }

    /// Redeem a reset token: store the new password, revoke every session
    /// and remember-me token, and consume the token. Returns the user id.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<i32, AuthError> {
        let token_hash = sha256_hex(token);
        let mut tx = self.pool.begin().await?;

        let reset = PasswordResetRepository::lock_valid(&mut *tx, &token_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = hash_password(new_password)?;
        UserRepository::update_password(&mut *tx, reset.user_id, &password_hash).await?;
        PasswordResetRepository::delete(&mut *tx, reset.id).await?;
        RememberTokenRepository::delete_for_user(&mut *tx, reset.user_id).await?;

        tx.commit().await?;

        info!(user_id = reset.user_id, "Password reset completed");
        Ok(reset.user_id)
    }
}

/// Lockout policy described by the auth settings.
pub fn lockout_policy(config: &AuthConfig) -> LockoutPolicy {
    LockoutPolicy {
        threshold: config.lockout_threshold,
        window: Duration::seconds(config.lockout_window_secs),
        duration: Duration::seconds(config.lockout_duration_secs),
    }
}

/// Sleep for a random duration in `[min_ms, max_ms]`.
pub async fn jitter(min_ms: u64, max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(min_ms.min(max_ms)..=max_ms);
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
