//! Persistent "remember me" logins.
//!
//! The cookie carries `selector:validator`. Only SHA-256(validator) is stored,
//! looked up by selector and compared in constant time. Every successful use
//! rotates the pair.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use domain::models::User;
use persistence::repositories::{RememberTokenRepository, UserRepository};
use shared::crypto::{constant_time_eq, random_hex, sha256_hex};
use tracing::{debug, warn};

use crate::app::AppState;

/// Random bytes in a selector.
pub const SELECTOR_BYTES: usize = 12;
/// Random bytes in a validator.
pub const VALIDATOR_BYTES: usize = 32;

/// Result of presenting a remember-me cookie.
#[derive(Debug)]
pub enum RememberOutcome {
    /// No cookie was sent.
    Absent,
    /// The cookie was unknown, expired or forged and should be cleared.
    Rejected,
    /// The token was valid; it has been rotated into `cookie`.
    Accepted { user: User, cookie: String },
}

/// Store a fresh token for `user_id` and return its Set-Cookie value.
pub async fn issue(state: &AppState, user_id: i32) -> Result<String, sqlx::Error> {
    let selector = random_hex(SELECTOR_BYTES);
    let validator = random_hex(VALIDATOR_BYTES);
    let expires_at = Utc::now() + Duration::seconds(state.config.session.remember_ttl_secs);

    RememberTokenRepository::new(state.pool.clone())
        .create(user_id, &selector, &sha256_hex(&validator), expires_at)
        .await?;

    Ok(state.cookies.build_remember_cookie(&selector, &validator))
}

/// Validate the request's remember-me cookie and rotate it on success.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<RememberOutcome, sqlx::Error> {
    if !state.cookies.has_remember_cookie(headers) {
        return Ok(RememberOutcome::Absent);
    }
    let Some((selector, validator)) = state.cookies.extract_remember_token(headers) else {
        return Ok(RememberOutcome::Rejected);
    };

    let tokens = RememberTokenRepository::new(state.pool.clone());
    let Some(stored) = tokens.find_active(selector).await? else {
        debug!("Unknown or expired remember-me selector");
        return Ok(RememberOutcome::Rejected);
    };

    if !constant_time_eq(&sha256_hex(validator), &stored.hashed_validator) {
        // A known selector with the wrong validator suggests a stolen cookie.
        warn!(user_id = stored.user_id, "Remember-me validator mismatch, revoking token");
        tokens.delete_by_selector(selector).await?;
        return Ok(RememberOutcome::Rejected);
    }

    let Some(user) = UserRepository::new(state.pool.clone())
        .find_by_id(stored.user_id)
        .await?
        .map(User::from)
    else {
        tokens.delete_by_selector(selector).await?;
        return Ok(RememberOutcome::Rejected);
    };

    tokens.delete_by_selector(selector).await?;
    let cookie = issue(state, user.id).await?;

    Ok(RememberOutcome::Accepted { user, cookie })
}

/// Delete the token named by the request's cookie, if any.
pub async fn revoke(state: &AppState, headers: &HeaderMap) -> Result<(), sqlx::Error> {
    if let Some((selector, _)) = state.cookies.extract_remember_token(headers) {
        RememberTokenRepository::new(state.pool.clone())
            .delete_by_selector(selector)
            .await?;
    }
    Ok(())
}
