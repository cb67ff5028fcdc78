//! Server-side web sessions.
//!
//! The browser holds an opaque random token in an HttpOnly cookie; the
//! database row is keyed by its SHA-256. Each session carries its CSRF token
//! and, once signed in, the user's token_version at sign-in time. A session
//! whose version no longer matches the user's is discarded.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use domain::models::User;
use persistence::repositories::{UserRepository, WebSessionRepository};
use shared::crypto::{random_hex, sha256_hex};
use tracing::{debug, info};

use crate::app::AppState;
use crate::services::remember_me::{self, RememberOutcome};

/// Random bytes in a session cookie token.
pub const SESSION_TOKEN_BYTES: usize = 32;
/// Random bytes in a CSRF token.
pub const CSRF_TOKEN_BYTES: usize = 32;

/// A live session as seen by a request.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Row id, the SHA-256 of the cookie token.
    pub id: String,
    pub csrf_token: String,
    pub user: Option<User>,
}

/// A session that was just created, with the cookie that names it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: ActiveSession,
    pub cookie: String,
}

/// Session lookup result plus any cookies the response must carry.
#[derive(Debug, Default)]
pub struct ResolvedSession {
    pub session: Option<ActiveSession>,
    pub set_cookies: Vec<String>,
}

impl ResolvedSession {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|s| s.user.as_ref())
    }
}

/// Row id for the session named by the request cookie, if any.
pub fn session_id_from_headers(state: &AppState, headers: &HeaderMap) -> Option<String> {
    state.cookies.extract_session_token(headers).map(sha256_hex)
}

/// Find the request's session.
///
/// Without a valid signed-in session, a valid remember-me cookie signs the
/// user in again on a fresh session and rotates the remember-me token.
pub async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<ResolvedSession, sqlx::Error> {
    let sessions = WebSessionRepository::new(state.pool.clone());
    let mut anonymous: Option<ActiveSession> = None;
    let mut stale_cookie = false;

    if let Some(id) = session_id_from_headers(state, headers) {
        match sessions.find_active(&id).await? {
            Some(row) => match row.user_id {
                None => {
                    anonymous = Some(ActiveSession {
                        id: row.id,
                        csrf_token: row.csrf_token,
                        user: None,
                    });
                }
                Some(user_id) => {
                    let user = UserRepository::new(state.pool.clone())
                        .find_by_id(user_id)
                        .await?
                        .map(User::from);
                    match user {
                        Some(user) if row.token_version == Some(user.token_version) => {
                            return Ok(ResolvedSession {
                                session: Some(ActiveSession {
                                    id: row.id,
                                    csrf_token: row.csrf_token,
                                    user: Some(user),
                                }),
                                set_cookies: Vec::new(),
                            });
                        }
                        _ => {
                            debug!(user_id, "Discarding session with outdated token version");
                            sessions.delete(&row.id).await?;
                            stale_cookie = true;
                        }
                    }
                }
            },
            None => stale_cookie = true,
        }
    }

    let mut set_cookies = Vec::new();

    match remember_me::authenticate(state, headers).await? {
        RememberOutcome::Accepted { user, cookie } => {
            let previous = anonymous.as_ref().map(|s| s.id.clone());
            let issued = establish_for_user(state, previous.as_deref(), user).await?;
            info!(user_id = ?issued.session.user.as_ref().map(|u| u.id), "Signed in from remember-me token");
            set_cookies.push(issued.cookie);
            set_cookies.push(cookie);
            return Ok(ResolvedSession {
                session: Some(issued.session),
                set_cookies,
            });
        }
        RememberOutcome::Rejected => set_cookies.push(state.cookies.build_clear_remember_cookie()),
        RememberOutcome::Absent => {}
    }

    if stale_cookie && anonymous.is_none() {
        set_cookies.push(state.cookies.build_clear_session_cookie());
    }

    Ok(ResolvedSession {
        session: anonymous,
        set_cookies,
    })
}

/// Like [`resolve`], but starts an anonymous session when there is none so
/// the caller always has a CSRF token.
pub async fn ensure(state: &AppState, headers: &HeaderMap) -> Result<ResolvedSession, sqlx::Error> {
    let mut resolved = resolve(state, headers).await?;
    if resolved.session.is_none() {
        let issued = create_anonymous(state).await?;
        resolved.set_cookies.push(issued.cookie);
        resolved.session = Some(issued.session);
    }
    Ok(resolved)
}

/// Start a session with no user attached.
pub async fn create_anonymous(state: &AppState) -> Result<IssuedSession, sqlx::Error> {
    create(state, None).await
}

/// Start a signed-in session for `user`, deleting `previous` first so a
/// pre-login session id can never become authenticated.
pub async fn establish_for_user(
    state: &AppState,
    previous: Option<&str>,
    user: User,
) -> Result<IssuedSession, sqlx::Error> {
    if let Some(previous) = previous {
        WebSessionRepository::new(state.pool.clone())
            .delete(previous)
            .await?;
    }
    create(state, Some(user)).await
}

async fn create(state: &AppState, user: Option<User>) -> Result<IssuedSession, sqlx::Error> {
    let token = random_hex(SESSION_TOKEN_BYTES);
    let csrf_token = random_hex(CSRF_TOKEN_BYTES);
    let id = sha256_hex(&token);
    let expires_at = Utc::now() + Duration::seconds(state.config.session.ttl_secs);

    WebSessionRepository::new(state.pool.clone())
        .create(
            &id,
            user.as_ref().map(|u| u.id),
            &csrf_token,
            user.as_ref().map(|u| u.token_version),
            expires_at,
        )
        .await?;

    Ok(IssuedSession {
        session: ActiveSession {
            id,
            csrf_token,
            user,
        },
        cookie: state.cookies.build_session_cookie(&token),
    })
}

/// Keep the caller's session valid after their token_version was bumped.
pub async fn refresh_token_version(
    state: &AppState,
    session_id: &str,
    token_version: i32,
) -> Result<(), sqlx::Error> {
    WebSessionRepository::new(state.pool.clone())
        .set_token_version(session_id, token_version)
        .await
}

/// Delete a session row.
pub async fn destroy(state: &AppState, session_id: &str) -> Result<(), sqlx::Error> {
    WebSessionRepository::new(state.pool.clone())
        .delete(session_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_session_user() {
        let resolved = ResolvedSession::default();
        assert!(resolved.user().is_none());

        let anonymous = ResolvedSession {
            session: Some(ActiveSession {
                id: "id".to_string(),
                csrf_token: "csrf".to_string(),
                user: None,
            }),
            set_cookies: vec![],
        };
        assert!(anonymous.user().is_none());
    }

    #[test]
    fn test_session_id_is_token_digest() {
        let token = random_hex(SESSION_TOKEN_BYTES);
        let id = sha256_hex(&token);
        assert_eq!(id.len(), 64);
        assert_ne!(id, token);
    }
}
