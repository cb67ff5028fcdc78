//! Session authentication middleware.
//!
//! Resolves the request's web session (falling back to a remember-me
//! cookie), verifies the CSRF token on state-changing methods, and stores
//! the signed-in user in request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::crypto::constant_time_eq;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::session::AuthUser;
use crate::services::cookies::append_set_cookie;
use crate::services::sessions;

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Middleware that requires a signed-in user.
pub async fn require_user(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    authorize(state, req, next, false).await
}

/// Middleware for admin-only routes.
///
/// Same checks as [`require_user`], then the user must have the admin role.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    authorize(state, req, next, true).await
}

async fn authorize(state: AppState, mut req: Request<Body>, next: Next, admin: bool) -> Response {
    let resolved = match sessions::resolve(&state, req.headers()).await {
        Ok(resolved) => resolved,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let set_cookies = resolved.set_cookies;

    let outcome = match resolved.session {
        Some(sessions::ActiveSession {
            id,
            csrf_token,
            user: Some(user),
        }) => check_access(req.method(), req.headers(), &csrf_token, user.is_admin(), admin)
            .map(|()| AuthUser {
                user,
                session_id: id,
                csrf_token,
            }),
        _ => Err(ApiError::Unauthorized("Unauthorized".to_string())),
    };

    let mut response = match outcome {
        Ok(auth) => {
            tracing::Span::current().record("user_id", auth.user.id);
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    };

    for cookie in &set_cookies {
        append_set_cookie(response.headers_mut(), cookie);
    }
    response
}

/// Order matters: CSRF is checked before the role so that a forged request
/// never learns whether the victim is an admin.
fn check_access(
    method: &Method,
    headers: &HeaderMap,
    session_csrf: &str,
    is_admin: bool,
    admin_required: bool,
) -> Result<(), ApiError> {
    if requires_csrf(method) && !csrf_matches(headers, session_csrf) {
        tracing::warn!(method = %method, "Rejected request with invalid CSRF token");
        return Err(ApiError::Forbidden("Invalid CSRF token".to_string()));
    }

    if admin_required && !is_admin {
        return Err(ApiError::Forbidden(
            "Access denied. Admin privileges required.".to_string(),
        ));
    }

    Ok(())
}

/// Methods that change state and therefore need a CSRF token.
pub fn requires_csrf(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Constant-time comparison of the request's CSRF header with the session's token.
pub fn csrf_matches(headers: &HeaderMap, session_csrf: &str) -> bool {
    let provided = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    !provided.is_empty() && !session_csrf.is_empty() && constant_time_eq(provided, session_csrf)
}
