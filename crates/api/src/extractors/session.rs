//! Signed-in user extractor.
//!
//! Reads the context stored by the session middleware.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::User;

use crate::app::AppState;
use crate::error::ApiError;

/// The signed-in user of a request, with the session it came from.
///
/// Only available behind [`require_user`](crate::middleware::session_auth::require_user)
/// or [`require_admin`](crate::middleware::session_auth::require_admin).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Session row id.
    pub session_id: String,
    pub csrf_token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
    }
}
