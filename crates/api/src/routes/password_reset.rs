//! Password reset routes.
//!
//! `forgot_password` always answers with the same message whether or not the
//! account exists. `reset_password` redeems a single-use emailed token.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::ActivityKind;
use serde::Deserialize;
use shared::validation::{check_password_complexity, is_valid_email, sanitize_opt};
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::JsonBody;
use crate::middleware::metrics::record_auth_event;
use crate::middleware::RateLimitPolicy;
use crate::routes::auth::MessageResponse;
use crate::services::activity;
use crate::services::auth::{AuthService, ResetRequestOutcome};

pub const FORGOT_PASSWORD_MESSAGE: &str = "If an account exists with this email, a password reset link has been sent. Please check your inbox.";

pub const RESET_PASSWORD_MESSAGE: &str =
    "Password reset successfully. You can now sign in with your new password.";

/// Request body for asking for a reset link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

fn validate_reset_email(request: &ForgotPasswordRequest) -> Result<String, ApiError> {
    let email = sanitize_opt(request.email.as_deref());
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email format"));
    }
    Ok(email)
}

/// Email a reset link to the account with this address, if there is one.
///
/// POST /api/forgot_password
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let email = validate_reset_email(&request)?;

    state
        .rate_limiter
        .enforce(RateLimitPolicy::ForgotPassword, &email.to_lowercase())?;

    let auth_service = AuthService::new(state.pool.clone(), state.config.auth.clone());
    let outcome = auth_service
        .request_password_reset(&email, &state.email)
        .await?;

    match outcome {
        ResetRequestOutcome::Sent { user_id } => {
            activity::record(
                &state.pool,
                user_id,
                ActivityKind::PasswordResetRequested,
                None,
                None,
            )
            .await;
            record_auth_event("password_reset_request", "sent");
        }
        ResetRequestOutcome::NotSent { .. } => {
            record_auth_event("password_reset_request", "not_sent");
        }
        ResetRequestOutcome::NoAccount => {
            record_auth_event("password_reset_request", "no_account");
        }
    }

    Ok((StatusCode::OK, Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))))
}

/// Request body for completing a reset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Returns the sanitised token and the new password.
fn validate_reset(request: &ResetPasswordRequest) -> Result<(String, String), ApiError> {
    let token = sanitize_opt(request.token.as_deref());
    let new_password = request.new_password.clone().unwrap_or_default();
    let confirm_password = request.confirm_password.as_deref().unwrap_or_default();

    if token.is_empty() {
        return Err(ApiError::validation("Reset token is required"));
    }
    if new_password.is_empty() || confirm_password.is_empty() {
        return Err(ApiError::validation(
            "Password and confirmation are required",
        ));
    }
    if new_password != confirm_password {
        return Err(ApiError::validation("Passwords do not match"));
    }
    check_password_complexity(&new_password).map_err(|e| ApiError::validation(e.to_string()))?;

    Ok((token, new_password))
}

/// Set a new password with a reset token. Every session and remember-me
/// token of the account stops working.
///
/// POST /api/reset_password
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let (token, new_password) = validate_reset(&request)?;

    let auth_service = AuthService::new(state.pool.clone(), state.config.auth.clone());
    let user_id = match auth_service.reset_password(&token, &new_password).await {
        Ok(user_id) => user_id,
        Err(e) => {
            record_auth_event("password_reset", "failure");
            return Err(e.into());
        }
    };

    activity::record(
        &state.pool,
        user_id,
        ActivityKind::PasswordResetCompleted,
        None,
        None,
    )
    .await;
    record_auth_event("password_reset", "success");
    info!(user_id, "Password reset through emailed token");

    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_PASSWORD_MESSAGE))))
}
