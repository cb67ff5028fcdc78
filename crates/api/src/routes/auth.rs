//! Authentication routes: account creation, sign in, sign out, the session
//! lookup and the password strength meter.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use domain::models::{ActivityKind, UserProfile};
use domain::services::lockout::{minutes_remaining, seconds_remaining};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use shared::strength::{self, PasswordStrength};
use shared::validation::{
    sanitize_opt, validate_full_name, validate_password, validate_signup_email,
    validate_username,
};
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::client_ip::{user_agent, ClientIp};
use crate::extractors::json::parse_json_body;
use crate::extractors::JsonBody;
use crate::middleware::metrics::record_auth_event;
use crate::middleware::RateLimitPolicy;
use crate::routes::{is_truthy, with_cookies};
use crate::services::activity;
use crate::services::auth::{AuthError, AuthService, SigninAttempt, Signup};
use crate::services::{remember_me, sessions};

/// Longest accepted sign-in password, in bytes.
const SIGNIN_PASSWORD_MAX_LEN: usize = 128;
/// Longest accepted sign-in identifier, in bytes.
const SIGNIN_IDENTIFIER_MAX_LEN: usize = 255;

/// Request body for account creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Sanitised signup fields. Only handed out after every rule passed.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ValidSignup {
    #[validate(custom(function = "validate_full_name"))]
    pub full_name: String,
    #[validate(custom(function = "validate_signup_email"))]
    pub email: String,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

/// Order in which signup rule failures are reported.
const SIGNUP_FIELDS: [&str; 4] = ["full_name", "email", "username", "password"];

impl SignupRequest {
    /// Applies the signup rules in order and reports the first failure.
    pub fn validate(self) -> Result<ValidSignup, ApiError> {
        let full_name = sanitize_opt(self.full_name.as_deref());
        let email = sanitize_opt(self.email.as_deref());
        let username = sanitize_opt(self.username.as_deref());
        let password = self.password.unwrap_or_default();
        let confirm_password = self.confirm_password.unwrap_or_default();

        if full_name.is_empty()
            || email.is_empty()
            || username.is_empty()
            || password.is_empty()
            || confirm_password.is_empty()
        {
            return Err(ApiError::validation("All fields are required"));
        }
        let signup = ValidSignup {
            full_name,
            email,
            username,
            password,
        };
        signup
            .validate()
            .map_err(|errors| ApiError::from_validation(errors, &SIGNUP_FIELDS))?;
        if signup.password != confirm_password {
            return Err(ApiError::validation("Passwords do not match"));
        }

        Ok(signup)
    }
}

/// Simple message response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Create a regular account.
///
/// POST /api/signup
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    state.rate_limiter.enforce(RateLimitPolicy::Signup, &ip)?;

    let request: SignupRequest = parse_json_body(&body)?;
    let signup = request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.config.auth.clone());
    let user = auth_service
        .signup(Signup {
            full_name: &signup.full_name,
            email: &signup.email,
            username: &signup.username,
            password: &signup.password,
        })
        .await
        .map_err(|e| {
            if matches!(e, AuthError::AccountExists) {
                warn!("Signup rejected: email or username already registered");
            }
            record_auth_event("signup", "failure");
            ApiError::from(e)
        })?;

    activity::record(&state.pool, user.id, ActivityKind::Signup, None, None).await;
    record_auth_event("signup", "success");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Account created successfully")),
    ))
}

/// Request body for sign in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub identifier: Option<String>,
    pub password: Option<String>,
    /// Any truthy value asks for a persistent login.
    pub remember_me: Option<JsonValue>,
}

/// Checks presence and size of the sign-in fields. Returns the sanitised
/// identifier and the raw password.
fn validate_signin(request: &SigninRequest) -> Result<(String, String), ApiError> {
    let identifier = sanitize_opt(request.identifier.as_deref());
    let password = request.password.clone().unwrap_or_default();

    if identifier.is_empty() || password.is_empty() {
        return Err(ApiError::validation(
            "Email/username and password are required",
        ));
    }
    if password.len() > SIGNIN_PASSWORD_MAX_LEN {
        return Err(ApiError::validation("Password too long"));
    }
    if identifier.len() > SIGNIN_IDENTIFIER_MAX_LEN {
        return Err(ApiError::validation("Identifier too long"));
    }
    Ok((identifier, password))
}

/// Response body for a successful sign in.
#[derive(Debug, Clone, Serialize)]
pub struct SigninResponse {
    pub message: String,
    pub user: UserProfile,
    pub csrf_token: String,
}

/// Sign in with email or username.
///
/// POST /api/signin
pub async fn signin(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.rate_limiter.enforce(RateLimitPolicy::SigninIp, &ip)?;

    let request: SigninRequest = parse_json_body(&body)?;
    let (identifier, password) = validate_signin(&request)?;

    let auth_service = AuthService::new(state.pool.clone(), state.config.auth.clone());

    match auth_service.active_lock(&identifier).await {
        Ok(Some(until)) => {
            let now = Utc::now();
            record_auth_event("signin", "locked");
            return Err(ApiError::rate_limited(
                format!(
                    "Account is temporarily locked due to too many failed login attempts. \
                     Please try again in {} minutes.",
                    minutes_remaining(until, now)
                ),
                seconds_remaining(until, now) as u64,
            ));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Account lock lookup failed"),
    }

    state
        .rate_limiter
        .enforce(RateLimitPolicy::SigninAccount, &identifier.to_lowercase())?;

    let attempt = SigninAttempt {
        identifier: &identifier,
        password: &password,
        ip_address: &ip,
        user_agent: user_agent(&headers),
    };
    let user = match auth_service.verify_credentials(&attempt).await {
        Ok(user) => user,
        Err(e) => {
            record_auth_event("signin", "failure");
            return Err(e.into());
        }
    };

    if let Err(e) = auth_service.clear_failures(&user, &identifier).await {
        warn!(user_id = user.id, error = %e, "Failed to clear login failures");
    }

    let previous = sessions::session_id_from_headers(&state, &headers);
    let issued = sessions::establish_for_user(&state, previous.as_deref(), user.clone()).await?;
    let mut cookies = vec![issued.cookie];

    activity::record(
        &state.pool,
        user.id,
        ActivityKind::Signin,
        None,
        Some(json!({ "identifier": identifier })),
    )
    .await;

    if is_truthy(request.remember_me.as_ref()) {
        cookies.push(remember_me::issue(&state, user.id).await?);
    }

    record_auth_event("signin", "success");
    info!(user_id = user.id, "User signed in");

    let response = SigninResponse {
        message: "Signed in successfully".to_string(),
        user: UserProfile::from(&user),
        csrf_token: issued.session.csrf_token,
    };
    Ok(with_cookies((StatusCode::OK, Json(response)), &cookies))
}

/// Sign out: revoke the remember-me token, clear both cookies and destroy
/// the session.
///
/// POST /api/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = remember_me::revoke(&state, &headers).await {
        warn!(error = %e, "Failed to revoke remember-me token");
    }
    if let Some(session_id) = sessions::session_id_from_headers(&state, &headers) {
        if let Err(e) = sessions::destroy(&state, &session_id).await {
            warn!(error = %e, "Failed to destroy session");
        }
    }
    record_auth_event("logout", "success");

    let mut response = (
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    )
        .into_response();
    state.cookies.add_clear_cookies(response.headers_mut());
    response
}

/// Response body of the current-user lookup.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    pub authenticated: bool,
    pub user: Option<UserProfile>,
    pub csrf_token: String,
}

/// Report the signed-in user, if any, and hand out the session's CSRF token.
/// Starts an anonymous session when the request has none.
///
/// GET /api/get_current_user
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let resolved = sessions::ensure(&state, &headers).await?;
    let user = resolved.user().map(UserProfile::from);
    let csrf_token = resolved
        .session
        .as_ref()
        .map(|s| s.csrf_token.clone())
        .unwrap_or_default();

    let response = CurrentUserResponse {
        authenticated: user.is_some(),
        user,
        csrf_token,
    };
    Ok(with_cookies(Json(response), &resolved.set_cookies))
}

/// Request body for the strength meter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordStrengthRequest {
    pub password: Option<String>,
}

/// Score a candidate password. Public and CSRF-exempt.
///
/// POST /api/check_password_strength
pub async fn check_password_strength(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(request): JsonBody<PasswordStrengthRequest>,
) -> Result<Response, ApiError> {
    state
        .rate_limiter
        .enforce(RateLimitPolicy::PasswordCheck, &ip)?;

    let password = request.password.unwrap_or_default();
    if password.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password is required", "score": 0 })),
        )
            .into_response());
    }

    let result: PasswordStrength = strength::evaluate(&password);
    Ok(Json(result).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_signup() -> SignupRequest {
        SignupRequest {
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@gmail.com".to_string()),
            username: Some("ada_l".to_string()),
            password: Some("Analytical#Engine1".to_string()),
            confirm_password: Some("Analytical#Engine1".to_string()),
        }
    }

    fn signin_request(identifier: &str, password: &str) -> SigninRequest {
        SigninRequest {
            identifier: Some(identifier.to_string()),
            password: Some(password.to_string()),
            remember_me: None,
        }
    }

    fn error_message(result: Result<ValidSignup, ApiError>) -> String {
        match result {
            Err(ApiError::Validation(msg)) => msg,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_valid_signup_is_sanitised() {
        let mut request = valid_signup();
        request.full_name = Some("  Ada Lovelace \u{0007}".to_string());
        let signup = request.validate().unwrap();
        assert_eq!(signup.full_name, "Ada Lovelace");
        assert_eq!(signup.email, "ada@gmail.com");
    }

    #[test]
    fn test_signup_requires_all_fields() {
        let mut request = valid_signup();
        request.confirm_password = None;
        assert_eq!(error_message(request.validate()), "All fields are required");

        let request = SignupRequest {
            full_name: Some("   ".to_string()),
            ..valid_signup()
        };
        assert_eq!(error_message(request.validate()), "All fields are required");
    }

    #[test]
    fn test_signup_domain_restriction() {
        let request = SignupRequest {
            email: Some("ada@example.com".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Registration is restricted to @gmail.com or @binus.ac.id emails only"
        );

        let request = SignupRequest {
            email: Some("ada@BINUS.ac.id".to_string()),
            ..valid_signup()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_signup_invalid_email_checked_before_domain() {
        let request = SignupRequest {
            email: Some("not-an-email".to_string()),
            ..valid_signup()
        };
        assert_eq!(error_message(request.validate()), "Invalid email format");
    }

    #[test]
    fn test_signup_username_rule() {
        let request = SignupRequest {
            username: Some("ad".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Username must be 3-30 characters and alphanumeric/underscore only"
        );
    }

    #[test]
    fn test_signup_password_policy_precedes_confirmation() {
        let request = SignupRequest {
            password: Some("short".to_string()),
            confirm_password: Some("different".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Password must be between 12 and 128 characters"
        );

        let request = SignupRequest {
            password: Some("alllowercase1!".to_string()),
            confirm_password: Some("alllowercase1!".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Password must include upper, lower, numeric, and special characters"
        );
    }

    #[test]
    fn test_signup_reports_first_rule_in_field_order() {
        let request = SignupRequest {
            email: Some("ada@example.com".to_string()),
            username: Some("a!".to_string()),
            password: Some("weak".to_string()),
            confirm_password: Some("weak".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Registration is restricted to @gmail.com or @binus.ac.id emails only"
        );

        let request = SignupRequest {
            full_name: Some("<script>".to_string()),
            email: Some("nope".to_string()),
            ..valid_signup()
        };
        assert_eq!(
            error_message(request.validate()),
            "Full name must be 1-30 characters and cannot contain special characters"
        );
    }

    #[test]
    fn test_signup_password_mismatch() {
        let request = SignupRequest {
            confirm_password: Some("Analytical#Engine2".to_string()),
            ..valid_signup()
        };
        assert_eq!(error_message(request.validate()), "Passwords do not match");
    }

    #[test]
    fn test_validate_signin() {
        let (identifier, password) =
            validate_signin(&signin_request("  ada@gmail.com ", "secret")).unwrap();
        assert_eq!(identifier, "ada@gmail.com");
        assert_eq!(password, "secret");

        let missing = validate_signin(&signin_request("", "secret")).unwrap_err();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let long_password = "x".repeat(SIGNIN_PASSWORD_MAX_LEN + 1);
        match validate_signin(&signin_request("ada", &long_password)) {
            Err(ApiError::Validation(msg)) => assert_eq!(msg, "Password too long"),
            other => panic!("unexpected {other:?}"),
        }

        let long_identifier = "a".repeat(SIGNIN_IDENTIFIER_MAX_LEN + 1);
        match validate_signin(&signin_request(&long_identifier, "secret")) {
            Err(ApiError::Validation(msg)) => assert_eq!(msg, "Identifier too long"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_signin_request_accepts_loose_remember_me() {
        let request: SigninRequest =
            serde_json::from_str(r#"{"identifier":"ada","password":"x","rememberMe":"1"}"#)
                .unwrap();
        assert!(is_truthy(request.remember_me.as_ref()));

        let request: SigninRequest =
            serde_json::from_str(r#"{"identifier":"ada","password":"x"}"#).unwrap();
        assert!(!is_truthy(request.remember_me.as_ref()));
    }

    #[test]
    fn test_current_user_response_shape() {
        let json = serde_json::to_value(CurrentUserResponse {
            authenticated: false,
            user: None,
            csrf_token: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"authenticated": false, "user": null, "csrf_token": "abc"})
        );
    }
}
