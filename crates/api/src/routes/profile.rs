//! Profile routes for the signed-in user: profile and password changes, and
//! avatar upload.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use domain::models::{ActivityKind, User, UserProfile};
use persistence::repositories::{ProfileChanges, RememberTokenRepository, UserRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::image::{self, ImageError};
use shared::password::{hash_password, verify_password};
use shared::validation::{
    check_password_complexity, sanitize_string, validate_full_name, PasswordPolicyError,
};
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AuthUser, ClientIp, JsonBody};
use crate::middleware::RateLimitPolicy;
use crate::services::{activity, sessions};

/// Largest accepted avatar, in bytes.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
/// Largest accepted avatar side, in pixels.
pub const MAX_AVATAR_DIMENSION: u32 = 2000;


/// Extensions that must not appear anywhere in an uploaded file name.
const DANGEROUS_EXTENSIONS: [&str; 27] = [
    "php", "phtml", "php3", "php4", "php5", "php7", "phps", "pht", "phar", "inc", "hta",
    "htaccess", "sh", "exe", "com", "bat", "cgi", "pl", "py", "rb", "java", "jar", "war", "asp",
    "aspx", "jsp", "swf",
];

const FILE_TOO_LARGE: &str = "File too large. Maximum size is 2 MB";

/// Request body for a profile update. Both camelCase and snake_case keys
/// are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(rename = "fullName", alias = "full_name")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "currentPassword", alias = "current_password")]
    pub current_password: Option<String>,
    #[serde(rename = "newPassword", alias = "new_password")]
    pub new_password: Option<String>,
    #[serde(rename = "confirmPassword", alias = "confirm_password")]
    pub confirm_password: Option<String>,
}

/// Sanitised profile fields checked with the shared validators.
#[derive(Debug, Clone, Default, Validate)]
struct ProfileFields {
    #[validate(custom(function = "validate_full_name"))]
    full_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
    #[validate(length(max = 100, message = "Location must be under 100 characters"))]
    location: Option<String>,
    #[validate(length(max = 500, message = "Bio must be under 500 characters"))]
    bio: Option<String>,
}

/// Order in which profile field failures are reported.
const PROFILE_FIELDS: [&str; 4] = ["full_name", "email", "location", "bio"];

/// A requested password change that passed the policy checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub current: String,
    pub new: String,
}

/// Validated profile update.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub changes: ProfileChanges,
    pub password: Option<PasswordChange>,
}

impl ProfileUpdate {
    /// Column names written by this update, as recorded in the activity log.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.changes.full_name.is_some() {
            fields.push("full_name");
        }
        if self.changes.email.is_some() {
            fields.push("email");
        }
        if self.changes.location.is_some() {
            fields.push("location");
        }
        if self.changes.bio.is_some() {
            fields.push("bio");
        }
        if self.password.is_some() {
            fields.push("password_hash");
            fields.push("token_version");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Blank optional text stores NULL.
fn nullable(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl UpdateProfileRequest {
    /// Applies the profile rules in order and reports the first failure.
    /// The current password is verified later against the stored hash.
    pub fn validate(self) -> Result<ProfileUpdate, ApiError> {
        let mut update = ProfileUpdate::default();

        let fields = ProfileFields {
            full_name: self.full_name.as_deref().map(sanitize_string),
            email: self.email.as_deref().map(sanitize_string),
            location: self.location.as_deref().map(sanitize_string),
            bio: self.bio.as_deref().map(sanitize_string),
        };
        fields
            .validate()
            .map_err(|errors| ApiError::from_validation(errors, &PROFILE_FIELDS))?;

        update.changes.full_name = fields.full_name;
        update.changes.email = fields.email;
        update.changes.location = fields.location.map(nullable);
        update.changes.bio = fields.bio.map(nullable);

        let current = self.current_password.unwrap_or_default();
        let new = self.new_password.unwrap_or_default();
        let confirm = self.confirm_password.unwrap_or_default();

        if !current.is_empty() || !new.is_empty() || !confirm.is_empty() {
            if current.is_empty() || new.is_empty() || confirm.is_empty() {
                return Err(ApiError::validation(
                    "Current, new, and confirm password are required to change password",
                ));
            }
            if new != confirm {
                return Err(ApiError::validation(
                    "New password and confirmation do not match",
                ));
            }
            check_password_complexity(&new).map_err(|e| {
                ApiError::validation(match e {
                    PasswordPolicyError::Length => {
                        "New password must be between 12 and 128 characters"
                    }
                    PasswordPolicyError::Complexity => {
                        "New password must include upper, lower, numeric, and special characters"
                    }
                })
            })?;
            update.password = Some(PasswordChange { current, new });
        }

        Ok(update)
    }
}

/// Response carrying a message and the refreshed user.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Update profile fields and optionally the password.
///
/// A password change bumps the token version, which signs the account out
/// everywhere except on the caller's own session.
///
/// POST /api/update_profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiError> {
    let update = request.validate()?;
    let user_id = auth.user.id;

    if let Some(change) = &update.password {
        if !verify_password(&change.current, &auth.user.password_hash)? {
            warn!(user_id, "Profile password change with wrong current password");
            return Err(ApiError::Forbidden(
                "Current password is incorrect".to_string(),
            ));
        }
    }

    if update.is_empty() {
        return Err(ApiError::validation("No valid fields to update"));
    }

    let new_hash = match &update.password {
        Some(change) => Some(hash_password(&change.new)?),
        None => None,
    };

    let mut tx = state.pool.begin().await?;

    if let Some(email) = &update.changes.email {
        if UserRepository::email_taken_by_other(&mut *tx, email, user_id).await? {
            return Err(ApiError::Conflict("Email already in use".to_string()));
        }
    }

    let entity = UserRepository::update_profile(&mut *tx, user_id, &update.changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let mut user = User::from(entity);

    if let Some(hash) = &new_hash {
        user.token_version = UserRepository::update_password(&mut *tx, user_id, hash).await?;
        RememberTokenRepository::delete_for_user(&mut *tx, user_id).await?;
    }

    tx.commit().await?;

    if new_hash.is_some() {
        sessions::refresh_token_version(&state, &auth.session_id, user.token_version).await?;
        info!(user_id, "Password changed from profile");
    }

    activity::record(
        &state.pool,
        user_id,
        ActivityKind::ProfileUpdate,
        None,
        Some(json!({ "fields": update.fields() })),
    )
    .await;
    if new_hash.is_some() {
        activity::record(&state.pool, user_id, ActivityKind::PasswordChange, None, None).await;
    }

    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            message: "Profile updated successfully".to_string(),
            user: UserProfile::from(&user),
        }),
    ))
}

/// Rejects file names that could traverse paths or smuggle an executable
/// extension.
pub fn check_file_name(name: &str) -> Result<(), ApiError> {
    if name.contains('\0') || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ApiError::validation("Invalid file name detected"));
    }

    let lower = name.to_lowercase();
    if lower
        .split('.')
        .any(|part| DANGEROUS_EXTENSIONS.contains(&part))
    {
        return Err(ApiError::validation("Invalid file extension detected"));
    }
    Ok(())
}

/// Checks size, signature and dimensions of avatar bytes. Returns the mime
/// type to store.
pub fn check_avatar(data: &[u8]) -> Result<&'static str, ApiError> {
    if data.is_empty() || data.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::validation(
            "Avatar must be between 1 byte and 2 MB",
        ));
    }

    let info = image::inspect(data).map_err(|e| match e {
        ImageError::UnknownSignature => ApiError::validation(e.to_string()),
        ImageError::Truncated => ApiError::validation("Invalid image file"),
    })?;

    if info.width > MAX_AVATAR_DIMENSION || info.height > MAX_AVATAR_DIMENSION {
        return Err(ApiError::validation(
            "Image dimensions must not exceed 2000x2000 pixels",
        ));
    }
    Ok(info.format.mime())
}

fn multipart_error(status: StatusCode) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::validation(FILE_TOO_LARGE)
    } else {
        ApiError::validation("Avatar upload failed")
    }
}

/// Replace the caller's avatar with the multipart field `avatar`.
///
/// POST /api/upload_avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    auth: AuthUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiError> {
    state.rate_limiter.enforce(RateLimitPolicy::Upload, &ip)?;

    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_AVATAR_BYTES {
        return Err(ApiError::validation(FILE_TOO_LARGE));
    }

    let mut multipart =
        multipart.map_err(|_| ApiError::validation("Avatar upload is required"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e.status()))?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::validation("Avatar upload is required"))?;

    check_file_name(&file_name)?;
    let mime = check_avatar(&data)?;

    let entity = UserRepository::new(state.pool.clone())
        .set_avatar(auth.user.id, &data, mime)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let user = User::from(entity);

    activity::record(&state.pool, user.id, ActivityKind::AvatarUpdate, None, None).await;
    info!(user_id = user.id, bytes = data.len(), mime, "Avatar updated");

    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            message: "Avatar uploaded successfully".to_string(),
            user: UserProfile::from(&user),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::image::fixtures;

    fn message<T: std::fmt::Debug>(result: Result<T, ApiError>) -> String {
        match result {
            Err(ApiError::Validation(msg)) => msg,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn password_change(current: &str, new: &str, confirm: &str) -> UpdateProfileRequest {
        UpdateProfileRequest {
            current_password: Some(current.to_string()),
            new_password: Some(new.to_string()),
            confirm_password: Some(confirm.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_both_key_styles() {
        let camel: UpdateProfileRequest =
            serde_json::from_str(r#"{"fullName":"Ada","newPassword":"x"}"#).unwrap();
        assert_eq!(camel.full_name.as_deref(), Some("Ada"));
        assert_eq!(camel.new_password.as_deref(), Some("x"));

        let snake: UpdateProfileRequest =
            serde_json::from_str(r#"{"full_name":"Ada","current_password":"y"}"#).unwrap();
        assert_eq!(snake.full_name.as_deref(), Some("Ada"));
        assert_eq!(snake.current_password.as_deref(), Some("y"));
    }

    #[test]
    fn test_empty_update() {
        let update = UpdateProfileRequest::default().validate().unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_blank_location_and_bio_clear_columns() {
        let update = UpdateProfileRequest {
            location: Some("   ".to_string()),
            bio: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(update.changes.location, Some(None));
        assert_eq!(update.changes.bio, Some(None));
        assert_eq!(update.fields(), vec!["location", "bio"]);
    }

    #[test]
    fn test_location_and_bio_limits_count_characters() {
        let ok = UpdateProfileRequest {
            location: Some("é".repeat(100)),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let long = UpdateProfileRequest {
            location: Some("a".repeat(101)),
            ..Default::default()
        };
        assert_eq!(
            message(long.validate()),
            "Location must be under 100 characters"
        );

        let long_bio = UpdateProfileRequest {
            bio: Some("b".repeat(501)),
            ..Default::default()
        };
        assert_eq!(message(long_bio.validate()), "Bio must be under 500 characters");
    }

    #[test]
    fn test_invalid_email() {
        let request = UpdateProfileRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert_eq!(message(request.validate()), "Invalid email format");
    }

    #[test]
    fn test_field_failures_reported_in_form_order() {
        let request = UpdateProfileRequest {
            full_name: Some("Ada \"the\" Countess".to_string()),
            email: Some("nope".to_string()),
            bio: Some("b".repeat(501)),
            ..Default::default()
        };
        assert_eq!(
            message(request.validate()),
            "Full name must be 1-30 characters and cannot contain special characters"
        );

        let request = UpdateProfileRequest {
            email: Some("nope".to_string()),
            bio: Some("b".repeat(501)),
            ..Default::default()
        };
        assert_eq!(message(request.validate()), "Invalid email format");
    }

    #[test]
    fn test_password_change_requires_all_three() {
        assert_eq!(
            message(password_change("", "Str0ng&Password", "Str0ng&Password").validate()),
            "Current, new, and confirm password are required to change password"
        );
    }

    #[test]
    fn test_password_change_rules_in_order() {
        assert_eq!(
            message(password_change("old", "Str0ng&Password", "Str0ng&Passw0rd").validate()),
            "New password and confirmation do not match"
        );
        assert_eq!(
            message(password_change("old", "Sh0rt&", "Sh0rt&").validate()),
            "New password must be between 12 and 128 characters"
        );
        assert_eq!(
            message(password_change("old", "nouppercase1!x", "nouppercase1!x").validate()),
            "New password must include upper, lower, numeric, and special characters"
        );
    }

    #[test]
    fn test_password_change_fields() {
        let update = password_change("old", "Str0ng&Password", "Str0ng&Password")
            .validate()
            .unwrap();
        assert_eq!(update.fields(), vec!["password_hash", "token_version"]);
        assert_eq!(
            update.password,
            Some(PasswordChange {
                current: "old".to_string(),
                new: "Str0ng&Password".to_string(),
            })
        );
    }

    #[test]
    fn test_check_file_name() {
        assert!(check_file_name("avatar.png").is_ok());
        assert!(check_file_name("").is_ok());
        assert_eq!(
            message(check_file_name("../etc/passwd")),
            "Invalid file name detected"
        );
        assert_eq!(
            message(check_file_name("a\\b.png")),
            "Invalid file name detected"
        );
        assert_eq!(
            message(check_file_name("shell.PHP.png")),
            "Invalid file extension detected"
        );
        assert_eq!(
            message(check_file_name("payload.jpg.phar")),
            "Invalid file extension detected"
        );
    }

    #[test]
    fn test_check_avatar_accepts_allowed_formats() {
        assert_eq!(check_avatar(&fixtures::png(64, 64)).unwrap(), "image/png");
        assert_eq!(check_avatar(&fixtures::jpeg(64, 64)).unwrap(), "image/jpeg");
        assert_eq!(check_avatar(&fixtures::webp(64, 64)).unwrap(), "image/webp");
    }

    #[test]
    fn test_check_avatar_rejections() {
        assert_eq!(
            message(check_avatar(&[])),
            "Avatar must be between 1 byte and 2 MB"
        );
        assert_eq!(
            message(check_avatar(b"GIF89a............")),
            "Invalid image file. File signature does not match image format."
        );
        assert_eq!(
            message(check_avatar(&fixtures::png(2001, 10))),
            "Image dimensions must not exceed 2000x2000 pixels"
        );
    }

    #[test]
    fn test_multipart_error_mapping() {
        assert_eq!(
            message::<()>(Err(multipart_error(StatusCode::PAYLOAD_TOO_LARGE))),
            FILE_TOO_LARGE
        );
        assert_eq!(
            message::<()>(Err(multipart_error(StatusCode::BAD_REQUEST))),
            "Avatar upload failed"
        );
    }
}
