//! Raw image endpoints for user avatars and competition banners.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use persistence::entities::ImageBlobEntity;
use persistence::repositories::{CompetitionRepository, UserRepository};
use serde::Deserialize;
use shared::image::is_allowed_mime;

use crate::app::AppState;
use crate::error::ApiError;

const IMAGE_CACHE_CONTROL: &str = "public, max-age=3600";
const IMAGE_CSP: &str = "default-src 'self';";

/// Query string of the image endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageQuery {
    pub id: Option<String>,
}

impl ImageQuery {
    /// Positive numeric id, if the query carries one.
    fn positive_id(&self) -> Option<i32> {
        self.id
            .as_deref()
            .and_then(|id| id.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
    }
}

/// Render stored image bytes with their content type and caching headers.
fn image_response(blob: Option<ImageBlobEntity>) -> Result<Response, ApiError> {
    let blob = blob.ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;
    let mime = blob
        .mime
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !is_allowed_mime(&mime) {
        return Err(ApiError::validation("Invalid image type"));
    }
    let content_type = HeaderValue::from_str(&mime)
        .map_err(|_| ApiError::validation("Invalid image type"))?;

    let mut response = (StatusCode::OK, blob.data).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMAGE_CACHE_CONTROL),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(IMAGE_CSP),
    );
    Ok(response)
}

/// GET /api/user_avatar?id=N
pub async fn user_avatar(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let id = query
        .positive_id()
        .ok_or_else(|| ApiError::validation("Invalid user id"))?;

    let blob = UserRepository::new(state.pool.clone()).find_avatar(id).await?;
    image_response(blob)
}

/// GET /api/competition_banner?id=N
pub async fn competition_banner(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let id = query
        .positive_id()
        .ok_or_else(|| ApiError::validation("Invalid competition id"))?;

    let blob = CompetitionRepository::new(state.pool.clone())
        .find_banner(id)
        .await?;
    image_response(blob)
}
