//! Gives axum's bare 405 responses the API's JSON error body.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Replace the empty body of a router-generated 405 with
/// `{"error":"Method Not Allowed"}`, keeping the `Allow` header.
///
/// Responses that already carry a content type came from a handler and are
/// passed through untouched.
pub async fn json_method_not_allowed(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method Not Allowed" })),
    )
        .into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, middleware, routing::post, Router};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/api/signin", post(|| async { "ok" }))
            .layer(middleware::from_fn(json_method_not_allowed))
    }

    #[tokio::test]
    async fn test_wrong_method_gets_json_body() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/signin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response.headers()[header::ALLOW].to_str().unwrap().to_string();
        assert!(allow.contains("POST"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_allowed_method_untouched() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/signin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}
