//! JSON request body extractor.
//!
//! Like `axum::Json`, but an empty body reads as `{}` so handlers report
//! their own "field required" messages, the payload must be a JSON object,
//! and rejections use the API's error body.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::ApiError;

const INVALID_JSON: &str = "Invalid JSON payload.";

/// Deserialized JSON object body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await?;
        parse_json_body(&bytes).map(JsonBody)
    }
}

/// Parse a request body into `T`, treating an empty body as `{}`.
pub fn parse_json_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let value = if bytes.iter().all(u8::is_ascii_whitespace) {
        JsonValue::Object(Default::default())
    } else {
        serde_json::from_slice::<JsonValue>(bytes)
            .map_err(|_| ApiError::validation(INVALID_JSON))?
    };

    if !value.is_object() {
        return Err(ApiError::validation(INVALID_JSON));
    }

    serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "JSON body did not match the expected shape");
        ApiError::validation(INVALID_JSON)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default)]
    struct Body {
        #[serde(default)]
        name: String,
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::Validation(msg) => msg,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        let body: Body = parse_json_body(b"").unwrap();
        assert_eq!(body.name, "");
        let body: Body = parse_json_body(b"  \n").unwrap();
        assert_eq!(body.name, "");
    }

    #[test]
    fn test_object_body() {
        let body: Body = parse_json_body(br#"{"name":"grace"}"#).unwrap();
        assert_eq!(body.name, "grace");
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_json_body::<Body>(b"{not json").unwrap_err();
        assert_eq!(message(err), INVALID_JSON);
    }

    #[test]
    fn test_non_object_rejected() {
        for raw in [&b"[\"grace\"]"[..], b"\"grace\"", b"42", b"null"] {
            let err = parse_json_body::<Body>(raw).unwrap_err();
            assert_eq!(message(err), INVALID_JSON);
        }
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let err = parse_json_body::<Body>(br#"{"name": 5}"#).unwrap_err();
        assert_eq!(message(err), INVALID_JSON);
    }
}
