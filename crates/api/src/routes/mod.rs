//! HTTP route handlers.

pub mod activity;
pub mod admin;
pub mod auth;
pub mod competitions;
pub mod health;
pub mod media;
pub mod password_reset;
pub mod profile;

use axum::response::{IntoResponse, Response};
use serde_json::Value as JsonValue;

use crate::services::cookies::append_set_cookie;

/// Attach `Set-Cookie` headers to a response.
pub(crate) fn with_cookies(response: impl IntoResponse, cookies: &[String]) -> Response {
    let mut response = response.into_response();
    for cookie in cookies {
        append_set_cookie(response.headers_mut(), cookie);
    }
    response
}

/// Reads an id-like field that clients send either as a JSON number or as a
/// numeric string. Anything else reads as 0.
pub(crate) fn int_field(value: Option<&JsonValue>) -> i64 {
    match value {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(JsonValue::String(s)) => s.trim().parse().unwrap_or(0),
        Some(JsonValue::Bool(true)) => 1,
        _ => 0,
    }
}

/// Reads a text field sent as a string or number. `null` and other shapes
/// read as absent.
pub(crate) fn text_field(value: Option<&JsonValue>) -> Option<String> {
    match value {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Loose truthiness for checkbox-like flags: `true`, non-zero numbers and
/// strings other than `""`/`"0"`.
pub(crate) fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(JsonValue::String(s)) => !s.is_empty() && s != "0",
        Some(JsonValue::Array(items)) => !items.is_empty(),
        Some(JsonValue::Object(map)) => !map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use serde_json::json;

    #[test]
    fn test_int_field() {
        assert_eq!(int_field(Some(&json!(7))), 7);
        assert_eq!(int_field(Some(&json!("12"))), 12);
        assert_eq!(int_field(Some(&json!(" 3 "))), 3);
        assert_eq!(int_field(Some(&json!(2.9))), 2);
        assert_eq!(int_field(Some(&json!("abc"))), 0);
        assert_eq!(int_field(Some(&json!(null))), 0);
        assert_eq!(int_field(None), 0);
    }

    #[test]
    fn test_text_field() {
        assert_eq!(text_field(Some(&json!("team"))), Some("team".to_string()));
        assert_eq!(text_field(Some(&json!(1337))), Some("1337".to_string()));
        assert_eq!(text_field(Some(&json!(null))), None);
        assert_eq!(text_field(Some(&json!(["x"]))), None);
        assert_eq!(text_field(None), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!("on"))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!("0"))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_with_cookies_appends_each() {
        let cookies = vec!["a=1; Path=/".to_string(), "b=2; Path=/".to_string()];
        let response = with_cookies(StatusCode::OK, &cookies);
        let values: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values, cookies);
    }
}
