//! Cookie helper module for session and remember-me cookies.
//!
//! Provides utilities for setting, reading, and clearing the HttpOnly
//! cookies that carry the web session id and the remember-me token.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};

use crate::config::{SecurityConfig, SessionConfig};

/// Cookie helper for managing HttpOnly authentication cookies.
#[derive(Debug, Clone)]
pub struct CookieHelper {
    session_name: String,
    session_max_age: i64,
    remember_name: String,
    remember_max_age: i64,
    secure: bool,
}

impl CookieHelper {
    /// Create a new cookie helper with configuration.
    pub fn new(session: &SessionConfig, security: &SecurityConfig) -> Self {
        Self {
            session_name: session.cookie_name.clone(),
            session_max_age: session.ttl_secs,
            remember_name: session.remember_cookie_name.clone(),
            remember_max_age: session.remember_ttl_secs,
            secure: security.secure_cookies,
        }
    }

    /// Build a Set-Cookie header value for the session token.
    pub fn build_session_cookie(&self, token: &str) -> String {
        self.build_cookie(&self.session_name, token, self.session_max_age)
    }

    /// Build a Set-Cookie header value for a remember-me `selector:validator` pair.
    pub fn build_remember_cookie(&self, selector: &str, validator: &str) -> String {
        let value = format!("{}:{}", selector, validator);
        self.build_cookie(&self.remember_name, &value, self.remember_max_age)
    }

    /// Build a Set-Cookie header to clear the session cookie.
    pub fn build_clear_session_cookie(&self) -> String {
        self.build_clear_cookie(&self.session_name)
    }

    /// Build a Set-Cookie header to clear the remember-me cookie.
    pub fn build_clear_remember_cookie(&self) -> String {
        self.build_clear_cookie(&self.remember_name)
    }

    /// Add clear cookies to a HeaderMap (for logout).
    pub fn add_clear_cookies(&self, headers: &mut HeaderMap) {
        append_set_cookie(headers, &self.build_clear_remember_cookie());
        append_set_cookie(headers, &self.build_clear_session_cookie());
    }

    /// Extract the session token from request headers.
    pub fn extract_session_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        extract_cookie(headers, &self.session_name).filter(|v| !v.is_empty())
    }

    /// Extract the remember-me `(selector, validator)` pair from request headers.
    ///
    /// Malformed values (anything other than exactly two non-empty parts)
    /// are ignored.
    pub fn extract_remember_token<'a>(&self, headers: &'a HeaderMap) -> Option<(&'a str, &'a str)> {
        let raw = extract_cookie(headers, &self.remember_name)?;
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(selector), Some(validator), None)
                if !selector.is_empty() && !validator.is_empty() =>
            {
                Some((selector, validator))
            }
            _ => None,
        }
    }

    /// Whether the request carried a remember-me cookie at all.
    pub fn has_remember_cookie(&self, headers: &HeaderMap) -> bool {
        extract_cookie(headers, &self.remember_name).is_some()
    }

    /// Build a cookie string with all security attributes.
    fn build_cookie(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!("{}={}; Path=/; Max-Age={}", name, value, max_age);

        cookie.push_str("; HttpOnly");

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str("; SameSite=Lax");

        cookie
    }

    /// Build a cookie string that clears an existing cookie.
    fn build_clear_cookie(&self, name: &str) -> String {
        let mut cookie = format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            name
        );

        cookie.push_str("; HttpOnly");

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str("; SameSite=Lax");

        cookie
    }
}

/// Append a Set-Cookie header, skipping values that are not valid header text.
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(SET_COOKIE, value);
    }
}

/// Extract a cookie value from request headers by name.
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookie_header| cookie_header.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (cookie_name, cookie_value) = cookie.split_once('=')?;
            if cookie_name == name {
                Some(cookie_value)
            } else {
                None
            }
        })
}
