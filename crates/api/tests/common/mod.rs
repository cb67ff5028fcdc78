//! Common test utilities for integration tests.
//!
//! Suites run against a real PostgreSQL database named by
//! `TEST_DATABASE_URL`. When the variable is unset every test returns early.

// Not every suite uses every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ctf_portal_api::{app::create_app, config::Config};
use fake::{faker::lorem::en::Word, Fake};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "Str0ng&Password!";
pub const TEST_CLIENT_IP: &str = "203.0.113.7";

/// Connect to the test database and apply migrations, or `None` when no
/// database is configured.
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Test configuration: trusted proxy headers, generous rate limits and no
/// sign-in delays.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to build test config")
}

/// Create a test application router.
pub fn create_test_app(pool: PgPool) -> Router {
    create_app(test_config(), pool)
}

/// Account data for a fresh user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

impl TestUser {
    pub fn new() -> Self {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let word: String = Word().fake();
        Self {
            full_name: format!("Tester {word}"),
            email: format!("ctf_{}@gmail.com", &tag[..16]),
            username: format!("u_{}", &tag[..20]),
            password: TEST_PASSWORD.to_string(),
        }
    }

    pub fn signup_body(&self) -> Value {
        json!({
            "fullName": self.full_name,
            "email": self.email,
            "username": self.username,
            "password": self.password,
            "confirmPassword": self.password,
        })
    }
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new()
    }
}

/// Cookie header and CSRF token of a signed-in browser.
#[derive(Debug, Clone)]
pub struct Session {
    pub cookie: String,
    pub csrf_token: String,
    pub user_id: i64,
}

/// Build a request with an optional JSON body and session.
pub fn json_request(
    method: Method,
    uri: &str,
    body: Option<Value>,
    session: Option<&Session>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", TEST_CLIENT_IP);

    if let Some(session) = session {
        builder = builder
            .header(header::COOKIE, &session.cookie)
            .header("x-csrf-token", &session.csrf_token);
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sign-in request sent with the given User-Agent header.
pub fn signin_request(identifier: &str, password: &str, user_agent: &str) -> Request<Body> {
    let mut request = json_request(
        Method::POST,
        "/api/signin",
        Some(json!({
            "identifier": identifier,
            "password": password,
        })),
        None,
    );
    request.headers_mut().insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(user_agent).unwrap(),
    );
    request
}

/// Multipart upload of a single file field.
pub fn multipart_request(
    uri: &str,
    field: &str,
    file_name: &str,
    data: &[u8],
    session: &Session,
) -> Request<Body> {
    let boundary = "----ctfportalboundary";
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-forwarded-for", TEST_CLIENT_IP)
        .header(header::COOKIE, &session.cookie)
        .header("x-csrf-token", &session.csrf_token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Value of the named cookie in a Cookie header string.
pub fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split("; ")
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Parse a JSON response body, or `Value::Null` when it is not JSON.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Collect the `name=value` pairs of every Set-Cookie header into one
/// Cookie header value.
pub fn cookie_header(response: &axum::response::Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Create the account through the signup endpoint.
pub async fn signup(app: &Router, user: &TestUser) {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/signup",
            Some(user.signup_body()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Sign in and capture the session cookie and CSRF token.
pub async fn signin(app: &Router, user: &TestUser) -> Session {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/signin",
            Some(json!({
                "identifier": user.username,
                "password": user.password,
            })),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = cookie_header(&response);
    let body = parse_response_body(response).await;
    Session {
        cookie,
        csrf_token: body["csrf_token"].as_str().unwrap().to_string(),
        user_id: body["user"]["id"].as_i64().unwrap(),
    }
}

/// Sign up and sign in a fresh user.
pub async fn signed_in_user(app: &Router) -> (TestUser, Session) {
    let user = TestUser::new();
    signup(app, &user).await;
    let session = signin(app, &user).await;
    (user, session)
}

/// Sign up a fresh user, promote them to admin and sign in.
pub async fn signed_in_admin(app: &Router, pool: &PgPool) -> (TestUser, Session) {
    let user = TestUser::new();
    signup(app, &user).await;
    promote_to_admin(pool, &user.username).await;
    let session = signin(app, &user).await;
    (user, session)
}

pub async fn promote_to_admin(pool: &PgPool, username: &str) {
    let result = sqlx::query("UPDATE users SET role = 'admin' WHERE username = $1")
        .bind(username)
        .execute(pool)
        .await;
    tokio_test::assert_ok!(&result);
}

/// Schedule for a competition whose registration is open.
pub struct TestSchedule {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl TestSchedule {
    pub fn open() -> Self {
        let now = Utc::now();
        Self {
            start: now + Duration::days(10),
            end: now + Duration::days(11),
            deadline: now + Duration::days(5),
        }
    }

    pub fn closed() -> Self {
        let now = Utc::now();
        Self {
            start: now + Duration::days(10),
            end: now + Duration::days(11),
            deadline: now - Duration::days(1),
        }
    }
}

/// Insert a competition directly and return its id.
pub async fn insert_competition(
    pool: &PgPool,
    schedule: TestSchedule,
    max_participants: Option<i32>,
) -> i32 {
    let name = format!("CTF {}", uuid::Uuid::new_v4().simple());
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO competitions \
            (name, start_date, end_date, registration_deadline, max_participants, category, \
             banner, banner_mime, banner_updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'web', $6, 'image/png', NOW()) \
         RETURNING id",
    )
    .bind(&name)
    .bind(schedule.start)
    .bind(schedule.end)
    .bind(schedule.deadline)
    .bind(max_participants)
    .bind(shared::image::fixtures::png(4, 4))
    .fetch_one(pool)
    .await
    .expect("Failed to insert competition");
    id
}

/// Base64 PNG suitable for `bannerData`.
pub fn banner_png() -> String {
    STANDARD.encode(shared::image::fixtures::png(16, 9))
}

pub async fn delete_competition(pool: &PgPool, id: i32) {
    sqlx::query("DELETE FROM competitions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .ok();
}

/// Remove a user; sessions, tokens, registrations and activity cascade.
pub async fn delete_user(pool: &PgPool, user: &TestUser) {
    sqlx::query("DELETE FROM users WHERE username = $1")
        .bind(&user.username)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM failed_login_attempts WHERE identifier = $1 OR identifier = $2")
        .bind(&user.username)
        .bind(&user.email)
        .execute(pool)
        .await
        .ok();
}
