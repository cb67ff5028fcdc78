use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    admin_rate_limit, json_method_not_allowed, metrics_handler, metrics_middleware,
    require_admin, require_user, security_headers_middleware, trace_id, RateLimiterState,
    CSRF_HEADER, REQUEST_ID_HEADER,
};
use crate::routes::{
    activity, admin, auth, competitions, health, media, password_reset, profile,
};
use crate::services::cookies::CookieHelper;
use crate::services::email::EmailService;

/// Body cap for the avatar upload route: the 2 MB image plus multipart framing.
const AVATAR_UPLOAD_BODY_LIMIT: usize = profile::MAX_AVATAR_BYTES + 64 * 1024;

/// Body cap for competition create/update, whose JSON carries a base64 banner
/// of up to 5 MB decoded.
const COMPETITION_BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiterState>,
    pub email: EmailService,
    pub cookies: CookieHelper,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let rate_limiter = Arc::new(RateLimiterState::new(&config.rate_limits));
        let email = EmailService::new(
            config.email.clone(),
            config.base_url(),
            config.auth.reset_token_ttl_secs,
        );
        let cookies = CookieHelper::new(&config.session, &config.security);

        Self {
            pool,
            config: Arc::new(config),
            rate_limiter,
            email,
            cookies,
        }
    }
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    build_router(AppState::new(config, pool))
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Signed-in users; state-changing methods also need the CSRF header.
    let user_routes = Router::new()
        .route("/api/update_profile", post(profile::update_profile))
        .route(
            "/api/upload_avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/register_competition",
            post(competitions::register_competition),
        )
        .route("/api/my_competitions", get(competitions::my_competitions))
        .route("/api/recent_activity", get(activity::recent_activity))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let competition_admin_routes = Router::new()
        .route(
            "/api/admin/manage_competitions",
            get(admin::list_competitions)
                .post(admin::create_competition)
                .put(admin::update_competition)
                .delete(admin::delete_competition)
                .layer(DefaultBodyLimit::max(COMPETITION_BODY_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // The admin rate limit is the outer layer so it runs before the session check.
    let registration_admin_routes = Router::new()
        .route(
            "/api/admin/verify_payments",
            get(admin::payments_awaiting_review).post(admin::verify_payment),
        )
        .route(
            "/api/admin/get_registrations",
            get(admin::get_registrations),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_rate_limit,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/signup", post(auth::signup))
        .route("/api/signin", post(auth::signin))
        .route("/api/logout", post(auth::logout))
        .route("/api/get_current_user", get(auth::get_current_user))
        .route(
            "/api/check_password_strength",
            post(auth::check_password_strength),
        )
        .route("/api/forgot_password", post(password_reset::forgot_password))
        .route("/api/reset_password", post(password_reset::reset_password))
        .route("/api/user_avatar", get(media::user_avatar))
        .route("/api/competition_banner", get(media::competition_banner))
        .route("/api/competitions", get(competitions::list_competitions));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(competition_admin_routes)
        .merge(registration_admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn(json_method_not_allowed))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}

/// Without configured origins the API is only used same-origin, so any origin
/// may read it but no credentials are shared cross-site.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(CSRF_HEADER)])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(overrides: &[(&str, &str)]) -> Config {
        let mut all = vec![("database.url", "postgres://localhost/test")];
        all.extend_from_slice(overrides);
        Config::load_for_test(&all).expect("config")
    }

    #[test]
    fn test_body_limits() {
        assert!(AVATAR_UPLOAD_BODY_LIMIT > profile::MAX_AVATAR_BYTES);
        // 5 MB of image bytes is about 6.7 MB once base64 encoded.
        assert!(COMPETITION_BODY_LIMIT > 5 * 1024 * 1024 * 4 / 3);
    }

    #[test]
    fn test_cors_layer_builds_for_configured_origins() {
        let config = test_config(&[("security.cors_origins", "https://ctf.example")]);
        let _layer = cors_layer(&config);
    }

    #[tokio::test]
    async fn test_app_state_wires_services() {
        let config = test_config(&[("email.enabled", "true")]);
        let Some(pool) = crate::test_support::lazy_test_pool() else {
            return;
        };
        let state = AppState::new(config, pool);

        assert!(state.email.is_enabled());
        assert!(state
            .rate_limiter
            .rule(crate::middleware::RateLimitPolicy::Admin)
            .is_some());
    }
}
