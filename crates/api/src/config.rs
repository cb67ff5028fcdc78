use chrono::FixedOffset;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Email service configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Admin bootstrap configuration
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Cap on JSON request bodies.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            acquire_timeout: Duration::from_secs(config.connect_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Mark session and remember-me cookies `Secure`.
    #[serde(default)]
    pub secure_cookies: bool,

    /// Take the client address from `X-Forwarded-For`. Only enable behind a
    /// proxy that overwrites the header.
    #[serde(default)]
    pub trust_proxy_headers: bool,

    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Public URL of the front end, used in emailed links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Offset used to interpret naive admin dates and to render activity
    /// timestamps, e.g. `+07:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Parsed application offset. Falls back to UTC if the value is invalid,
    /// which `Config::validate` rejects at startup.
    pub fn offset(&self) -> FixedOffset {
        parse_utc_offset(&self.utc_offset).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_cookie")]
    pub cookie_name: String,

    #[serde(default = "default_session_ttl")]
    pub ttl_secs: i64,

    #[serde(default = "default_remember_cookie")]
    pub remember_cookie_name: String,

    #[serde(default = "default_remember_ttl")]
    pub remember_ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie(),
            ttl_secs: default_session_ttl(),
            remember_cookie_name: default_remember_cookie(),
            remember_ttl_secs: default_remember_ttl(),
        }
    }
}

/// A fixed-window style limit: at most `max` hits per `window_secs`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn new(max: u32, window_secs: u64) -> Self {
        Self { max, window_secs }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_signin_ip_limit")]
    pub signin_ip: RateLimitRule,
    #[serde(default = "default_signin_account_limit")]
    pub signin_account: RateLimitRule,
    #[serde(default = "default_signup_limit")]
    pub signup: RateLimitRule,
    #[serde(default = "default_password_check_limit")]
    pub password_check: RateLimitRule,
    #[serde(default = "default_forgot_password_limit")]
    pub forgot_password: RateLimitRule,
    #[serde(default = "default_upload_limit")]
    pub upload: RateLimitRule,
    #[serde(default = "default_register_competition_limit")]
    pub register_competition: RateLimitRule,
    #[serde(default = "default_admin_limit")]
    pub admin: RateLimitRule,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            signin_ip: default_signin_ip_limit(),
            signin_account: default_signin_account_limit(),
            signup: default_signup_limit(),
            password_check: default_password_check_limit(),
            forgot_password: default_forgot_password_limit(),
            upload: default_upload_limit(),
            register_competition: default_register_competition_limit(),
            admin: default_admin_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Failures within the window that lock an account.
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,

    #[serde(default = "default_lockout_window")]
    pub lockout_window_secs: i64,

    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_secs: i64,

    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: i64,

    /// Random delay range applied to failed sign-ins.
    #[serde(default = "default_signin_delay_min")]
    pub signin_delay_min_ms: u64,
    #[serde(default = "default_signin_delay_max")]
    pub signin_delay_max_ms: u64,

    /// Random delay range applied to every forgot-password request.
    #[serde(default = "default_forgot_delay_min")]
    pub forgot_password_delay_min_ms: u64,
    #[serde(default = "default_forgot_delay_max")]
    pub forgot_password_delay_max_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: default_lockout_threshold(),
            lockout_window_secs: default_lockout_window(),
            lockout_duration_secs: default_lockout_duration(),
            reset_token_ttl_secs: default_reset_token_ttl(),
            signin_delay_min_ms: default_signin_delay_min(),
            signin_delay_max_ms: default_signin_delay_max(),
            forgot_password_delay_min_ms: default_forgot_delay_min(),
            forgot_password_delay_max_ms: default_forgot_delay_max(),
        }
    }
}

/// Email service configuration for password reset mail.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: console (logs the message) or disabled
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

/// Credentials for the admin account created on first start.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default = "default_admin_username")]
    pub bootstrap_username: String,

    #[serde(default = "default_admin_email")]
    pub bootstrap_email: String,

    #[serde(default = "default_admin_full_name")]
    pub bootstrap_full_name: String,

    /// Empty disables the bootstrap.
    #[serde(default)]
    pub bootstrap_password: String,
}

impl Default for AdminBootstrapConfig {
    fn default() -> Self {
        Self {
            bootstrap_username: default_admin_username(),
            bootstrap_email: default_admin_email(),
            bootstrap_full_name: default_admin_full_name(),
            bootstrap_password: String::new(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    1_048_576
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_base_url() -> String {
    "http://localhost:9000".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_utc_offset() -> String {
    "+07:00".to_string()
}
fn default_session_cookie() -> String {
    "ctf_session".to_string()
}
fn default_session_ttl() -> i64 {
    86_400
}
fn default_remember_cookie() -> String {
    "remember_me".to_string()
}
fn default_remember_ttl() -> i64 {
    30 * 86_400
}
fn default_signin_ip_limit() -> RateLimitRule {
    RateLimitRule::new(10, 300)
}
fn default_signin_account_limit() -> RateLimitRule {
    RateLimitRule::new(5, 900)
}
fn default_signup_limit() -> RateLimitRule {
    RateLimitRule::new(5, 3600)
}
fn default_password_check_limit() -> RateLimitRule {
    RateLimitRule::new(60, 60)
}
fn default_forgot_password_limit() -> RateLimitRule {
    RateLimitRule::new(3, 3600)
}
fn default_upload_limit() -> RateLimitRule {
    RateLimitRule::new(5, 600)
}
fn default_register_competition_limit() -> RateLimitRule {
    RateLimitRule::new(5, 60)
}
fn default_admin_limit() -> RateLimitRule {
    RateLimitRule::new(30, 60)
}
fn default_lockout_threshold() -> u32 {
    10
}
fn default_lockout_window() -> i64 {
    900
}
fn default_lockout_duration() -> i64 {
    3600
}
fn default_reset_token_ttl() -> i64 {
    3600
}
fn default_signin_delay_min() -> u64 {
    100
}
fn default_signin_delay_max() -> u64 {
    300
}
fn default_forgot_delay_min() -> u64 {
    200
}
fn default_forgot_delay_max() -> u64 {
    400
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_sender_email() -> String {
    "noreply@koneko-ctf.local".to_string()
}
fn default_sender_name() -> String {
    "Koneko CTF".to_string()
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_admin_email() -> String {
    "admin@ctf.local".to_string()
}
fn default_admin_full_name() -> String {
    "Admin User".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CTF__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CTF").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// This method creates a config entirely from embedded defaults and
    /// overrides, without relying on config files. Rate limits are raised and
    /// response delays removed so that suites can exercise endpoints freely.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        // Embed defaults directly to avoid file system dependency in tests
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 1048576

            [database]
            url = ""
            max_connections = 5
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "pretty"

            [security]
            cors_origins = []
            secure_cookies = false
            trust_proxy_headers = true
            hsts_enabled = false

            [app]
            base_url = "http://localhost:9000"
            environment = "test"
            utc_offset = "+07:00"

            [rate_limits]
            signin_ip = { max = 1000, window_secs = 60 }
            signin_account = { max = 1000, window_secs = 60 }
            signup = { max = 1000, window_secs = 60 }
            password_check = { max = 1000, window_secs = 60 }
            forgot_password = { max = 1000, window_secs = 60 }
            upload = { max = 1000, window_secs = 60 }
            register_competition = { max = 1000, window_secs = 60 }
            admin = { max = 1000, window_secs = 60 }

            [auth]
            signin_delay_min_ms = 0
            signin_delay_max_ms = 0
            forgot_password_delay_min_ms = 0
            forgot_password_delay_max_ms = 0

            [email]
            enabled = false
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        // Database URL is required
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CTF__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        // Validate port range
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        // Validate connection pool settings
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if parse_utc_offset(&self.app.utc_offset).is_none() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "app.utc_offset '{}' is not a valid offset like +07:00",
                self.app.utc_offset
            )));
        }

        if self.app.is_production() && self.app.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CTF__APP__BASE_URL must be set in production".to_string(),
            ));
        }

        if self.auth.signin_delay_min_ms > self.auth.signin_delay_max_ms
            || self.auth.forgot_password_delay_min_ms > self.auth.forgot_password_delay_max_ms
        {
            return Err(ConfigValidationError::InvalidValue(
                "delay minimum cannot exceed delay maximum".to_string(),
            ));
        }

        Ok(())
    }

    /// Front-end URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.app.base_url.trim_end_matches('/')
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
