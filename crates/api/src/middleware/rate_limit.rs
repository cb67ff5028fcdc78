//! Rate limiting.
//!
//! Each named policy keeps a sliding-window log per key: the instants of the
//! hits made within the last `window`. A hit is refused while `max` of them
//! are still inside the window. Keys are client IPs, lower-cased identifiers
//! or user ids depending on the policy.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use crate::app::AppState;
use crate::config::{RateLimitRule, RateLimitsConfig};
use crate::error::ApiError;
use crate::extractors::client_ip::ClientIp;

/// Named rate limit policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPolicy {
    SigninIp,
    SigninAccount,
    Signup,
    PasswordCheck,
    ForgotPassword,
    Upload,
    RegisterCompetition,
    Admin,
}

impl RateLimitPolicy {
    pub const ALL: [RateLimitPolicy; 8] = [
        RateLimitPolicy::SigninIp,
        RateLimitPolicy::SigninAccount,
        RateLimitPolicy::Signup,
        RateLimitPolicy::PasswordCheck,
        RateLimitPolicy::ForgotPassword,
        RateLimitPolicy::Upload,
        RateLimitPolicy::RegisterCompetition,
        RateLimitPolicy::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitPolicy::SigninIp => "signin_ip",
            RateLimitPolicy::SigninAccount => "signin_account",
            RateLimitPolicy::Signup => "signup",
            RateLimitPolicy::PasswordCheck => "password_check",
            RateLimitPolicy::ForgotPassword => "forgot_password",
            RateLimitPolicy::Upload => "upload",
            RateLimitPolicy::RegisterCompetition => "register_competition",
            RateLimitPolicy::Admin => "admin",
        }
    }

    /// Message returned to the client when the policy trips.
    pub fn message(&self) -> &'static str {
        match self {
            RateLimitPolicy::SigninIp => {
                "Too many login attempts from this IP. Please try again later."
            }
            RateLimitPolicy::SigninAccount => {
                "Too many login attempts for this account. Please try again later."
            }
            RateLimitPolicy::Signup => "Too many registration attempts. Please try again later.",
            RateLimitPolicy::PasswordCheck => "Too many requests.",
            RateLimitPolicy::ForgotPassword => {
                "Too many password reset requests. Please try again later."
            }
            RateLimitPolicy::Upload => "Too many upload attempts. Please try again later.",
            RateLimitPolicy::RegisterCompetition => {
                "Too many registration attempts. Please try again later."
            }
            RateLimitPolicy::Admin => "Too many requests. Please try again later.",
        }
    }

    fn rule(&self, limits: &RateLimitsConfig) -> RateLimitRule {
        match self {
            RateLimitPolicy::SigninIp => limits.signin_ip,
            RateLimitPolicy::SigninAccount => limits.signin_account,
            RateLimitPolicy::Signup => limits.signup,
            RateLimitPolicy::PasswordCheck => limits.password_check,
            RateLimitPolicy::ForgotPassword => limits.forgot_password,
            RateLimitPolicy::Upload => limits.upload,
            RateLimitPolicy::RegisterCompetition => limits.register_competition,
            RateLimitPolicy::Admin => limits.admin,
        }
    }
}

/// Hit log of one policy.
struct SlidingWindow {
    max: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindow {
    fn new(rule: RateLimitRule) -> Self {
        Self {
            max: rule.max.max(1) as usize,
            window: Duration::from_secs(rule.window_secs.max(1)),
            hits: DashMap::new(),
        }
    }

    fn expire(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while log
            .front()
            .is_some_and(|hit| now.saturating_duration_since(*hit) >= self.window)
        {
            log.pop_front();
        }
    }

    /// Counts a hit at `now`, or returns how long until the oldest hit in the
    /// window expires.
    fn hit(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut log = self.hits.entry(key.to_owned()).or_default();
        self.expire(&mut log, now);

        if log.len() >= self.max {
            let wait = match log.front() {
                Some(oldest) => self.window.saturating_sub(now.saturating_duration_since(*oldest)),
                None => self.window,
            };
            return Err(wait);
        }
        log.push_back(now);
        Ok(())
    }

    /// Forgets keys without hits inside the window; returns the keys kept.
    fn prune(&self, now: Instant) -> usize {
        self.hits.retain(|_, log| {
            self.expire(log, now);
            !log.is_empty()
        });
        self.hits.len()
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Registry of sliding windows, one per policy.
pub struct RateLimiterState {
    windows: HashMap<RateLimitPolicy, SlidingWindow>,
    rules: HashMap<RateLimitPolicy, RateLimitRule>,
}

impl RateLimiterState {
    pub fn new(limits: &RateLimitsConfig) -> Self {
        let mut windows = HashMap::new();
        let mut rules = HashMap::new();
        for policy in RateLimitPolicy::ALL {
            let rule = policy.rule(limits);
            windows.insert(policy, SlidingWindow::new(rule));
            rules.insert(policy, rule);
        }
        Self { windows, rules }
    }

    /// Records a hit for `key` under `policy`.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, policy: RateLimitPolicy, key: &str) -> Result<(), u64> {
        self.check_at(policy, key, Instant::now())
    }

    fn check_at(&self, policy: RateLimitPolicy, key: &str, now: Instant) -> Result<(), u64> {
        match self.windows.get(&policy) {
            Some(window) => window.hit(key, now).map_err(retry_after_secs),
            None => Ok(()),
        }
    }

    /// Like [`check`](Self::check), but produces the policy's 429 error.
    pub fn enforce(&self, policy: RateLimitPolicy, key: &str) -> Result<(), ApiError> {
        self.check(policy, key).map_err(|retry_after| {
            tracing::warn!(policy = policy.as_str(), "Rate limit exceeded");
            metrics::counter!("rate_limit_rejections_total", "policy" => policy.as_str())
                .increment(1);
            ApiError::rate_limited(policy.message(), retry_after)
        })
    }

    /// Drops keys whose hits have all left the window. Returns the number of
    /// keys still tracked.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        self.windows.values().map(|window| window.prune(now)).sum()
    }

    pub fn rule(&self, policy: RateLimitPolicy) -> Option<RateLimitRule> {
        self.rules.get(&policy).copied()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active: usize = self.windows.values().map(|w| w.hits.len()).sum();
        f.debug_struct("RateLimiterState")
            .field("policies", &self.windows.len())
            .field("active_keys", &active)
            .finish()
    }
}

/// Middleware applying the admin policy per client IP. It runs before the
/// session check so that unauthenticated probing is throttled too.
pub async fn admin_rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Err(err) = state.rate_limiter.enforce(RateLimitPolicy::Admin, &ip) {
        return err.into_response();
    }
    next.run(req).await
}
