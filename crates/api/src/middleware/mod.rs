//! HTTP middleware components.

pub mod logging;
pub mod method_not_allowed;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod session_auth;
pub mod trace_id;

pub use method_not_allowed::json_method_not_allowed;
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
pub use rate_limit::{admin_rate_limit, RateLimitPolicy, RateLimiterState};
pub use security_headers::security_headers_middleware;
pub use session_auth::{require_admin, require_user, CSRF_HEADER};
pub use trace_id::{trace_id, RequestId, REQUEST_ID_HEADER};
