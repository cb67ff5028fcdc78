//! Custom Axum extractors.
//!
//! Extractors for parsing and validating request data.

pub mod client_ip;
pub mod json;
pub mod session;

pub use client_ip::ClientIp;
pub use json::JsonBody;
pub use session::AuthUser;
