//! Services for the CTF portal API.

pub mod activity;
pub mod admin_bootstrap;
pub mod auth;
pub mod cookies;
pub mod email;
pub mod remember_me;
pub mod sessions;
