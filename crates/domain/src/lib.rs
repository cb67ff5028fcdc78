//! Domain layer for the CTF portal backend.
//!
//! This crate contains:
//! - Domain models (User, Competition, Registration, Activity)
//! - Business rules (competition status, registration eligibility, lockout)

pub mod models;
pub mod services;
