//! Shared utilities for the CTF portal backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Token hashing and generation
//! - Password hashing with Argon2id and the strength meter
//! - Input sanitization and validation rules
//! - Image signature sniffing

pub mod crypto;
pub mod image;
pub mod password;
pub mod strength;
pub mod validation;
