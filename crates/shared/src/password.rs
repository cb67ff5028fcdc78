//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings, so verification reads the cost
//! parameters back from the stored value and older hashes keep working after
//! the defaults below change.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Failed to verify password: {0}")]
    Verify(String),

    #[error("Invalid password hash format")]
    MalformedHash,
}

/// 19 MiB, two passes, one lane.
const MEMORY_KIB: u32 = 19 * 1024;
const PASSES: u32 = 2;
const LANES: u32 = 1;

/// Plaintext hashed once per process and used as the comparison target when
/// a sign-in names no existing account.
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, None)
        .map_err(|e| PasswordError::Hash(format!("invalid Argon2 parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt.
///
/// ```
/// use shared::password::hash_password;
///
/// let hash = hash_password("Correct-Horse-9").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `Ok(false)` on a mismatch; `Err` only when `stored` is not a usable PHC
/// string.
///
/// ```
/// use shared::password::{hash_password, verify_password};
///
/// let hash = hash_password("Flag{letmein}42").unwrap();
/// assert!(verify_password("Flag{letmein}42", &hash).unwrap());
/// assert!(!verify_password("flag{letmein}42", &hash).unwrap());
/// ```
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password(DECOY_PASSWORD).ok())
        .as_deref()
}

/// Verifies against `stored` when the account exists. Without an account
/// the decoy hash is verified and discarded so both paths cost the same,
/// and the answer is always `false`.
pub fn verify_password_or_dummy(password: &str, stored: Option<&str>) -> Result<bool, PasswordError> {
    match stored {
        Some(stored) => verify_password(password, stored),
        None => {
            if let Some(decoy) = decoy_hash() {
                let _ = verify_password(password, decoy);
            }
            Ok(false)
        }
    }
}
