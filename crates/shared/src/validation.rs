//! Common validation utilities.
//!
//! Plain predicates are used by handlers that must report the first failing
//! rule in a fixed order. The `validate_*` wrappers adapt the same rules to
//! `validator` custom-function attributes on request DTOs.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use validator::{ValidateEmail, ValidationError};

/// Minimum password length in bytes.
pub const PASSWORD_MIN_LEN: usize = 12;

/// Maximum password length in bytes.
pub const PASSWORD_MAX_LEN: usize = 128;

/// Characters that satisfy the "special character" password rule.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?~`";

/// Email domains allowed to create an account.
pub const ALLOWED_SIGNUP_DOMAINS: [&str; 2] = ["@gmail.com", "@binus.ac.id"];

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap();
}

/// Trims surrounding whitespace and strips ASCII control characters other
/// than tab, newline and carriage return.
pub fn sanitize_string(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(*c, '\x00'..='\x08' | '\x0B' | '\x0C' | '\x0E'..='\x1F' | '\x7F'))
        .collect()
}

/// Sanitizes an optional value, mapping `None` to an empty string.
pub fn sanitize_opt(value: Option<&str>) -> String {
    value.map(sanitize_string).unwrap_or_default()
}

/// A display name is 1-100 bytes without HTML-significant quote or angle characters.
pub fn is_valid_full_name(name: &str) -> bool {
    (1..=100).contains(&name.len()) && !name.contains(['<', '>', '"', '\''])
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// Case-insensitive suffix check against [`ALLOWED_SIGNUP_DOMAINS`].
pub fn is_allowed_signup_domain(email: &str) -> bool {
    let lower = email.to_ascii_lowercase();
    ALLOWED_SIGNUP_DOMAINS
        .iter()
        .any(|domain| lower.ends_with(domain))
}

/// Reasons a password is rejected by the account password policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be between 12 and 128 characters")]
    Length,

    #[error("Password must include upper, lower, numeric, and special characters")]
    Complexity,
}

pub fn has_special_char(password: &str) -> bool {
    password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Checks length first, then character classes.
pub fn check_password_complexity(password: &str) -> Result<(), PasswordPolicyError> {
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password.len()) {
        return Err(PasswordPolicyError::Length);
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_upper && has_lower && has_digit && has_special_char(password) {
        Ok(())
    } else {
        Err(PasswordPolicyError::Complexity)
    }
}

/// Validates a display name for use with `#[validate(custom(...))]`.
pub fn validate_full_name(name: &str) -> Result<(), ValidationError> {
    if is_valid_full_name(&sanitize_string(name)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("full_name");
        err.message = Some(
            "Full name must be 1-30 characters and cannot contain special characters".into(),
        );
        Err(err)
    }
}

/// Validates a signup email: well formed first, then on an allowed domain.
pub fn validate_signup_email(email: &str) -> Result<(), ValidationError> {
    let (code, message) = if !is_valid_email(email) {
        ("email", "Invalid email format")
    } else if !is_allowed_signup_domain(email) {
        (
            "signup_domain",
            "Registration is restricted to @gmail.com or @binus.ac.id emails only",
        )
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    Err(err)
}

/// Validates a username for use with `#[validate(custom(...))]`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if is_valid_username(&sanitize_string(username)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("username");
        err.message =
            Some("Username must be 3-30 characters and alphanumeric/underscore only".into());
        Err(err)
    }
}

/// Validates an account password for use with `#[validate(custom(...))]`.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    check_password_complexity(password).map_err(|policy| {
        let mut err = ValidationError::new("password_policy");
        err.message = Some(policy.to_string().into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_string_trims_and_strips_controls() {
        assert_eq!(sanitize_string("  hello  "), "hello");
        assert_eq!(sanitize_string("te\x00am\x07 one\x7f"), "team one");
        assert_eq!(sanitize_string("line\nbreak\ttab"), "line\nbreak\ttab");
        assert_eq!(sanitize_string(""), "");
    }

    #[test]
    fn test_sanitize_opt() {
        assert_eq!(sanitize_opt(None), "");
        assert_eq!(sanitize_opt(Some(" x ")), "x");
    }

    #[test]
    fn test_full_name_rules() {
        assert!(is_valid_full_name("Ada Lovelace"));
        assert!(is_valid_full_name(&"a".repeat(100)));
        assert!(!is_valid_full_name(""));
        assert!(!is_valid_full_name(&"a".repeat(101)));
        assert!(!is_valid_full_name("<script>"));
        assert!(!is_valid_full_name("O'Brien"));
        assert!(!is_valid_full_name("say \"hi\""));
    }

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("abc"));
        assert!(is_valid_username("pwn_master_2024"));
        assert!(is_valid_username(&"a".repeat(32)));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username(&"a".repeat(33)));
        assert!(!is_valid_username("bad-name"));
        assert!(!is_valid_username("spaces here"));
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("player@gmail.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@gmail.com"));
    }

    #[test]
    fn test_signup_domain_allow_list() {
        assert!(is_allowed_signup_domain("player@gmail.com"));
        assert!(is_allowed_signup_domain("Student@BINUS.AC.ID"));
        assert!(!is_allowed_signup_domain("player@yahoo.com"));
        assert!(!is_allowed_signup_domain("player@gmail.com.evil.io"));
        assert!(!is_allowed_signup_domain("player@notgmail.co"));
    }

    #[test]
    fn test_password_complexity() {
        assert_eq!(check_password_complexity("Str0ng!Passw0rd"), Ok(()));
        assert_eq!(
            check_password_complexity("Sh0rt!"),
            Err(PasswordPolicyError::Length)
        );
        assert_eq!(
            check_password_complexity(&format!("Aa1!{}", "x".repeat(125))),
            Err(PasswordPolicyError::Length)
        );
        assert_eq!(
            check_password_complexity("alllowercase1!xx"),
            Err(PasswordPolicyError::Complexity)
        );
        assert_eq!(
            check_password_complexity("NoDigitsHere!!xx"),
            Err(PasswordPolicyError::Complexity)
        );
        assert_eq!(
            check_password_complexity("NoSpecials123xx"),
            Err(PasswordPolicyError::Complexity)
        );
    }

    #[test]
    fn test_every_special_character_counts() {
        for special in PASSWORD_SPECIALS.chars() {
            let password = format!("Abcdefghij1{}", special);
            assert!(
                check_password_complexity(&password).is_ok(),
                "special {special:?} should satisfy the policy"
            );
        }
    }

    #[test]
    fn test_validator_wrappers_carry_messages() {
        let err = validate_username("x").unwrap_err();
        assert!(err.message.unwrap().contains("alphanumeric"));

        let err = validate_password("weak").unwrap_err();
        assert_eq!(
            err.message.unwrap(),
            "Password must be between 12 and 128 characters"
        );

        assert!(validate_full_name(" Grace Hopper ").is_ok());
    }

    #[test]
    fn test_validate_signup_email_checks_format_before_domain() {
        assert!(validate_signup_email("hacker@binus.ac.id").is_ok());
        assert_eq!(
            validate_signup_email("not-an-email").unwrap_err().code,
            "email"
        );
        assert_eq!(
            validate_signup_email("hacker@yahoo.com").unwrap_err().code,
            "signup_domain"
        );
    }
}
