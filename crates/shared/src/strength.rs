//! Password strength meter shown while a user types a new password.

use serde::Serialize;

use crate::validation::has_special_char;

/// Strength bucket derived from the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrengthLabel {
    Weak,
    Fair,
    Good,
    Strong,
}

impl StrengthLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthLabel::Weak => "Weak",
            StrengthLabel::Fair => "Fair",
            StrengthLabel::Good => "Good",
            StrengthLabel::Strong => "Strong",
        }
    }

    pub fn percentage(&self) -> u8 {
        match self {
            StrengthLabel::Weak => 25,
            StrengthLabel::Fair => 50,
            StrengthLabel::Good => 75,
            StrengthLabel::Strong => 100,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            StrengthLabel::Weak => "#dc3545",
            StrengthLabel::Fair => "#ffc107",
            StrengthLabel::Good => "#17a2b8",
            StrengthLabel::Strong => "#28a745",
        }
    }
}

/// Result of scoring a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub percentage: u8,
    pub label: &'static str,
    pub color: &'static str,
    pub feedback: Vec<String>,
}

/// Scores a password from 0 to 6.
///
/// One point each for: at least 12 bytes, at least 16 bytes, an uppercase
/// letter, a lowercase letter, a digit, a special character.
pub fn score_password(password: &str) -> u8 {
    let checks = [
        password.len() >= 12,
        password.len() >= 16,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        has_special_char(password),
    ];
    checks.iter().filter(|passed| **passed).count() as u8
}

pub fn label_for_score(score: u8) -> StrengthLabel {
    match score {
        0..=2 => StrengthLabel::Weak,
        3..=4 => StrengthLabel::Fair,
        5 => StrengthLabel::Good,
        _ => StrengthLabel::Strong,
    }
}

pub fn evaluate(password: &str) -> PasswordStrength {
    let score = score_password(password);
    let label = label_for_score(score);
    PasswordStrength {
        score,
        percentage: label.percentage(),
        label: label.as_str(),
        color: label.color(),
        feedback: Vec::new(),
    }
}
