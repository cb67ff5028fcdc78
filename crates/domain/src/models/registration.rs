//! Competition registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::competition::CompetitionStatus;

/// Review state of a team's registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Waitlisted,
}

impl RegistrationStatus {
    /// Statuses that occupy a participant slot.
    pub const ACTIVE: [RegistrationStatus; 3] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Approved,
        RegistrationStatus::Waitlisted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Waitlisted => "waitlisted",
        }
    }

    pub fn counts_toward_capacity(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            _ => Err(format!("Invalid registration status: {}", s)),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of a registration, managed by admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Unpaid,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Registration status implied by moving to this payment status.
    ///
    /// `None` means the registration status is left unchanged.
    pub fn registration_transition(&self) -> Option<RegistrationStatus> {
        match self {
            PaymentStatus::Paid => Some(RegistrationStatus::Approved),
            PaymentStatus::Refunded => Some(RegistrationStatus::Cancelled),
            PaymentStatus::Unpaid | PaymentStatus::Pending => None,
        }
    }

    /// Payment statuses still awaiting admin verification.
    pub fn awaiting_verification(&self) -> bool {
        matches!(self, PaymentStatus::Unpaid | PaymentStatus::Pending)
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A team's registration for a competition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub id: i32,
    pub user_id: i32,
    pub competition_id: i32,
    pub team_name: Option<String>,
    pub registration_status: RegistrationStatus,
    pub payment_status: PaymentStatus,
    pub registration_notes: Option<String>,
    pub score: Option<i32>,
    pub rank: Option<i32>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration row joined with the registrant and the competition, as shown
/// to admins.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub registration: Registration,
    pub user_name: String,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub competition_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competition_category: Option<String>,
}

/// One of the caller's own registrations with the competition it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct MyRegistration {
    pub id: i32,
    pub registration_status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub competition_id: i32,
    pub payment_status: PaymentStatus,
    pub team_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub difficulty_level: String,
    pub prize_pool: Option<String>,
    pub category: String,
    pub rules: Option<String>,
    pub contact_person: Option<String>,
    pub competition_created_at: DateTime<Utc>,
    pub competition_status: CompetitionStatus,
    pub current_participants: i64,
    #[serde(rename = "bannerUrl")]
    pub banner_url: Option<String>,
    #[serde(rename = "bannerVersion")]
    pub banner_version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_transitions() {
        assert_eq!(
            PaymentStatus::Paid.registration_transition(),
            Some(RegistrationStatus::Approved)
        );
        assert_eq!(
            PaymentStatus::Refunded.registration_transition(),
            Some(RegistrationStatus::Cancelled)
        );
        assert_eq!(PaymentStatus::Pending.registration_transition(), None);
        assert_eq!(PaymentStatus::Unpaid.registration_transition(), None);
    }

    #[test]
    fn test_awaiting_verification() {
        assert!(PaymentStatus::Unpaid.awaiting_verification());
        assert!(PaymentStatus::Pending.awaiting_verification());
        assert!(!PaymentStatus::Paid.awaiting_verification());
        assert!(!PaymentStatus::Refunded.awaiting_verification());
    }

    #[test]
    fn test_capacity_statuses() {
        assert!(RegistrationStatus::Pending.counts_toward_capacity());
        assert!(RegistrationStatus::Approved.counts_toward_capacity());
        assert!(RegistrationStatus::Waitlisted.counts_toward_capacity());
        assert!(!RegistrationStatus::Rejected.counts_toward_capacity());
        assert!(!RegistrationStatus::Cancelled.counts_toward_capacity());
    }

    #[test]
    fn test_status_parsing_is_exact() {
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert!("PAID".parse::<PaymentStatus>().is_err());
        assert!("".parse::<PaymentStatus>().is_err());
        assert_eq!(
            "waitlisted".parse::<RegistrationStatus>().unwrap(),
            RegistrationStatus::Waitlisted
        );
        assert!("done".parse::<RegistrationStatus>().is_err());
    }

    #[test]
    fn test_defaults_for_new_registrations() {
        assert_eq!(RegistrationStatus::default(), RegistrationStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unpaid);
    }
}
