//! Competition domain models and schedule rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Difficulty tier advertised for a competition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
            DifficultyLevel::Expert => "expert",
        }
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    /// Exact, case-sensitive match on the stored value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(DifficultyLevel::Beginner),
            "intermediate" => Ok(DifficultyLevel::Intermediate),
            "advanced" => Ok(DifficultyLevel::Advanced),
            "expert" => Ok(DifficultyLevel::Expert),
            _ => Err(format!("Invalid difficulty level: {}", s)),
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status derived from the schedule and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Upcoming,
    RegistrationOpen,
    RegistrationClosed,
    Ongoing,
    Completed,
}

impl CompetitionStatus {
    /// Derives the status at `now`.
    ///
    /// Checks run in order: past the end, inside the event window, past the
    /// deadline, then open registration. Anything else is `Upcoming`.
    pub fn compute(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if now > end {
            CompetitionStatus::Completed
        } else if now >= start && now <= end {
            CompetitionStatus::Ongoing
        } else if deadline < now {
            CompetitionStatus::RegistrationClosed
        } else if deadline >= now && start > now {
            CompetitionStatus::RegistrationOpen
        } else {
            CompetitionStatus::Upcoming
        }
    }

    pub fn accepts_registrations(&self) -> bool {
        matches!(
            self,
            CompetitionStatus::Upcoming | CompetitionStatus::RegistrationOpen
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionStatus::Upcoming => "upcoming",
            CompetitionStatus::RegistrationOpen => "registration_open",
            CompetitionStatus::RegistrationClosed => "registration_closed",
            CompetitionStatus::Ongoing => "ongoing",
            CompetitionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A competition as stored, without the banner bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Competition {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub difficulty_level: DifficultyLevel,
    pub prize_pool: Option<String>,
    pub category: String,
    pub rules: Option<String>,
    pub contact_person: Option<String>,
    pub has_banner: bool,
    pub banner_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Competition {
    pub fn status_at(&self, now: DateTime<Utc>) -> CompetitionStatus {
        CompetitionStatus::compute(
            self.start_date,
            self.end_date,
            self.registration_deadline,
            now,
        )
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            start: self.start_date,
            end: self.end_date,
            deadline: self.registration_deadline,
        }
    }

    pub fn banner_url(&self) -> Option<String> {
        self.has_banner
            .then(|| format!("api/competition_banner?id={}", self.id))
    }

    /// Unix seconds of the last banner change, falling back to creation time.
    pub fn banner_version(&self) -> i64 {
        self.banner_updated_at
            .unwrap_or(self.created_at)
            .timestamp()
    }
}

/// Competition as returned by listing and admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitionView {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub current_participants: i64,
    pub difficulty_level: DifficultyLevel,
    pub prize_pool: Option<String>,
    pub category: String,
    pub rules: Option<String>,
    pub contact_person: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: CompetitionStatus,
    #[serde(rename = "bannerUrl")]
    pub banner_url: Option<String>,
    #[serde(rename = "bannerVersion")]
    pub banner_version: i64,
}

impl CompetitionView {
    pub fn new(competition: Competition, current_participants: i64, now: DateTime<Utc>) -> Self {
        let status = competition.status_at(now);
        let banner_url = competition.banner_url();
        let banner_version = competition.banner_version();
        Self {
            id: competition.id,
            name: competition.name,
            description: competition.description,
            start_date: competition.start_date,
            end_date: competition.end_date,
            registration_deadline: competition.registration_deadline,
            max_participants: competition.max_participants,
            current_participants,
            difficulty_level: competition.difficulty_level,
            prize_pool: competition.prize_pool,
            category: competition.category,
            rules: competition.rules,
            contact_person: competition.contact_person,
            created_at: competition.created_at,
            status,
            banner_url,
            banner_version,
        }
    }
}

/// Violations of the schedule ordering `deadline <= start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("End date must be after start date")]
    EndNotAfterStart,

    #[error("Registration deadline cannot be after the competition end date.")]
    DeadlineAfterEnd,

    #[error("Registration deadline cannot be after the competition start date.")]
    DeadlineAfterStart,
}

/// The three instants that define a competition's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.end <= self.start {
            return Err(ScheduleError::EndNotAfterStart);
        }
        if self.deadline > self.end {
            return Err(ScheduleError::DeadlineAfterEnd);
        }
        if self.deadline > self.start {
            return Err(ScheduleError::DeadlineAfterStart);
        }
        Ok(())
    }
}
