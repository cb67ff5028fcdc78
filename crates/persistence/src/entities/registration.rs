//! Competition registration entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{
    CompetitionStatus, MyRegistration, PaymentStatus, Registration, RegistrationDetail,
    RegistrationStatus,
};
use sqlx::FromRow;
use std::str::FromStr;

/// Columns selected for [`RegistrationEntity`], qualified with the `r` alias.
pub const REGISTRATION_COLUMNS: &str = "r.id, r.user_id, r.competition_id, r.team_name, \
     r.registration_status, r.payment_status, r.registration_notes, r.score, r.rank, \
     r.registered_at, r.updated_at";

/// Database row mapping for the competition_registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: i32,
    pub user_id: i32,
    pub competition_id: i32,
    pub team_name: Option<String>,
    pub registration_status: String,
    pub payment_status: String,
    pub registration_notes: Option<String>,
    pub score: Option<i32>,
    pub rank: Option<i32>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            competition_id: entity.competition_id,
            team_name: entity.team_name,
            registration_status: RegistrationStatus::from_str(&entity.registration_status)
                .unwrap_or_default(),
            payment_status: PaymentStatus::from_str(&entity.payment_status).unwrap_or_default(),
            registration_notes: entity.registration_notes,
            score: entity.score,
            rank: entity.rank,
            registered_at: entity.registered_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Registration joined with the registrant and the competition.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationDetailEntity {
    #[sqlx(flatten)]
    pub registration: RegistrationEntity,
    pub user_name: String,
    pub user_email: String,
    pub username: Option<String>,
    pub competition_name: String,
    pub competition_category: Option<String>,
}

impl From<RegistrationDetailEntity> for RegistrationDetail {
    fn from(entity: RegistrationDetailEntity) -> Self {
        Self {
            registration: entity.registration.into(),
            user_name: entity.user_name,
            user_email: entity.user_email,
            username: entity.username,
            competition_name: entity.competition_name,
            competition_category: entity.competition_category,
        }
    }
}

/// One of a user's registrations with the competition fields it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct MyRegistrationEntity {
    pub id: i32,
    pub registration_status: String,
    pub registered_at: DateTime<Utc>,
    pub competition_id: i32,
    pub payment_status: String,
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
    pub has_banner: bool,
    pub banner_updated_at: Option<DateTime<Utc>>,
    pub current_participants: i64,
}

impl MyRegistrationEntity {
    /// Converts the row, deriving the competition status at `now`.
    pub fn into_domain(self, now: DateTime<Utc>) -> MyRegistration {
        let competition_status = CompetitionStatus::compute(
            self.start_date,
            self.end_date,
            self.registration_deadline,
            now,
        );
        let banner_url = self
            .has_banner
            .then(|| format!("api/competition_banner?id={}", self.competition_id));
        let banner_version = self
            .banner_updated_at
            .unwrap_or(self.competition_created_at)
            .timestamp();

        MyRegistration {
            id: self.id,
            registration_status: RegistrationStatus::from_str(&self.registration_status)
                .unwrap_or_default(),
            registered_at: self.registered_at,
            competition_id: self.competition_id,
            payment_status: PaymentStatus::from_str(&self.payment_status).unwrap_or_default(),
            team_name: self.team_name,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            registration_deadline: self.registration_deadline,
            max_participants: self.max_participants,
            difficulty_level: self.difficulty_level,
            prize_pool: self.prize_pool,
            category: self.category,
            rules: self.rules,
            contact_person: self.contact_person,
            competition_created_at: self.competition_created_at,
            competition_status,
            current_participants: self.current_participants,
            banner_url,
            banner_version,
        }
    }
}
