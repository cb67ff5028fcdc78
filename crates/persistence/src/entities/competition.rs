//! Competition entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::DifficultyLevel;
use sqlx::FromRow;
use std::str::FromStr;

/// Columns selected for [`CompetitionEntity`], qualified with the `c` alias.
pub const COMPETITION_COLUMNS: &str = "c.id, c.name, c.description, c.start_date, c.end_date, \
     c.registration_deadline, c.max_participants, c.difficulty_level, c.prize_pool, c.category, \
     c.rules, c.contact_person, (c.banner IS NOT NULL) AS has_banner, c.banner_updated_at, \
     c.created_at";

/// Database row mapping for the competitions table, without the banner bytes.
#[derive(Debug, Clone, FromRow)]
pub struct CompetitionEntity {
    pub id: i32,
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
    pub has_banner: bool,
    pub banner_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CompetitionEntity> for domain::models::Competition {
    fn from(entity: CompetitionEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            start_date: entity.start_date,
            end_date: entity.end_date,
            registration_deadline: entity.registration_deadline,
            max_participants: entity.max_participants,
            difficulty_level: DifficultyLevel::from_str(&entity.difficulty_level)
                .unwrap_or_default(),
            prize_pool: entity.prize_pool,
            category: entity.category,
            rules: entity.rules,
            contact_person: entity.contact_person,
            has_banner: entity.has_banner,
            banner_updated_at: entity.banner_updated_at,
            created_at: entity.created_at,
        }
    }
}

/// Competition row joined with its active participant count.
#[derive(Debug, Clone, FromRow)]
pub struct CompetitionWithCountEntity {
    #[sqlx(flatten)]
    pub competition: CompetitionEntity,
    pub current_participants: i64,
}

/// Fields written on create; `banner` is required there.
#[derive(Debug, Clone)]
pub struct NewCompetition {
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
    pub banner: Vec<u8>,
    pub banner_mime: String,
}

/// Partial update. `None` leaves a column untouched; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct CompetitionChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_participants: Option<Option<i32>>,
    pub difficulty_level: Option<DifficultyLevel>,
    pub prize_pool: Option<Option<String>>,
    pub category: Option<String>,
    pub rules: Option<Option<String>>,
    pub contact_person: Option<Option<String>>,
    pub banner: Option<(Vec<u8>, String)>,
}

impl CompetitionChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.registration_deadline.is_none()
            && self.max_participants.is_none()
            && self.difficulty_level.is_none()
            && self.prize_pool.is_none()
            && self.category.is_none()
            && self.rules.is_none()
            && self.contact_person.is_none()
            && self.banner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_difficulty_falls_back_to_beginner() {
        let now = Utc::now();
        let entity = CompetitionEntity {
            id: 1,
            name: "Quals".to_string(),
            description: None,
            start_date: now,
            end_date: now,
            registration_deadline: now,
            max_participants: None,
            difficulty_level: "nightmare".to_string(),
            prize_pool: None,
            category: "Jeopardy".to_string(),
            rules: None,
            contact_person: None,
            has_banner: false,
            banner_updated_at: None,
            created_at: now,
        };
        let competition: domain::models::Competition = entity.into();
        assert_eq!(competition.difficulty_level, DifficultyLevel::Beginner);
    }

    #[test]
    fn test_changes_is_empty() {
        let mut changes = CompetitionChanges::default();
        assert!(changes.is_empty());
        changes.rules = Some(None);
        assert!(!changes.is_empty());
    }
}
