//! Rules deciding whether a new team may register for a competition.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::Competition;

/// Why a registration attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistrationRejection {
    #[error("Registration is not open for this competition")]
    NotOpen,

    #[error("Registration deadline has passed")]
    DeadlinePassed,

    #[error("Competition has reached maximum participants")]
    Full,
}

/// Checks status, deadline and capacity in that order.
///
/// `current_participants` must count only registrations that occupy a slot
/// (pending, approved, waitlisted).
pub fn check_eligibility(
    competition: &Competition,
    current_participants: i64,
    now: DateTime<Utc>,
) -> Result<(), RegistrationRejection> {
    if !competition.status_at(now).accepts_registrations() {
        return Err(RegistrationRejection::NotOpen);
    }

    if competition.registration_deadline < now {
        return Err(RegistrationRejection::DeadlinePassed);
    }

    if let Some(max) = competition.max_participants {
        if current_participants >= i64::from(max) {
            return Err(RegistrationRejection::Full);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DifficultyLevel;
    use chrono::Duration;

    fn competition(now: DateTime<Utc>, max: Option<i32>) -> Competition {
        Competition {
            id: 1,
            name: "Koneko CTF".to_string(),
            description: None,
            start_date: now + Duration::days(10),
            end_date: now + Duration::days(11),
            registration_deadline: now + Duration::days(5),
            max_participants: max,
            difficulty_level: DifficultyLevel::Beginner,
            prize_pool: None,
            category: "Jeopardy".to_string(),
            rules: None,
            contact_person: None,
            has_banner: false,
            banner_updated_at: None,
            created_at: now - Duration::days(1),
        }
    }

    #[test]
    fn test_open_competition_accepts() {
        let now = Utc::now();
        assert_eq!(check_eligibility(&competition(now, None), 1000, now), Ok(()));
    }

    #[test]
    fn test_past_deadline_is_not_open() {
        let now = Utc::now();
        let mut comp = competition(now, None);
        comp.registration_deadline = now - Duration::hours(1);
        assert_eq!(
            check_eligibility(&comp, 0, now),
            Err(RegistrationRejection::NotOpen)
        );
    }

    #[test]
    fn test_ongoing_is_not_open() {
        let now = Utc::now();
        let mut comp = competition(now, None);
        comp.start_date = now - Duration::hours(1);
        comp.registration_deadline = now - Duration::hours(2);
        assert_eq!(
            check_eligibility(&comp, 0, now),
            Err(RegistrationRejection::NotOpen)
        );
    }

    #[test]
    fn test_capacity_reached() {
        let now = Utc::now();
        let comp = competition(now, Some(2));
        assert_eq!(check_eligibility(&comp, 1, now), Ok(()));
        assert_eq!(
            check_eligibility(&comp, 2, now),
            Err(RegistrationRejection::Full)
        );
        assert_eq!(
            check_eligibility(&comp, 3, now),
            Err(RegistrationRejection::Full)
        );
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            RegistrationRejection::Full.to_string(),
            "Competition has reached maximum participants"
        );
        assert_eq!(
            RegistrationRejection::DeadlinePassed.to_string(),
            "Registration deadline has passed"
        );
    }
}
