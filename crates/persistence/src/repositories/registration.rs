//! Registration repository for competition sign-ups and payment review.

use domain::models::{PaymentStatus, RegistrationStatus};
use sqlx::{PgConnection, PgPool};

use crate::entities::registration::REGISTRATION_COLUMNS;
use crate::entities::{MyRegistrationEntity, RegistrationDetailEntity, RegistrationEntity};
use crate::metrics::QueryTimer;

/// Registration statuses that occupy a participant slot, as bind values.
pub(crate) fn active_statuses() -> Vec<&'static str> {
    RegistrationStatus::ACTIVE
        .iter()
        .map(|status| status.as_str())
        .collect()
}

/// Repository for competition registration operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count registrations holding a slot, locking them for the transaction.
    pub async fn count_active(
        conn: &mut PgConnection,
        competition_id: i32,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_active_registrations");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM competition_registrations
            WHERE competition_id = $1 AND registration_status = ANY($2)
            FOR UPDATE
            "#,
        )
        .bind(competition_id)
        .bind(active_statuses())
        .fetch_all(&mut *conn)
        .await;
        timer.record();
        result.map(|rows| rows.len() as i64)
    }

    /// Whether the user already holds a registration for the competition.
    pub async fn exists_for_user(
        conn: &mut PgConnection,
        user_id: i32,
        competition_id: i32,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("registration_exists_for_user");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM competition_registrations
            WHERE user_id = $1 AND competition_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(competition_id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result.map(|row| row.is_some())
    }

    /// Whether another team already uses this name in the competition.
    pub async fn team_name_taken(
        conn: &mut PgConnection,
        competition_id: i32,
        team_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("registration_team_name_taken");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM competition_registrations
            WHERE competition_id = $1 AND team_name = $2
            FOR UPDATE
            "#,
        )
        .bind(competition_id)
        .bind(team_name)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result.map(|row| row.is_some())
    }

    /// Insert a pending, unpaid registration.
    pub async fn create(
        conn: &mut PgConnection,
        user_id: i32,
        competition_id: i32,
        team_name: &str,
        notes: Option<&str>,
    ) -> Result<RegistrationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "INSERT INTO competition_registrations AS r \
                (user_id, competition_id, team_name, registration_notes, \
                 registration_status, payment_status, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(competition_id)
        .bind(team_name)
        .bind(notes)
        .bind(RegistrationStatus::Pending.as_str())
        .bind(PaymentStatus::Unpaid.as_str())
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Set the payment status and, when the transition implies one, the
    /// registration status. Returns `None` when the registration is gone.
    pub async fn update_payment(
        conn: &mut PgConnection,
        id: i32,
        payment_status: PaymentStatus,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_registration_payment");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "UPDATE competition_registrations AS r SET \
                payment_status = $2, \
                registration_status = COALESCE($3, registration_status), \
                updated_at = NOW() \
             WHERE r.id = $1 \
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(id)
        .bind(payment_status.as_str())
        .bind(payment_status.registration_transition().map(|s| s.as_str()))
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// The user's registrations with competition details, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<MyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_registrations_for_user");
        let result = sqlx::query_as::<_, MyRegistrationEntity>(
            r#"
            SELECT
                r.id, r.registration_status, r.registered_at, r.competition_id,
                r.payment_status, r.team_name,
                c.name, c.description, c.start_date, c.end_date, c.registration_deadline,
                c.max_participants, c.difficulty_level, c.prize_pool, c.category, c.rules,
                c.contact_person, c.created_at AS competition_created_at,
                (c.banner IS NOT NULL) AS has_banner, c.banner_updated_at,
                (SELECT COUNT(*) FROM competition_registrations r2
                 WHERE r2.competition_id = c.id AND r2.registration_status = ANY($2))
                    AS current_participants
            FROM competition_registrations r
            INNER JOIN competitions c ON c.id = r.competition_id
            WHERE r.user_id = $1
            ORDER BY r.registered_at DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .bind(active_statuses())
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Registrations whose payment still needs review, newest first.
    pub async fn list_awaiting_payment(
        &self,
    ) -> Result<Vec<RegistrationDetailEntity>, sqlx::Error> {
        let awaiting: Vec<&str> = PaymentStatus::ALL
            .iter()
            .filter(|status| status.awaiting_verification())
            .map(|status| status.as_str())
            .collect();

        let timer = QueryTimer::new("list_registrations_awaiting_payment");
        let result = sqlx::query_as::<_, RegistrationDetailEntity>(&format!(
            "SELECT {REGISTRATION_COLUMNS}, \
                u.full_name AS user_name, u.email AS user_email, \
                NULL::TEXT AS username, \
                c.name AS competition_name, NULL::TEXT AS competition_category \
             FROM competition_registrations r \
             JOIN users u ON r.user_id = u.id \
             JOIN competitions c ON r.competition_id = c.id \
             WHERE r.payment_status = ANY($1) \
             ORDER BY r.registered_at DESC, r.id DESC"
        ))
        .bind(awaiting)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Every registration with registrant and competition details, newest first.
    pub async fn list_all(&self) -> Result<Vec<RegistrationDetailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_all_registrations");
        let result = sqlx::query_as::<_, RegistrationDetailEntity>(&format!(
            "SELECT {REGISTRATION_COLUMNS}, \
                u.full_name AS user_name, u.email AS user_email, u.username, \
                c.name AS competition_name, c.category AS competition_category \
             FROM competition_registrations r \
             JOIN users u ON r.user_id = u.id \
             JOIN competitions c ON r.competition_id = c.id \
             ORDER BY r.registered_at DESC, r.id DESC"
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
