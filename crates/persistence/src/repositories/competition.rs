//! Competition repository for database operations.

use sqlx::{PgConnection, PgPool};

use super::registration::active_statuses;
use crate::entities::competition::COMPETITION_COLUMNS;
use crate::entities::{
    CompetitionChanges, CompetitionEntity, CompetitionWithCountEntity, ImageBlobEntity,
    NewCompetition,
};
use crate::metrics::QueryTimer;

/// Repository for competition operations.
#[derive(Clone)]
pub struct CompetitionRepository {
    pool: PgPool,
}

impl CompetitionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All competitions with participant counts, soonest start first.
    pub async fn list_by_start_date(&self) -> Result<Vec<CompetitionWithCountEntity>, sqlx::Error> {
        self.list_with_counts("list_competitions_by_start", "c.start_date ASC, c.id ASC")
            .await
    }

    /// All competitions with participant counts, newest first.
    pub async fn list_newest_first(&self) -> Result<Vec<CompetitionWithCountEntity>, sqlx::Error> {
        self.list_with_counts("list_competitions_newest", "c.created_at DESC, c.id DESC")
            .await
    }

    async fn list_with_counts(
        &self,
        query_name: &'static str,
        order_by: &'static str,
    ) -> Result<Vec<CompetitionWithCountEntity>, sqlx::Error> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query_as::<_, CompetitionWithCountEntity>(&format!(
            "SELECT {COMPETITION_COLUMNS}, \
                (SELECT COUNT(*) FROM competition_registrations r \
                 WHERE r.competition_id = c.id AND r.registration_status = ANY($1)) \
                AS current_participants \
             FROM competitions c \
             ORDER BY {order_by}"
        ))
        .bind(active_statuses())
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a competition with its participant count.
    pub async fn find_with_count(
        &self,
        id: i32,
    ) -> Result<Option<CompetitionWithCountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_competition_with_count");
        let result = sqlx::query_as::<_, CompetitionWithCountEntity>(&format!(
            "SELECT {COMPETITION_COLUMNS}, \
                (SELECT COUNT(*) FROM competition_registrations r \
                 WHERE r.competition_id = c.id AND r.registration_status = ANY($2)) \
                AS current_participants \
             FROM competitions c \
             WHERE c.id = $1"
        ))
        .bind(id)
        .bind(active_statuses())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a competition by ID.
    pub async fn find_by_id(&self, id: i32) -> Result<Option<CompetitionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_competition_by_id");
        let result = sqlx::query_as::<_, CompetitionEntity>(&format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Load and row-lock a competition for the rest of the transaction.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: i32,
    ) -> Result<Option<CompetitionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_competition_by_id");
        let result = sqlx::query_as::<_, CompetitionEntity>(&format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions c WHERE c.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Insert a competition.
    pub async fn create(&self, new: &NewCompetition) -> Result<CompetitionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_competition");
        let result = sqlx::query_as::<_, CompetitionEntity>(&format!(
            "INSERT INTO competitions AS c \
                (name, description, start_date, end_date, registration_deadline, \
                 max_participants, difficulty_level, prize_pool, category, rules, \
                 contact_person, banner, banner_mime, banner_updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW()) \
             RETURNING {COMPETITION_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.registration_deadline)
        .bind(new.max_participants)
        .bind(new.difficulty_level.as_str())
        .bind(new.prize_pool.as_deref())
        .bind(&new.category)
        .bind(new.rules.as_deref())
        .bind(new.contact_person.as_deref())
        .bind(&new.banner)
        .bind(&new.banner_mime)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Apply a partial update. Returns `None` when the competition is gone.
    pub async fn update(
        &self,
        id: i32,
        changes: &CompetitionChanges,
    ) -> Result<Option<CompetitionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_competition");
        let (banner, banner_mime) = match &changes.banner {
            Some((data, mime)) => (Some(data.as_slice()), Some(mime.as_str())),
            None => (None, None),
        };
        let result = sqlx::query_as::<_, CompetitionEntity>(&format!(
            "UPDATE competitions AS c SET \
                name = COALESCE($2, name), \
                description = CASE WHEN $3 THEN $4 ELSE description END, \
                start_date = COALESCE($5, start_date), \
                end_date = COALESCE($6, end_date), \
                registration_deadline = COALESCE($7, registration_deadline), \
                max_participants = CASE WHEN $8 THEN $9 ELSE max_participants END, \
                difficulty_level = COALESCE($10, difficulty_level), \
                prize_pool = CASE WHEN $11 THEN $12 ELSE prize_pool END, \
                category = COALESCE($13, category), \
                rules = CASE WHEN $14 THEN $15 ELSE rules END, \
                contact_person = CASE WHEN $16 THEN $17 ELSE contact_person END, \
                banner = COALESCE($18, banner), \
                banner_mime = COALESCE($19, banner_mime), \
                banner_updated_at = CASE WHEN $18 IS NULL THEN banner_updated_at ELSE NOW() END \
             WHERE c.id = $1 \
             RETURNING {COMPETITION_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.registration_deadline)
        .bind(changes.max_participants.is_some())
        .bind(changes.max_participants.flatten())
        .bind(changes.difficulty_level.map(|d| d.as_str()))
        .bind(changes.prize_pool.is_some())
        .bind(changes.prize_pool.clone().flatten())
        .bind(changes.category.as_deref())
        .bind(changes.rules.is_some())
        .bind(changes.rules.clone().flatten())
        .bind(changes.contact_person.is_some())
        .bind(changes.contact_person.clone().flatten())
        .bind(banner)
        .bind(banner_mime)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete a competition and, by cascade, its registrations.
    pub async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_competition");
        let result = sqlx::query("DELETE FROM competitions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Load the banner bytes, if any.
    pub async fn find_banner(&self, id: i32) -> Result<Option<ImageBlobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_competition_banner");
        let result = sqlx::query_as::<_, ImageBlobEntity>(
            r#"
            SELECT banner AS data, banner_mime AS mime
            FROM competitions
            WHERE id = $1 AND banner IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
