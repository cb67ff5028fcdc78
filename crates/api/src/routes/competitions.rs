//! Competition routes for participants: the public listing, team
//! registration and the caller's own registrations.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use domain::models::{
    ActivityKind, Competition, CompetitionView, MyRegistration, Registration,
};
use domain::services::check_eligibility;
use persistence::repositories::{CompetitionRepository, RegistrationRepository};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use shared::validation::sanitize_string;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody};
use crate::middleware::metrics::record_competition_registration;
use crate::middleware::RateLimitPolicy;
use crate::routes::{int_field, text_field};
use crate::services::activity;

/// Response for the public listing.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitionListResponse {
    pub competitions: Vec<CompetitionView>,
}

/// Every competition with its live status, soonest start first.
///
/// GET /api/competitions
pub async fn list_competitions(
    State(state): State<AppState>,
) -> Result<Json<CompetitionListResponse>, ApiError> {
    let now = Utc::now();
    let competitions = CompetitionRepository::new(state.pool.clone())
        .list_by_start_date()
        .await?
        .into_iter()
        .map(|row| {
            CompetitionView::new(
                Competition::from(row.competition),
                row.current_participants,
                now,
            )
        })
        .collect();

    Ok(Json(CompetitionListResponse { competitions }))
}

/// Request body for registering a team. The id may arrive as a number or a
/// numeric string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterCompetitionRequest {
    pub competition_id: Option<JsonValue>,
    pub team_name: Option<JsonValue>,
    pub registration_notes: Option<JsonValue>,
}

/// Validated registration input.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct TeamRegistration {
    pub competition_id: i32,
    #[validate(length(max = 255, message = "Team name must be 255 characters or fewer"))]
    pub team_name: String,
    #[validate(length(
        max = 1000,
        message = "Registration notes must be 1000 characters or fewer"
    ))]
    pub notes: Option<String>,
}

const REGISTRATION_FIELDS: [&str; 2] = ["team_name", "notes"];

impl RegisterCompetitionRequest {
    pub fn validate(&self) -> Result<TeamRegistration, ApiError> {
        let competition_id = i32::try_from(int_field(self.competition_id.as_ref()))
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::validation("Competition ID is required"))?;

        let team_name = text_field(self.team_name.as_ref())
            .map(|t| sanitize_string(&t))
            .unwrap_or_default();
        if team_name.is_empty() {
            return Err(ApiError::validation("Team name is required"));
        }

        let registration = TeamRegistration {
            competition_id,
            team_name,
            notes: text_field(self.registration_notes.as_ref())
                .map(|n| sanitize_string(&n))
                .filter(|n| !n.is_empty()),
        };
        registration
            .validate()
            .map_err(|errors| ApiError::from_validation(errors, &REGISTRATION_FIELDS))?;
        Ok(registration)
    }
}

/// Response for a created registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterCompetitionResponse {
    pub success: bool,
    pub message: String,
    pub registration: Registration,
}

/// Register the caller's team for a competition.
///
/// The competition row is locked for the duration of the checks so that
/// concurrent registrations cannot overfill it.
///
/// POST /api/register_competition
pub async fn register_competition(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(request): JsonBody<RegisterCompetitionRequest>,
) -> Result<(StatusCode, Json<RegisterCompetitionResponse>), ApiError> {
    let user_id = auth.user.id;
    state
        .rate_limiter
        .enforce(RateLimitPolicy::RegisterCompetition, &user_id.to_string())?;

    let input = request.validate()?;

    let mut tx = state.pool.begin().await?;

    let competition = CompetitionRepository::lock_by_id(&mut *tx, input.competition_id)
        .await?
        .map(Competition::from)
        .ok_or_else(|| ApiError::NotFound("Competition not found".to_string()))?;

    let current = RegistrationRepository::count_active(&mut *tx, competition.id).await?;
    check_eligibility(&competition, current, Utc::now())
        .map_err(|rejection| ApiError::validation(rejection.to_string()))?;

    if RegistrationRepository::exists_for_user(&mut *tx, user_id, competition.id).await? {
        return Err(ApiError::Conflict(
            "You are already registered for this competition".to_string(),
        ));
    }

    if RegistrationRepository::team_name_taken(&mut *tx, competition.id, &input.team_name).await? {
        return Err(ApiError::Conflict(
            "Team name already taken for this competition. Please choose another name."
                .to_string(),
        ));
    }

    let registration = RegistrationRepository::create(
        &mut *tx,
        user_id,
        competition.id,
        &input.team_name,
        input.notes.as_deref(),
    )
    .await?;

    tx.commit().await?;

    activity::record(
        &state.pool,
        user_id,
        ActivityKind::CompetitionRegister,
        None,
        Some(json!({
            "competitionId": competition.id,
            "competitionName": competition.name,
        })),
    )
    .await;
    record_competition_registration();
    info!(
        user_id,
        competition_id = competition.id,
        registration_id = registration.id,
        "Team registered for competition"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterCompetitionResponse {
            success: true,
            message: "Successfully registered for competition".to_string(),
            registration: Registration::from(registration),
        }),
    ))
}

/// Response for the caller's registrations.
#[derive(Debug, Clone, Serialize)]
pub struct MyCompetitionsResponse {
    pub registrations: Vec<MyRegistration>,
}

/// The caller's registrations with competition details, newest first.
///
/// GET /api/my_competitions
pub async fn my_competitions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MyCompetitionsResponse>, ApiError> {
    let now = Utc::now();
    let registrations = RegistrationRepository::new(state.pool.clone())
        .list_for_user(auth.user.id)
        .await?
        .into_iter()
        .map(|row| row.into_domain(now))
        .collect();

    Ok(Json(MyCompetitionsResponse { registrations }))
}
