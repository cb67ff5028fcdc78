//! Admin routes: competition management and payment review.
//!
//! Every handler here sits behind `require_admin`. Payment review and the
//! registration listing are additionally rate limited per client IP.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use domain::models::{
    ActivityKind, Competition, CompetitionView, DifficultyLevel, PaymentStatus, Registration,
    RegistrationDetail, Schedule,
};
use persistence::entities::{CompetitionChanges, CompetitionEntity, NewCompetition};
use persistence::repositories::{CompetitionRepository, RegistrationRepository};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use shared::image::{self, ImageError};
use shared::validation::sanitize_opt;
use std::str::FromStr;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody};
use crate::routes::{int_field, text_field};
use crate::services::activity;

/// Largest decoded banner accepted.
pub const MAX_BANNER_BYTES: usize = 5 * 1024 * 1024;

const NAME_MAX_LEN: usize = 255;
const CATEGORY_MAX_LEN: usize = 100;
const LONG_TEXT_MAX_LEN: usize = 10_000;
const SHORT_TEXT_MAX_LEN: usize = 255;

/// Loosely typed admin payload; presence of a key matters for updates.
pub type Payload = JsonMap<String, JsonValue>;

// ============================================================================
// Field parsing
// ============================================================================

/// Sanitised text of a field. Missing, `null` and non-scalar values read as "".
fn text(payload: &Payload, key: &str) -> String {
    sanitize_opt(text_field(payload.get(key)).as_deref())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn check_len(value: &str, max: usize, message: &str) -> Result<(), ApiError> {
    if value.len() > max {
        return Err(ApiError::validation(message));
    }
    Ok(())
}

/// Parses an admin-entered instant. Values without an explicit offset are
/// taken as wall-clock time in `offset`.
pub fn parse_datetime(value: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn required_datetime(
    payload: &Payload,
    field: &str,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, ApiError> {
    let value = text(payload, field);
    if value.is_empty() {
        return Err(ApiError::validation(format!("Field '{field}' is required")));
    }
    parse_datetime(&value, offset)
        .ok_or_else(|| ApiError::validation(format!("Field '{field}' must be a valid date")))
}

/// `null` or "" clears the limit; otherwise a positive integer given as a
/// number or a string of digits.
fn parse_max_participants(value: Option<&JsonValue>) -> Result<Option<i32>, ApiError> {
    let invalid = || ApiError::validation("Max participants must be a positive integer");
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) if s.is_empty() => Ok(None),
        Some(JsonValue::String(s)) if s.bytes().all(|b| b.is_ascii_digit()) => s
            .parse::<i32>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(invalid),
        Some(JsonValue::Number(n)) => n
            .as_u64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// Exact match against the allowed difficulty strings.
fn parse_difficulty(value: &JsonValue) -> Result<DifficultyLevel, ApiError> {
    value
        .as_str()
        .and_then(|s| DifficultyLevel::from_str(s).ok())
        .ok_or_else(|| ApiError::validation("Invalid difficulty level"))
}

/// Decodes and checks a base64 banner, returning the bytes and sniffed mime.
pub fn check_banner(encoded: &str) -> Result<(Vec<u8>, &'static str), ApiError> {
    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ApiError::validation("Invalid banner data"))?;

    if data.len() > MAX_BANNER_BYTES {
        return Err(ApiError::validation(
            "Banner image must be smaller than 5MB",
        ));
    }

    match image::inspect(&data) {
        Ok(info) => Ok((data, info.format.mime())),
        Err(ImageError::UnknownSignature) if is_other_image(&data) => Err(ApiError::validation(
            "Unsupported banner image type",
        )),
        Err(_) => Err(ApiError::validation("Invalid banner image")),
    }
}

/// Recognisable image formats that are not accepted for storage.
fn is_other_image(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") || data.starts_with(b"BM")
}

fn banner_field(payload: &Payload) -> Option<&str> {
    payload
        .get("bannerData")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Competition validation
// ============================================================================

/// Validates a create payload.
pub fn validate_new_competition(
    payload: &Payload,
    offset: FixedOffset,
) -> Result<NewCompetition, ApiError> {
    let name = text(payload, "name");
    let category = text(payload, "category");
    let description = text(payload, "description");
    let prize_pool = text(payload, "prize_pool");
    let rules = text(payload, "rules");
    let contact_person = text(payload, "contact_person");

    if name.is_empty() {
        return Err(ApiError::validation("Field 'name' is required"));
    }
    check_len(&name, NAME_MAX_LEN, "Competition name must be 255 characters or less")?;
    if category.is_empty() {
        return Err(ApiError::validation("Field 'category' is required"));
    }
    check_len(&category, CATEGORY_MAX_LEN, "Category must be 100 characters or less")?;
    check_len(&description, LONG_TEXT_MAX_LEN, "Description must be 10000 characters or less")?;
    check_len(&rules, LONG_TEXT_MAX_LEN, "Rules must be 10000 characters or less")?;
    check_len(&prize_pool, SHORT_TEXT_MAX_LEN, "Prize pool must be 255 characters or less")?;
    check_len(
        &contact_person,
        SHORT_TEXT_MAX_LEN,
        "Contact person must be 255 characters or less",
    )?;

    let start_date = required_datetime(payload, "start_date", offset)?;
    let end_date = required_datetime(payload, "end_date", offset)?;
    let registration_deadline = required_datetime(payload, "registration_deadline", offset)?;

    let max_participants = parse_max_participants(payload.get("max_participants"))?;
    let difficulty_level = match payload.get("difficulty_level") {
        None | Some(JsonValue::Null) => DifficultyLevel::default(),
        Some(value) => parse_difficulty(value)?,
    };

    Schedule {
        start: start_date,
        end: end_date,
        deadline: registration_deadline,
    }
    .validate()
    .map_err(|e| ApiError::validation(e.to_string()))?;

    let encoded = banner_field(payload)
        .ok_or_else(|| ApiError::validation("Banner image is required."))?;
    let (banner, banner_mime) = check_banner(encoded)?;

    Ok(NewCompetition {
        name,
        description: non_empty(description),
        start_date,
        end_date,
        registration_deadline,
        max_participants,
        difficulty_level,
        prize_pool: non_empty(prize_pool),
        category,
        rules: non_empty(rules),
        contact_person: non_empty(contact_person),
        banner,
        banner_mime: banner_mime.to_string(),
    })
}

/// Validates an update payload against the stored competition. Only keys
/// present in the payload change; the schedule is always rewritten after
/// being re-checked as a whole.
pub fn validate_competition_changes(
    payload: &Payload,
    current: &Competition,
    offset: FixedOffset,
) -> Result<CompetitionChanges, ApiError> {
    let mut changes = CompetitionChanges::default();

    if payload.contains_key("name") {
        let name = text(payload, "name");
        if name.is_empty() {
            return Err(ApiError::validation("Field 'name' cannot be empty"));
        }
        check_len(&name, NAME_MAX_LEN, "Competition name must be 255 characters or less")?;
        changes.name = Some(name);
    }

    if payload.contains_key("description") {
        let description = text(payload, "description");
        check_len(&description, LONG_TEXT_MAX_LEN, "Description must be 10000 characters or less")?;
        changes.description = Some(non_empty(description));
    }

    if payload.contains_key("max_participants") {
        changes.max_participants = Some(parse_max_participants(payload.get("max_participants"))?);
    }

    if let Some(value) = payload.get("difficulty_level") {
        changes.difficulty_level = Some(parse_difficulty(value)?);
    }

    if payload.contains_key("prize_pool") {
        let prize_pool = text(payload, "prize_pool");
        check_len(&prize_pool, SHORT_TEXT_MAX_LEN, "Prize pool must be 255 characters or less")?;
        changes.prize_pool = Some(non_empty(prize_pool));
    }

    if payload.contains_key("category") {
        let category = text(payload, "category");
        if category.is_empty() {
            return Err(ApiError::validation("Field 'category' cannot be empty"));
        }
        check_len(&category, CATEGORY_MAX_LEN, "Category must be 100 characters or less")?;
        changes.category = Some(category);
    }

    if payload.contains_key("rules") {
        let rules = text(payload, "rules");
        check_len(&rules, LONG_TEXT_MAX_LEN, "Rules must be 10000 characters or less")?;
        changes.rules = Some(non_empty(rules));
    }

    if payload.contains_key("contact_person") {
        let contact = text(payload, "contact_person");
        check_len(
            &contact,
            SHORT_TEXT_MAX_LEN,
            "Contact person must be 255 characters or less",
        )?;
        changes.contact_person = Some(non_empty(contact));
    }

    let stored = current.schedule();
    let pick = |field: &str, stored: DateTime<Utc>| -> Result<DateTime<Utc>, ApiError> {
        if payload.contains_key(field) {
            required_datetime(payload, field, offset)
        } else {
            Ok(stored)
        }
    };
    let schedule = Schedule {
        start: pick("start_date", stored.start)?,
        end: pick("end_date", stored.end)?,
        deadline: pick("registration_deadline", stored.deadline)?,
    };
    schedule
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    changes.start_date = Some(schedule.start);
    changes.end_date = Some(schedule.end);
    changes.registration_deadline = Some(schedule.deadline);

    if let Some(encoded) = banner_field(payload) {
        let (data, mime) = check_banner(encoded)?;
        changes.banner = Some((data, mime.to_string()));
    }

    Ok(changes)
}

fn competition_id(payload: &Payload) -> Result<i32, ApiError> {
    i32::try_from(int_field(payload.get("id")))
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation("Competition ID is required"))
}

fn competition_view(entity: CompetitionEntity, current_participants: i64) -> CompetitionView {
    CompetitionView::new(Competition::from(entity), current_participants, Utc::now())
}

// ============================================================================
// Competition handlers
// ============================================================================

/// Response for create and update.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitionMutationResponse {
    pub success: bool,
    pub competition: CompetitionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessMessageResponse {
    pub success: bool,
    pub message: String,
}

/// Every competition with live counts, newest first.
///
/// GET /api/admin/manage_competitions
pub async fn list_competitions(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompetitionView>>, ApiError> {
    let competitions = CompetitionRepository::new(state.pool.clone())
        .list_newest_first()
        .await?
        .into_iter()
        .map(|row| competition_view(row.competition, row.current_participants))
        .collect();

    Ok(Json(competitions))
}

/// POST /api/admin/manage_competitions
pub async fn create_competition(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<(StatusCode, Json<CompetitionMutationResponse>), ApiError> {
    let new = validate_new_competition(&payload, state.config.app.offset())?;

    let entity = CompetitionRepository::new(state.pool.clone())
        .create(&new)
        .await?;
    let competition = competition_view(entity, 0);

    activity::record(
        &state.pool,
        auth.user.id,
        ActivityKind::AdminCompetitionCreate,
        None,
        Some(json!({ "competitionId": competition.id })),
    )
    .await;
    info!(
        admin_id = auth.user.id,
        competition_id = competition.id,
        banner_bytes = new.banner.len(),
        "Competition created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CompetitionMutationResponse {
            success: true,
            competition,
            message: Some("Competition created successfully".to_string()),
        }),
    ))
}

/// PUT /api/admin/manage_competitions
pub async fn update_competition(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<Json<CompetitionMutationResponse>, ApiError> {
    let id = competition_id(&payload)?;
    let repo = CompetitionRepository::new(state.pool.clone());
    let not_found = || ApiError::NotFound("Competition not found".to_string());

    let current = repo
        .find_by_id(id)
        .await?
        .map(Competition::from)
        .ok_or_else(not_found)?;

    let changes = validate_competition_changes(&payload, &current, state.config.app.offset())?;
    repo.update(id, &changes).await?.ok_or_else(not_found)?;

    let row = repo.find_with_count(id).await?.ok_or_else(not_found)?;
    let competition = competition_view(row.competition, row.current_participants);

    activity::record(
        &state.pool,
        auth.user.id,
        ActivityKind::AdminCompetitionUpdate,
        None,
        Some(json!({ "competitionId": id })),
    )
    .await;
    info!(
        admin_id = auth.user.id,
        competition_id = id,
        banner_replaced = changes.banner.is_some(),
        "Competition updated"
    );

    Ok(Json(CompetitionMutationResponse {
        success: true,
        competition,
        message: None,
    }))
}

/// Query fallback for clients that send the id of a DELETE in the URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

/// Deletes the competition and, by cascade, its registrations.
///
/// DELETE /api/admin/manage_competitions
pub async fn delete_competition(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DeleteQuery>,
    JsonBody(mut payload): JsonBody<Payload>,
) -> Result<Json<SuccessMessageResponse>, ApiError> {
    if !payload.contains_key("id") {
        if let Some(id) = query.id {
            payload.insert("id".to_string(), JsonValue::String(id));
        }
    }
    let id = competition_id(&payload)?;

    let deleted = CompetitionRepository::new(state.pool.clone())
        .delete(id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Competition not found".to_string()));
    }

    activity::record(
        &state.pool,
        auth.user.id,
        ActivityKind::AdminCompetitionDelete,
        None,
        Some(json!({ "competitionId": id })),
    )
    .await;
    info!(admin_id = auth.user.id, competition_id = id, "Competition deleted");

    Ok(Json(SuccessMessageResponse {
        success: true,
        message: "Competition deleted".to_string(),
    }))
}

// ============================================================================
// Payment review
// ============================================================================

/// Registrations whose payment is unpaid or pending, newest first.
///
/// GET /api/admin/verify_payments
pub async fn payments_awaiting_review(
    State(state): State<AppState>,
) -> Result<Json<Vec<RegistrationDetail>>, ApiError> {
    let registrations = RegistrationRepository::new(state.pool.clone())
        .list_awaiting_payment()
        .await?
        .into_iter()
        .map(RegistrationDetail::from)
        .collect();

    Ok(Json(registrations))
}

/// Request body for a payment status change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyPaymentRequest {
    pub registration_id: Option<JsonValue>,
    pub payment_status: Option<JsonValue>,
}

impl VerifyPaymentRequest {
    pub fn validate(&self) -> Result<(i32, PaymentStatus), ApiError> {
        let registration_id = i32::try_from(int_field(self.registration_id.as_ref()))
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::validation("Registration ID is required"))?;

        let status = sanitize_opt(text_field(self.payment_status.as_ref()).as_deref());
        let payment_status = PaymentStatus::from_str(&status)
            .map_err(|_| ApiError::validation("Invalid payment status"))?;

        Ok((registration_id, payment_status))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub registration: Registration,
}

/// Set a registration's payment status. `paid` approves the registration
/// and `refunded` cancels it.
///
/// POST /api/admin/verify_payments
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(request): JsonBody<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let (registration_id, payment_status) = request.validate()?;

    let mut tx = state.pool.begin().await?;
    let registration =
        RegistrationRepository::update_payment(&mut *tx, registration_id, payment_status)
            .await?
            .ok_or_else(|| ApiError::NotFound("Registration not found".to_string()))?;
    tx.commit().await?;

    activity::record(
        &state.pool,
        auth.user.id,
        ActivityKind::AdminPaymentUpdate,
        None,
        Some(json!({
            "registrationId": registration_id,
            "paymentStatus": payment_status.as_str(),
        })),
    )
    .await;
    info!(
        admin_id = auth.user.id,
        registration_id,
        payment_status = payment_status.as_str(),
        "Registration payment status updated"
    );

    Ok(Json(VerifyPaymentResponse {
        success: true,
        registration: Registration::from(registration),
    }))
}

/// Every registration with registrant and competition details.
///
/// GET /api/admin/get_registrations
pub async fn get_registrations(
    State(state): State<AppState>,
) -> Result<Json<Vec<RegistrationDetail>>, ApiError> {
    let registrations = RegistrationRepository::new(state.pool.clone())
        .list_all()
        .await?
        .into_iter()
        .map(RegistrationDetail::from)
        .collect();

    Ok(Json(registrations))
}
