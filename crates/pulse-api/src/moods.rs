use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use uuid::Uuid;

use pulse_db::models::MoodRow;
use pulse_db::timestamp;
use pulse_types::api::{Claims, MoodCreateRequest, MoodCreateResponse};
use pulse_types::events::PartnerEvent;
use pulse_types::models::Mood;

use crate::auth::AppState;
use crate::{ApiError, blocking, convert, load_user, require_couple};

/// Mood types that trigger an AI task suggestion alongside the mood itself.
const SPICY_MOODS: &[&str] = &["feeling_spicy", "horny", "teasing"];

pub async fn create_mood(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MoodCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(1..=5).contains(&req.intensity) {
        return Err(ApiError::BadRequest("intensity must be between 1 and 5"));
    }
    if req.duration_minutes <= 0 {
        return Err(ApiError::BadRequest("duration must be positive"));
    }
    if req.mood_type.trim().is_empty() {
        return Err(ApiError::BadRequest("mood_type required"));
    }

    let user = load_user(&state, claims.sub).await?;
    let couple_id = require_couple(&user)?;

    let now = Utc::now();
    let row = MoodRow {
        id: Uuid::new_v4().to_string(),
        couple_id: couple_id.clone(),
        user_id: user.id.clone(),
        mood_type: req.mood_type.trim().to_string(),
        intensity: req.intensity,
        expires_at: timestamp(now + Duration::minutes(req.duration_minutes)),
        created_at: timestamp(now),
    };
    let mood: Mood = {
        let db = state.db.clone();
        let mood = convert::mood(&row);
        blocking(move || db.insert_mood(&row)).await?;
        mood
    };

    state
        .registry
        .notify_partner(
            mood.couple_id,
            claims.sub,
            PartnerEvent::MoodUpdate { mood: mood.clone() },
        )
        .await;

    // Spicy moods come with a task idea attached. Best-effort: the provider
    // can fail, the fallback table cannot.
    let ai_suggestion = if SPICY_MOODS.contains(&mood.mood_type.as_str()) {
        let boundaries = convert::boundaries(&user);
        Some(
            state
                .suggestions
                .suggest(&mood.mood_type, mood.intensity, &boundaries, false)
                .await,
        )
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(MoodCreateResponse {
            mood,
            ai_suggestion,
        }),
    ))
}

/// Active (unexpired) moods for the couple, newest first. An unpaired user
/// has no couple and therefore no moods: an empty list, not an error.
pub async fn get_moods(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Mood>>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    let Some(couple_id) = user.couple_id else {
        return Ok(Json(Vec::new()));
    };

    let rows = {
        let db = state.db.clone();
        blocking(move || db.active_moods(&couple_id, &pulse_db::now_timestamp(), 10)).await?
    };

    Ok(Json(rows.iter().map(convert::mood).collect()))
}
