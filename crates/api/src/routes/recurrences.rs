use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use postq_core::error::EngineError;
use postq_db::models::MediaKind;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/users/{user_id}/recurrences", post(create_recurrence))
        .route(
            "/v1/users/{user_id}/recurrences/{recurrence_id}",
            delete(stop_recurrence),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecurrenceRequest {
    channel_id: String,
    media_ref: String,
    media_type: Option<MediaKind>,
    caption: Option<String>,
    start_time: DateTime<Utc>,
    interval_secs: i64,
    /// Stop after this many occurrences. Takes precedence over `endDate`
    /// when both are set.
    end_count: Option<i32>,
    end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecurrenceResponse {
    id: String,
    channel_id: String,
    interval_secs: i64,
    first_occurrence_id: String,
    first_occurrence_at: DateTime<Utc>,
}

/// Create a recurrence and its first occurrence in one step. The store
/// never holds more than one pending occurrence per recurrence; the firing
/// engine inserts the next one only after this one publishes.
async fn create_recurrence(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<CreateRecurrenceRequest>,
) -> ApiResult<Json<RecurrenceResponse>> {
    let registered =
        postq_db::queries::channels::is_registered(&state.db, &user_id, &payload.channel_id)
            .await?;
    if !registered {
        return Err(ApiError::InvalidChannel {
            user_id,
            channel_id: payload.channel_id,
        });
    }

    if payload.interval_secs < 1 {
        return Err(ApiError::BadRequest(
            "intervalSecs must be at least 1".to_string(),
        ));
    }
    if let Some(count) = payload.end_count {
        if count < 1 {
            return Err(ApiError::BadRequest("endCount must be at least 1".to_string()));
        }
    }
    if payload.start_time <= Utc::now() {
        return Err(ApiError::PastTime);
    }
    if !state.media.exists(&payload.media_ref).await {
        return Err(EngineError::MissingMedia(payload.media_ref).into());
    }

    let recurrence_id = format!("rec_{}", nanoid::nanoid!(12));
    let recurrence = postq_db::queries::recurrences::create(
        &state.db,
        &recurrence_id,
        &user_id,
        &payload.channel_id,
        payload.interval_secs,
        payload.end_count,
        payload.end_date,
        &payload.media_ref,
        payload.media_type.unwrap_or(MediaKind::Photo),
        payload.caption.as_deref(),
    )
    .await?;

    let occurrence_id = format!("post_{}", nanoid::nanoid!(12));
    let occurrence = postq_db::queries::posts::create_occurrence(
        &state.db,
        &occurrence_id,
        &user_id,
        &recurrence.channel_id,
        &recurrence.media_ref,
        recurrence.media_type,
        recurrence.caption.as_deref(),
        &recurrence.id,
        payload.start_time,
    )
    .await?;

    Ok(Json(RecurrenceResponse {
        id: recurrence.id,
        channel_id: recurrence.channel_id,
        interval_secs: recurrence.interval_secs,
        first_occurrence_id: occurrence.id,
        first_occurrence_at: payload.start_time,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRecurrenceResponse {
    stopped: String,
    cleared: usize,
}

/// Stop a recurrence: deactivate it and remove its pending occurrence.
/// The template blob is released here, since no future occurrence will
/// need it.
async fn stop_recurrence(
    State(state): State<AppState>,
    Path((user_id, recurrence_id)): Path<(String, String)>,
) -> ApiResult<Json<StopRecurrenceResponse>> {
    let recurrence = postq_db::queries::recurrences::get_by_id(&state.db, &recurrence_id)
        .await?
        .filter(|r| r.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound("recurrence not found".to_string()))?;

    let cleared = postq_db::queries::recurrences::stop(&state.db, &user_id, &recurrence_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("recurrence not found".to_string()))?;

    // Cleared occurrences all reference the template blob; one delete
    // covers them.
    state.media.delete(&recurrence.media_ref).await;

    Ok(Json(StopRecurrenceResponse {
        stopped: recurrence_id,
        cleared: cleared.len(),
    }))
}
