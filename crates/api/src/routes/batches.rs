use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use postq_core::schedule;
use postq_db::models::{BatchState, PostMode, PostStatus};
use postq_db::queries::batches::BatchSummary;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    routes::posts::{resolve_times, ScheduleRequest},
    routes::release_blobs,
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/users/{user_id}/batches",
            post(create_batch).get(list_batches),
        )
        .route(
            "/v1/users/{user_id}/batches/{batch_id}",
            axum::routing::delete(delete_batch),
        )
        .route(
            "/v1/users/{user_id}/batches/{batch_id}/schedule",
            post(schedule_batch),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBatchRequest {
    name: String,
    channel_id: String,
    mode: PostMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    id: String,
    name: String,
    channel_id: String,
    mode: PostMode,
    state: BatchState,
}

async fn create_batch(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<CreateBatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name required".to_string()));
    }

    let registered =
        postq_db::queries::channels::is_registered(&state.db, &user_id, &payload.channel_id)
            .await?;
    if !registered {
        return Err(ApiError::InvalidChannel {
            user_id,
            channel_id: payload.channel_id,
        });
    }

    let id = format!("bat_{}", nanoid::nanoid!(12));
    let batch = postq_db::queries::batches::create(
        &state.db,
        &id,
        &user_id,
        payload.name.trim(),
        &payload.channel_id,
        payload.mode,
    )
    .await
    .map_err(|err| match &err {
        // UNIQUE(user_id, name)
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::BadRequest(format!("batch name {:?} already in use", payload.name.trim()))
        }
        _ => ApiError::Db(err),
    })?;

    Ok(Json(BatchResponse {
        id: batch.id,
        name: batch.name,
        channel_id: batch.channel_id,
        mode: batch.mode,
        state: batch.state,
    }))
}

async fn list_batches(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<BatchSummary>>> {
    let batches = postq_db::queries::batches::list_for_user(&state.db, &user_id).await?;
    Ok(Json(batches))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleBatchRequest {
    times: Option<Vec<DateTime<Utc>>>,
    start_time: Option<DateTime<Utc>>,
    interval_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleBatchResponse {
    scheduled: usize,
    times: Vec<DateTime<Utc>>,
}

/// Schedule every queued post of the batch in creation order, then move the
/// batch to `scheduled`. The batch already guarantees one channel and one
/// mode, so only the time math is shared with the loose-post path.
async fn schedule_batch(
    State(state): State<AppState>,
    Path((user_id, batch_id)): Path<(String, String)>,
    Json(payload): Json<ScheduleBatchRequest>,
) -> ApiResult<Json<ScheduleBatchResponse>> {
    let batch = postq_db::queries::batches::get_by_id(&state.db, &user_id, &batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch not found".to_string()))?;
    if batch.state != BatchState::Populated {
        return Err(ApiError::BadRequest(
            "batch has no queued posts or is already scheduled".to_string(),
        ));
    }

    let queued =
        postq_db::queries::posts::list_by_batch(&state.db, &user_id, &batch_id, PostStatus::Queued)
            .await?;
    if queued.is_empty() {
        return Err(ApiError::BadRequest("batch has no queued posts".to_string()));
    }

    let request = ScheduleRequest {
        post_ids: queued.iter().map(|p| p.id.clone()).collect(),
        times: payload.times,
        start_time: payload.start_time,
        interval_secs: payload.interval_secs,
    };
    let window = postq_db::queries::windows::get(&state.db, &user_id)
        .await?
        .unwrap_or_default();
    let now = Utc::now();
    let times = resolve_times(
        &request,
        queued.len(),
        state.settings.default_interval_secs,
        &window,
        state.settings.tz(),
        now,
    )?;
    schedule::validate_times(&times, now).map_err(ApiError::from)?;

    let assignments: Vec<(String, DateTime<Utc>)> = request
        .post_ids
        .iter()
        .cloned()
        .zip(times.iter().copied())
        .collect();

    postq_db::queries::posts::schedule_many(&state.db, &user_id, &assignments)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => {
                ApiError::BadRequest("a post left the queue during scheduling".to_string())
            }
            other => other.into(),
        })?;

    postq_db::queries::batches::mark_scheduled(&state.db, &batch_id).await?;

    Ok(Json(ScheduleBatchResponse {
        scheduled: assignments.len(),
        times,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBatchResponse {
    cleared: usize,
}

async fn delete_batch(
    State(state): State<AppState>,
    Path((user_id, batch_id)): Path<(String, String)>,
) -> ApiResult<Json<DeleteBatchResponse>> {
    let cleared = postq_db::queries::batches::delete(&state.db, &user_id, &batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch not found".to_string()))?;

    release_blobs(state.media.as_ref(), &cleared).await;

    Ok(Json(DeleteBatchResponse {
        cleared: cleared.len(),
    }))
}
