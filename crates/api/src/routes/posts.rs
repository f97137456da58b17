use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use postq_core::error::EngineError;
use postq_core::schedule;
use postq_core::scope::QueueScope;
use postq_core::types::{PostMode as CorePostMode, PostingWindow};
use postq_db::models::{MediaKind, Post, PostMode, PostStatus};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    routes::release_blobs,
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/users/{user_id}/posts", post(enqueue))
        .route("/v1/users/{user_id}/posts/schedule", post(schedule_posts))
        .route("/v1/users/{user_id}/posts/{post_id}/retry", post(retry_post))
        .route(
            "/v1/users/{user_id}/channels/{channel_id}/queued",
            get(list_queued).delete(clear_queued_channel),
        )
        .route(
            "/v1/users/{user_id}/channels/{channel_id}/scheduled",
            delete(clear_scheduled_channel),
        )
        // Cross-channel clears are deliberately separate routes: reaching
        // every channel requires naming this path, never omitting a filter.
        .route("/v1/users/{user_id}/queued", delete(clear_queued_all))
        .route("/v1/users/{user_id}/scheduled", delete(clear_scheduled_all))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueRequest {
    /// Omitted means "use the default channel", if one is set.
    channel_id: Option<String>,
    mode: PostMode,
    media_ref: String,
    media_type: Option<MediaKind>,
    caption: Option<String>,
    batch_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    id: String,
    channel_id: String,
    mode: PostMode,
    status: PostStatus,
    scheduled_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        PostResponse {
            id: post.id,
            channel_id: post.channel_id,
            mode: post.mode,
            status: post.status,
            scheduled_time: post.scheduled_time,
            created_at: post.created_at,
        }
    }
}

async fn enqueue(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<EnqueueRequest>,
) -> ApiResult<Json<PostResponse>> {
    // Channel ownership is checked before any mutation; a user with no
    // registered channels lands here too.
    let channel_id = match payload.channel_id {
        Some(channel_id) => {
            let registered =
                postq_db::queries::channels::is_registered(&state.db, &user_id, &channel_id)
                    .await?;
            if !registered {
                return Err(ApiError::InvalidChannel {
                    user_id,
                    channel_id,
                });
            }
            channel_id
        }
        None => postq_db::queries::channels::get_default(&state.db, &user_id)
            .await?
            .map(|c| c.channel_id)
            .ok_or_else(|| {
                ApiError::BadRequest(
                    "channelId required when no default channel is set".to_string(),
                )
            })?,
    };
    if !state.media.exists(&payload.media_ref).await {
        return Err(EngineError::MissingMedia(payload.media_ref).into());
    }

    if let Some(batch_id) = payload.batch_id.as_deref() {
        let batch = postq_db::queries::batches::get_by_id(&state.db, &user_id, batch_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("batch not found".to_string()))?;

        match batch.state {
            postq_db::models::BatchState::Created | postq_db::models::BatchState::Populated => {}
            _ => return Err(ApiError::BadRequest("batch is no longer accepting posts".to_string())),
        }
        if batch.channel_id != channel_id {
            return Err(ApiError::BadRequest(
                "post channel differs from batch channel".to_string(),
            ));
        }
        if batch.mode != payload.mode {
            return Err(ApiError::BadRequest(
                "post mode differs from batch mode".to_string(),
            ));
        }
    }

    let id = format!("post_{}", nanoid::nanoid!(12));
    let created = postq_db::queries::posts::create(
        &state.db,
        &id,
        &user_id,
        &channel_id,
        payload.mode,
        &payload.media_ref,
        payload.media_type.unwrap_or(MediaKind::Photo),
        payload.caption.as_deref(),
        payload.batch_id.as_deref(),
    )
    .await?;

    if let Some(batch_id) = payload.batch_id.as_deref() {
        postq_db::queries::batches::mark_populated(&state.db, batch_id).await?;
    }

    Ok(Json(created.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub post_ids: Vec<String>,
    /// One explicit time per post (described flow).
    pub times: Option<Vec<DateTime<Utc>>>,
    /// Bulk flow: evenly distribute from here instead.
    pub start_time: Option<DateTime<Utc>>,
    pub interval_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleResponse {
    scheduled: usize,
    times: Vec<DateTime<Utc>>,
}

/// Resolve the request into one target time per post. Pure so the three
/// placement flavors stay testable without a running server.
///
/// Explicit `times` win, then `startTime` + even spacing; with neither,
/// slots come from the user's daily posting window starting tomorrow in
/// the configured timezone.
pub fn resolve_times(
    payload: &ScheduleRequest,
    post_count: usize,
    default_interval_secs: i64,
    window: &PostingWindow,
    tz: chrono_tz::Tz,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, ApiError> {
    if let Some(times) = &payload.times {
        if times.len() != post_count {
            return Err(EngineError::CountMismatch {
                posts: post_count,
                times: times.len(),
            }
            .into());
        }
        return Ok(times.clone());
    }

    if let Some(start) = payload.start_time {
        let interval = payload.interval_secs.unwrap_or(default_interval_secs);
        return Ok(schedule::distribute(
            start,
            post_count,
            Duration::seconds(interval),
        ));
    }

    let first_day = now.with_timezone(&tz).date_naive() + Duration::days(1);
    Ok(schedule::window_slots(window, post_count, first_day, tz))
}

async fn schedule_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<ScheduleRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    if payload.post_ids.is_empty() {
        return Err(ApiError::BadRequest("postIds must not be empty".to_string()));
    }

    let posts =
        postq_db::queries::posts::list_by_ids(&state.db, &user_id, &payload.post_ids).await?;
    if posts.len() != payload.post_ids.len() {
        return Err(ApiError::NotFound("one or more posts not found".to_string()));
    }
    if posts.iter().any(|p| p.status != PostStatus::Queued) {
        return Err(ApiError::BadRequest(
            "only queued posts can be scheduled".to_string(),
        ));
    }

    let channel_ids: Vec<String> = posts.iter().map(|p| p.channel_id.clone()).collect();
    schedule::single_channel(&channel_ids).map_err(ApiError::from)?;

    let window = postq_db::queries::windows::get(&state.db, &user_id)
        .await?
        .unwrap_or_default();
    let now = Utc::now();
    let times = resolve_times(
        &payload,
        posts.len(),
        state.settings.default_interval_secs,
        &window,
        state.settings.tz(),
        now,
    )?;
    schedule::validate_times(&times, now).map_err(ApiError::from)?;

    let assignments: Vec<(String, DateTime<Utc>)> = posts
        .iter()
        .map(|p| p.id.clone())
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

    Ok(Json(ScheduleResponse {
        scheduled: assignments.len(),
        times,
    }))
}

async fn retry_post(
    State(state): State<AppState>,
    Path((user_id, post_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let retried = postq_db::queries::posts::retry_failed(&state.db, &user_id, &post_id).await?;
    if !retried {
        return Err(ApiError::NotFound("failed post not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "requeued": post_id })))
}

#[derive(Debug, Deserialize)]
struct ModeFilter {
    mode: Option<CorePostMode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    cleared: usize,
}

async fn list_queued(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
    Query(filter): Query<ModeFilter>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let mut scope = QueueScope::channel(user_id, channel_id);
    scope.mode = filter.mode;
    let posts =
        postq_db::queries::posts::list_in_scope(&state.db, &scope, PostStatus::Queued).await?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

async fn clear_queued_channel(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
    Query(filter): Query<ModeFilter>,
) -> ApiResult<Json<ClearResponse>> {
    let mut scope = QueueScope::channel(user_id, channel_id);
    scope.mode = filter.mode;
    clear(&state, &scope, PostStatus::Queued).await
}

async fn clear_queued_all(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(filter): Query<ModeFilter>,
) -> ApiResult<Json<ClearResponse>> {
    let mut scope = QueueScope::all_channels(user_id);
    scope.mode = filter.mode;
    clear(&state, &scope, PostStatus::Queued).await
}

async fn clear_scheduled_channel(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
) -> ApiResult<Json<ClearResponse>> {
    let scope = QueueScope::channel(user_id, channel_id);
    clear(&state, &scope, PostStatus::Scheduled).await
}

async fn clear_scheduled_all(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ClearResponse>> {
    let scope = QueueScope::all_channels(user_id);
    clear(&state, &scope, PostStatus::Scheduled).await
}

/// Shared clear path: scoped delete, then blob cleanup. Deleting a
/// `scheduled` row is also its job cancellation; the firing engine can
/// no longer claim what no longer exists.
async fn clear(
    state: &AppState,
    scope: &QueueScope,
    status: PostStatus,
) -> ApiResult<Json<ClearResponse>> {
    let cleared = postq_db::queries::posts::delete_by_scope(&state.db, scope, status).await?;
    release_blobs(state.media.as_ref(), &cleared).await;
    Ok(Json(ClearResponse {
        cleared: cleared.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn resolve(payload: &ScheduleRequest, count: usize) -> Result<Vec<DateTime<Utc>>, ApiError> {
        resolve_times(
            payload,
            count,
            7200,
            &PostingWindow::default(),
            chrono_tz::UTC,
            utc("2025-06-01T12:00:00Z"),
        )
    }

    #[test]
    fn test_resolve_times_custom_list() {
        let payload = ScheduleRequest {
            post_ids: vec!["a".into(), "b".into()],
            times: Some(vec![utc("2025-06-02T10:00:00Z"), utc("2025-06-02T09:00:00Z")]),
            start_time: None,
            interval_secs: None,
        };
        let times = resolve(&payload, 2).unwrap();
        assert_eq!(times.len(), 2);
        // Custom times keep caller order; interleaving is allowed.
        assert!(times[0] > times[1]);
    }

    #[test]
    fn test_resolve_times_count_mismatch() {
        let payload = ScheduleRequest {
            post_ids: vec!["a".into()],
            times: Some(vec![]),
            start_time: None,
            interval_secs: None,
        };
        assert!(matches!(resolve(&payload, 1), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_resolve_times_bulk_distribution() {
        let payload = ScheduleRequest {
            post_ids: (0..5).map(|i| format!("p{i}")).collect(),
            times: None,
            start_time: Some(utc("2025-06-02T09:00:00Z")),
            interval_secs: Some(3600),
        };
        let times = resolve(&payload, 5).unwrap();
        assert_eq!(times[0], utc("2025-06-02T09:00:00Z"));
        assert_eq!(times[4], utc("2025-06-02T13:00:00Z"));
    }

    #[test]
    fn test_resolve_times_uses_default_interval() {
        let payload = ScheduleRequest {
            post_ids: vec!["a".into(), "b".into()],
            times: None,
            start_time: Some(utc("2025-06-02T09:00:00Z")),
            interval_secs: None,
        };
        let times = resolve(&payload, 2).unwrap();
        assert_eq!(times[1], utc("2025-06-02T11:00:00Z"));
    }

    #[test]
    fn test_resolve_times_window_fallback_starts_tomorrow() {
        let payload = ScheduleRequest {
            post_ids: (0..6).map(|i| format!("p{i}")).collect(),
            times: None,
            start_time: None,
            interval_secs: None,
        };
        let times = resolve(&payload, 6).unwrap();
        // Default window: 10:00 to 20:00 every two hours, five slots per
        // day, starting the day after "now".
        assert_eq!(times[0], utc("2025-06-02T10:00:00Z"));
        assert_eq!(times[4], utc("2025-06-02T18:00:00Z"));
        assert_eq!(times[5], utc("2025-06-03T10:00:00Z"));
    }

    #[test]
    fn test_resolve_times_honors_user_window() {
        let payload = ScheduleRequest {
            post_ids: (0..3).map(|i| format!("p{i}")).collect(),
            times: None,
            start_time: None,
            interval_secs: None,
        };
        // A stored user window overrides the engine default entirely.
        let window = PostingWindow {
            start_hour: 8,
            end_hour: 12,
            interval_hours: 4,
        };
        let times = resolve_times(
            &payload,
            3,
            7200,
            &window,
            chrono_tz::UTC,
            utc("2025-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(times[0], utc("2025-06-02T08:00:00Z"));
        assert_eq!(times[1], utc("2025-06-03T08:00:00Z"));
        assert_eq!(times[2], utc("2025-06-04T08:00:00Z"));
    }
}
