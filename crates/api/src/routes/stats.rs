use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::ApiResult, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/users/{user_id}/stats", get(user_stats))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpcomingPost {
    id: String,
    channel_id: String,
    scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    queued: i64,
    scheduled: i64,
    posted: i64,
    failed: i64,
    channels: usize,
    batches: usize,
    active_recurrences: i64,
    upcoming: Vec<UpcomingPost>,
}

async fn user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<StatsResponse>> {
    let counts = postq_db::queries::posts::counts_by_status(&state.db, &user_id).await?;
    let count_for = |status: &str| {
        counts
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };

    let channels = postq_db::queries::channels::list_for_user(&state.db, &user_id).await?;
    let batches = postq_db::queries::batches::list_for_user(&state.db, &user_id).await?;
    let active_recurrences =
        postq_db::queries::recurrences::count_active(&state.db, &user_id).await?;
    let upcoming = postq_db::queries::posts::next_scheduled(&state.db, &user_id, 5).await?;

    Ok(Json(StatsResponse {
        queued: count_for("queued"),
        // Publishing is a transient claim state; surface it as scheduled.
        scheduled: count_for("scheduled") + count_for("publishing"),
        posted: count_for("posted"),
        failed: count_for("failed"),
        channels: channels.len(),
        batches: batches.len(),
        active_recurrences,
        upcoming: upcoming
            .into_iter()
            .map(|p| UpcomingPost {
                id: p.id,
                channel_id: p.channel_id,
                scheduled_time: p.scheduled_time,
            })
            .collect(),
    }))
}
