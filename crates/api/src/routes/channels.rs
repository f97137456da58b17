use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/users/{user_id}/channels",
            post(register_channel).get(list_channels),
        )
        .route(
            "/v1/users/{user_id}/channels/{channel_id}",
            delete(remove_channel),
        )
        .route(
            "/v1/users/{user_id}/channels/{channel_id}/default",
            post(set_default),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterChannelRequest {
    channel_id: String,
    display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResponse {
    channel_id: String,
    display_name: String,
    is_default: bool,
}

async fn register_channel(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<RegisterChannelRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    if payload.channel_id.trim().is_empty() || payload.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "channelId and displayName required".to_string(),
        ));
    }

    let id = format!("uch_{}", nanoid::nanoid!(12));
    let channel = postq_db::queries::channels::upsert(
        &state.db,
        &id,
        &user_id,
        &payload.channel_id,
        &payload.display_name,
    )
    .await?;

    Ok(Json(ChannelResponse {
        channel_id: channel.channel_id,
        display_name: channel.display_name,
        is_default: channel.is_default,
    }))
}

async fn list_channels(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<ChannelResponse>>> {
    let channels = postq_db::queries::channels::list_for_user(&state.db, &user_id).await?;
    Ok(Json(
        channels
            .into_iter()
            .map(|c| ChannelResponse {
                channel_id: c.channel_id,
                display_name: c.display_name,
                is_default: c.is_default,
            })
            .collect(),
    ))
}

async fn remove_channel(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = postq_db::queries::channels::remove(&state.db, &user_id, &channel_id).await?;
    if !removed {
        return Err(ApiError::NotFound("channel not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn set_default(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let updated =
        postq_db::queries::channels::set_default(&state.db, &user_id, &channel_id).await?;
    if !updated {
        return Err(ApiError::NotFound("channel not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "default": channel_id })))
}
