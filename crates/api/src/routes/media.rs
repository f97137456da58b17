use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    routing::post,
    Json, Router,
};
use postq_core::types::MediaType;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

// Telegram's own bot-API ceiling for uploads.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/users/{user_id}/media", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(rename = "type")]
    media_type: Option<MediaType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    media_ref: String,
}

/// Accept a raw blob and hand back the ref posts will carry. The ref is
/// opaque to callers; only the store knows how to resolve it.
async fn upload(
    State(state): State<AppState>,
    Path(_user_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest("upload exceeds 50 MiB".to_string()));
    }

    let media_ref = state
        .media
        .put(&body, params.media_type.unwrap_or_default())
        .await?;

    Ok(Json(UploadResponse { media_ref }))
}
