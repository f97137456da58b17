use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use postq_core::types::PostingWindow;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/users/{user_id}/window",
            get(get_window).put(set_window),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowBody {
    start_hour: u32,
    end_hour: u32,
    interval_hours: u32,
}

impl From<PostingWindow> for WindowBody {
    fn from(window: PostingWindow) -> Self {
        WindowBody {
            start_hour: window.start_hour,
            end_hour: window.end_hour,
            interval_hours: window.interval_hours,
        }
    }
}

async fn get_window(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<WindowBody>> {
    let window = postq_db::queries::windows::get(&state.db, &user_id)
        .await?
        .unwrap_or_default();
    Ok(Json(window.into()))
}

async fn set_window(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<WindowBody>,
) -> ApiResult<Json<WindowBody>> {
    let window = PostingWindow {
        start_hour: payload.start_hour,
        end_hour: payload.end_hour,
        interval_hours: payload.interval_hours,
    };
    if !window.is_valid() {
        return Err(ApiError::BadRequest(
            "window must satisfy startHour < endHour <= 24 and intervalHours >= 1".to_string(),
        ));
    }

    postq_db::queries::windows::upsert(&state.db, &user_id, &window).await?;
    Ok(Json(window.into()))
}
