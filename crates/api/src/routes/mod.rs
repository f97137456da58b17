pub mod batches;
pub mod channels;
pub mod health;
pub mod media;
pub mod posts;
pub mod recurrences;
pub mod stats;
pub mod windows;

use axum::Router;
use postq_core::media::MediaStore;
use postq_db::queries::posts::ClearedPost;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(channels::router(state.clone()))
        .merge(media::router(state.clone()))
        .merge(posts::router(state.clone()))
        .merge(batches::router(state.clone()))
        .merge(recurrences::router(state.clone()))
        .merge(windows::router(state.clone()))
        .merge(stats::router(state))
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}

/// Ask the media store to drop the blobs of cleared posts. Occurrence rows
/// share their blob with the recurrence template, so those refs stay.
pub(crate) async fn release_blobs(media: &dyn MediaStore, cleared: &[ClearedPost]) {
    for post in cleared {
        if post.recurrence_id.is_none() {
            media.delete(&post.media_ref).await;
        }
    }
}
