use std::sync::Arc;

use postq_core::config::Settings;
use postq_core::media::MediaStore;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub media: Arc<dyn MediaStore>,
}
