use anyhow::Result;
use postq_core::config::Settings;
use postq_core::media::{FsMediaStore, MediaStore};
use postq_core::transport::PublishTransport;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};

mod jobs;
mod transport;

use crate::transport::HttpTransport;

#[derive(Clone)]
pub struct WorkerState {
    pub db: sqlx::PgPool,
    pub transport: Arc<dyn PublishTransport>,
    pub media: Arc<dyn MediaStore>,
    pub poll_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    postq_db::run_migrations(&db).await?;

    let transport = HttpTransport::new(
        settings.publish_url.clone(),
        settings.publish_timeout_secs,
    )?;

    let state = WorkerState {
        db,
        transport: Arc::new(transport),
        media: Arc::new(FsMediaStore::new(&settings.media_dir)),
        poll_interval_secs: settings.poll_interval_secs,
    };

    info!(
        poll_interval_secs = settings.poll_interval_secs,
        "worker starting"
    );

    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(settings.poll_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // A bad cycle (db hiccup, publisher outage) is logged and retried
        // on the next tick; the loop itself never exits.
        if let Err(err) = jobs::publish::run_cycle(&state).await {
            error!(%err, "firing cycle failed");
        }
    }
}
