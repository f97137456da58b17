use axum::{middleware::from_fn, Router};
use postq_core::config::Settings;
use postq_core::media::FsMediaStore;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

mod error;
mod middleware;
mod routes;
mod state;

use crate::middleware::request_id::request_id;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;

    postq_db::run_migrations(&db).await?;

    let media = FsMediaStore::new(&settings.media_dir);

    let state = AppState {
        db,
        settings: Arc::new(settings.clone()),
        media: Arc::new(media),
    };

    let app = Router::new()
        .merge(routes::health_router(state.clone()))
        .merge(routes::v1_router(state))
        .layer(from_fn(request_id));

    let addr: SocketAddr = settings.api_bind.parse()?;

    info!(%addr, env = %settings.postq_env, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
