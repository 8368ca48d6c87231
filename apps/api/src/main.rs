mod auth;
mod config;
mod db;
mod errors;
mod letters;
mod rate_limit;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::letters::repository::PgLetterRepository;
use crate::rate_limit::{spawn_sweeper, RateLimiter};
use crate::render::DocxTemplate;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Letters API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    // Load the DOCX template once; it is shared read-only by every request
    let template = DocxTemplate::load(&config.template_path)?;
    info!("Loaded template {}", config.template_path.display());

    let download_limiter = Arc::new(RateLimiter::new(
        config.download_rate_limit_max,
        config.download_rate_limit_window,
    ));
    spawn_sweeper(download_limiter.clone());
    info!(
        "Download rate limit: {} per {:?}",
        config.download_rate_limit_max, config.download_rate_limit_window
    );

    // Build app state
    let state = AppState {
        letters: Arc::new(PgLetterRepository::new(db)),
        renderer: Arc::new(template),
        download_limiter,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
