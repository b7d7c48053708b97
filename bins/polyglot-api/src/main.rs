mod handlers;
mod routes;

use anyhow::Context;
use axum::Router;
use polyglot_common::Config;
use polyglot_engine::SubmissionExecutor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub executor: SubmissionExecutor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!("Polyglot API booting...");

    let config = Config::from_env();
    let executor = SubmissionExecutor::from_config(&config)
        .context("Failed to initialize execution engine")?;

    for status in executor.toolchains() {
        info!(
            language = %status.language,
            status = status.status,
            remote_fallback = status.remote_fallback,
            "Toolchain"
        );
    }

    let state = Arc::new(AppState { executor });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
