use std::sync::Arc;

use fulfillment_engine::api;
use fulfillment_engine::config::Config;
use fulfillment_engine::error::AppError;
use fulfillment_engine::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    tracing::info!(
        picker_max_concurrency = config.fulfillment.picker_max_concurrency,
        rider_max_concurrency = config.fulfillment.rider_max_concurrency,
        default_style = ?config.fulfillment.default_fulfillment_style,
        "fulfillment config loaded"
    );

    let shared_state = Arc::new(AppState::new(
        config.fulfillment.clone(),
        config.event_buffer_size,
    ));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
