use std::sync::Arc;

use anyhow::anyhow;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod jobs;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::queue::rabbitmq::{RabbitMqNotificationChannel, RabbitMqService};
use infrastructure::storage::s3::StorageService;
use infrastructure::transcoder::client::TranscoderClient;
use jobs::coordinator::JobCoordinator;
use state::AppState;
use workers::notification_poller::PollerSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting audio converter...");

    let config = AppConfig::new().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let storage = StorageService::new(
        &config.s3_endpoint,
        &config.aws_region,
        &config.aws_access_key,
        &config.aws_secret_key,
    )
    .await;
    let transcoder = TranscoderClient::new(config.transcoder_url.clone());

    let queue = RabbitMqService::new(&config.rabbitmq_url).await?;
    let channel =
        RabbitMqNotificationChannel::new(queue, &config.notification_queue, config.poll_batch_size).await?;

    let coordinator = Arc::new(JobCoordinator::new(
        Arc::new(channel),
        PollerSettings {
            idle_backoff: config.poll_idle_backoff(),
            error_backoff: config.poll_error_backoff(),
        },
    ));

    let state = AppState::new(
        config.clone(),
        Arc::new(storage),
        Arc::new(transcoder),
        coordinator.clone(),
    );
    let router = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    app::serve(listener, router, shutdown_signal(), config.shutdown_drain()).await?;

    coordinator.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
