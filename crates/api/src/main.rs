use std::sync::Arc;

use anyhow::Context;

use stockledger_api::app::{AppServices, build_app};
use stockledger_infra::EngineConfig;
use stockledger_infra::jobs::ThresholdSweep;
use stockledger_infra::notifications::{LogNotificationSink, NotificationWorker};

const ENV_BIND_ADDR: &str = "STOCKLEDGER_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let config = EngineConfig::from_env();
    let sweep_interval = config.sweep_interval;
    let services = Arc::new(AppServices::in_memory(config));

    let sweep = ThresholdSweep::spawn(services.engine().clone(), sweep_interval)
        .context("failed to start threshold sweep")?;
    let notifications = NotificationWorker::spawn(services.engine().bus(), LogNotificationSink, None)
        .context("failed to start notification worker")?;

    let app = build_app(services);

    let bind_addr = std::env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down background workers");
    sweep.shutdown();
    notifications.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
