use std::future::ready;

use accounts::{app, initialize_state, telemetry};
use axum::routing::get;
use opentelemetry::global;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // OTLP export only when a collector is configured.
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let tracer = endpoint.as_deref().map(telemetry::setup_tracer).transpose()?;
    let logs = endpoint.as_deref().map(telemetry::setup_logging).transpose()?;
    if let Some(provider) = &tracer {
        global::set_tracer_provider(provider.clone());
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(logs)
        .init();

    let metrics = telemetry::setup_metrics_recorder()?;

    let state = initialize_state().await?;
    let port = state.config.port;

    let router = app(state).route("/metrics", get(move || ready(metrics.render())));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = ?err, "tracer provider did not shut down cleanly");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
