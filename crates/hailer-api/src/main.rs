//! # hailer-api — Binary Entry Point
//!
//! Reads configuration from the environment, installs tracing and the
//! Prometheus recorder, and serves until Ctrl-C.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use hailer_api::config::AppConfig;
use hailer_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("reading configuration")?;
    tracing::info!(?config, "configuration loaded");
    if config.auth_secret.is_none() {
        tracing::warn!("AUTH_SECRET not set; bearer secrets are not checked");
    }

    let recorder = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config).with_metrics(recorder);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let shutdown = state.shutdown.clone();
    let on_signal = async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => tracing::info!("shutdown signal received"),
                Err(err) => {
                    tracing::error!(error = %err, "cannot listen for shutdown signal");
                    shutdown.cancelled().await;
                }
            },
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    };

    let (served, ()) = tokio::join!(hailer_api::serve(listener, state), on_signal);
    served.context("server failed")?;
    tracing::info!("hailer-api stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
