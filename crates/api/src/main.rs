use std::sync::Arc;

use anyhow::Context;

use autoshop_api::app::{build_app, services::AppServices};
use autoshop_api::config::AppConfig;
use autoshop_infra::BusinessMetricsRefresher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autoshop_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;
    let services = Arc::new(
        AppServices::from_config(&config)
            .await
            .context("starting services")?,
    );

    let refresher = services.start_refresher(BusinessMetricsRefresher {
        interval: config.metrics_refresh,
    });

    let app = build_app(Arc::clone(&services), config.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        backend = services.backend(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("shutting down");
    refresher.shutdown().await;
    Ok(())
}
