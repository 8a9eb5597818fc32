use std::sync::Arc;

use axum::Router;
use clap::Parser;
use halo::HaloBuilder;
use halo_axum::routes;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;

use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    tracing::debug!(?config, "Loaded configuration");

    let verifier = config.load_verifier()?;
    if verifier.is_empty() {
        tracing::warn!("No accounts configured; every login will be rejected");
    }

    let halo = Arc::new(
        HaloBuilder::new()
            .with_csrf_secret(config.csrf_secret.clone())
            .with_token_ttl(config.token_ttl()?)
            .with_login_limiter(config.limiter_config()?)
            .with_verifier(verifier)
            .build()?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = halo.start_cleanup_task(shutdown_rx);

    let app = Router::new().nest(
        "/api",
        routes(halo)
            .with_cookie_config(config.cookie_config())
            .build(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(address = %config.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    cleanup.await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
