use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_relay::config::Settings;
use notification_relay::connection_manager::ConnectionRegistry;
use notification_relay::server::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::new().context("Failed to load configuration")?;
    let addr = settings.server_addr();

    let state = AppState::build(settings).await?;
    tracing::info!(
        subscriptions = state.subscriptions.backend_type(),
        cookie = %state.settings.session.cookie_name,
        "Relay state ready"
    );

    let registry = state.registry.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Relay listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(wait_for_shutdown(registry))
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn wait_for_shutdown(registry: Arc<ConnectionRegistry>) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let signal_name = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = sigterm => "SIGTERM",
    };
    tracing::info!(signal = signal_name, "Shutting down");

    // axum's graceful shutdown does not reach upgraded sockets
    let closed = registry.shutdown_all();
    tracing::info!(closed, "Closed live connections");
}
