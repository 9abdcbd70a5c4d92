//! # Turnstile API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tracing subscriber (RUST_LOG, default info,turnstile=debug)         │
//! │  2. ApiConfig from env, PaymentsConfig from payments.toml + env         │
//! │  3. SQLite pool + migrations                                            │
//! │  4. gateway (http | mock), webhook verifier, JWT manager                │
//! │  5. pending-order sweeper task          ◄── watch channel ──┐           │
//! │  6. axum serve ─── ctrl-c / SIGTERM ── graceful shutdown ───┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use turnstile_api::{build_router, ApiConfig, AppState, ConfigError, JwtManager};
use turnstile_db::{Database, DbConfig};
use turnstile_payments::config::PaymentsConfig;
use turnstile_payments::gateway::{self, MOCK_SIGNING_SECRET};
use turnstile_payments::{GatewayProvider, WebhookVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,turnstile=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Turnstile API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    let payments = PaymentsConfig::load(config.payments_config.clone()).context("loading payments config")?;
    if payments.gateway.provider == GatewayProvider::Http && config.uses_dev_secret() {
        return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()).into());
    }
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        gateway = %payments.gateway.provider,
        "Configuration loaded"
    );

    // Connect to database (runs migrations)
    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Database ready");

    let gateway = gateway::from_settings(&payments.gateway)?;
    let verifier = webhook_verifier(&payments)?;
    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_lifetime_secs);
    let state = AppState::new(db.clone(), gateway, &payments, verifier, jwt);

    // Background sweep of stale pending orders
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = payments.reconciler.sweep_interval().map(|interval| {
        let reconciler = state.reconciler.clone();
        tokio::spawn(async move { reconciler.run_sweeper(interval, shutdown_rx).await })
    });
    if sweeper.is_none() {
        info!("Pending order sweeper disabled");
    }

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        if let Err(err) = handle.await {
            warn!(error = %err, "Sweeper task ended abnormally");
        }
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// The webhook secret, falling back to the mock gateway's fixed secret in
/// development.
fn webhook_verifier(payments: &PaymentsConfig) -> anyhow::Result<WebhookVerifier> {
    match (payments.signing_secret(), payments.gateway.provider) {
        (Some(secret), _) => Ok(WebhookVerifier::new(secret)),
        (None, GatewayProvider::Mock) => {
            warn!("No webhook signing secret configured; using the mock gateway secret");
            Ok(WebhookVerifier::new(MOCK_SIGNING_SECRET))
        }
        (None, GatewayProvider::Http) => Err(ConfigError::MissingRequired("webhook.signing_secret".to_string()).into()),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
