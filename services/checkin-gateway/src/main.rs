//! Check-in gateway
//!
//! Single-binary service that:
//! 1. Sends named users through Google's OAuth consent flow
//! 2. Persists one refreshable grant per user
//! 3. Serves each authorized user's matching Gmail messages as check-in records

mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use google_auth::{AuthFlow, ClientFactory, ClientRegistration, TokenStore};
use mailbox::{GmailSource, MailboxService};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting checkin-gateway");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        token_dir = %config.auth.token_dir.display(),
        api_base = %config.mailbox.api_base,
        subject_keyword = %config.mailbox.subject_keyword,
        "configuration loaded"
    );

    let registration = ClientRegistration::load(&config.auth.credentials_path).with_context(|| {
        format!(
            "failed to load OAuth client registration from {}",
            config.auth.credentials_path.display()
        )
    })?;

    let store = TokenStore::open(config.auth.token_dir.clone())
        .await
        .with_context(|| format!("failed to open token directory {}", config.auth.token_dir.display()))?;
    match store.count().await {
        Ok(stored) => info!(stored_users = stored, "token store ready"),
        Err(e) => warn!(error = %e, "cannot list stored users"),
    }

    let http = reqwest::Client::new();
    let factory = ClientFactory::new(Arc::new(registration), Arc::new(store), http.clone());
    let flow = AuthFlow::new(Arc::new(factory), config.auth.scopes.clone());

    let source = GmailSource::new(http, config.mailbox.api_base.clone());
    let mailbox = MailboxService::new(Arc::new(source), config.mailbox.settings());
    info!(query = %mailbox.query(), "mailbox query configured");

    let prometheus = metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let state = AppState {
        flow: Arc::new(flow),
        mailbox: Arc::new(mailbox),
        prometheus,
        started_at: Instant::now(),
    };
    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
