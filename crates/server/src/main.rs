mod config;
mod error;
mod hub;
mod http;
mod ingest;
mod metrics;
mod state;
mod syslog;
mod tailer;
mod tcp;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use logcore::{InMemoryStorage, RuleSet};
use tracing::{info, warn};

use crate::config::{LogFormat, ServerConfig};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let _basic_tracing = init_tracing_basic();

    info!("Starting logserver v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    drop(_basic_tracing);
    init_tracing_from_config(&config);

    info!("Configuration loaded successfully");

    let rules = load_rules();

    // The real analytical database is an external collaborator (spec §1);
    // `InMemoryStorage` is the only concrete `Storage`/`Query` impl this
    // crate ships, so it's what the binary runs against.
    let storage = Arc::new(InMemoryStorage::new());
    let state = AppState::new(config, rules, storage.clone(), Some(storage));

    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let tcp_state = state.clone();
    let tcp_shutdown = state.shutdown_tx.subscribe();
    let tcp_task = tokio::spawn(async move {
        if let Err(e) = tcp::run(tcp_state, tcp_shutdown).await {
            warn!(error = %e, "TCP receiver exited with error");
        }
    });

    let syslog_udp_state = state.clone();
    let syslog_udp_shutdown = state.shutdown_tx.subscribe();
    let syslog_udp_task = tokio::spawn(async move {
        if let Err(e) = syslog::run_udp(syslog_udp_state, syslog_udp_shutdown).await {
            warn!(error = %e, "Syslog UDP receiver exited with error");
        }
    });

    let syslog_tcp_state = state.clone();
    let syslog_tcp_shutdown = state.shutdown_tx.subscribe();
    let syslog_tcp_task = tokio::spawn(async move {
        if let Err(e) = syslog::run_tcp(syslog_tcp_state, syslog_tcp_shutdown).await {
            warn!(error = %e, "Syslog TCP receiver exited with error");
        }
    });

    let tailer_task = if let Some(query) = state.query.clone() {
        let tailer_state = state.clone();
        let tailer_shutdown = state.shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            tailer::run(tailer_state, query, tailer_shutdown).await;
        }))
    } else {
        None
    };

    let app = build_router(state.clone());
    let addr: std::net::SocketAddr = state.config.http_bind.parse().context("Invalid http_bind")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind HTTP listener")?;

    info!("HTTP receiver listening on http://{}", addr);
    info!("  - POST /ingest/logs");
    info!("  - POST /ingest/bulk");
    info!("  - GET  /ingest/health");
    info!("  - GET  /stream (WebSocket live tail)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Stop signal received, starting graceful shutdown");
    state.signal_shutdown();

    let deadline = state.config.shutdown_deadline();
    let drain = async {
        let _ = tcp_task.await;
        let _ = syslog_udp_task.await;
        let _ = syslog_tcp_task.await;
        if let Some(t) = tailer_task {
            let _ = t.await;
        }
    };
    if tokio::time::timeout(deadline, drain).await.is_err() {
        warn!("{}", crate::error::ShutdownTimeout);
    }

    state.batch_writer.stop().await;
    state.hub.close();
    let _ = shutdown_rx.changed().await;

    info!("logserver shut down gracefully");
    Ok(())
}

fn load_rules() -> RuleSet {
    let candidates = ["/etc/logcore/rules.toml", "config/rules.toml", "crates/server/config/rules.toml"];
    for path in candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            match RuleSet::from_toml(&contents) {
                Ok(rules) => {
                    info!(path, "Loaded rule set");
                    return rules;
                }
                Err(e) => warn!(path, error = %e, "Failed to parse rule set, trying next candidate"),
            }
        }
    }
    info!("No rule set file found, using the default strict rule set");
    RuleSet::default_strict()
}

fn build_router(state: AppState) -> Router {
    let stream_router = Router::new()
        .route("/stream", get(hub::ws::live_stream_handler))
        .with_state(state.clone());

    http::router(state).merge(stream_router)
}

fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,logserver=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

fn init_tracing_from_config(config: &ServerConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true).with_thread_ids(true);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => warn!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
