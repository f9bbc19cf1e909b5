//! Live telemetry service (vtel-live) - Main entry point
//!
//! Follows running video-analytics sessions over their push streams and
//! serves the aggregated session state to the dashboard.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};
use vtel_common::config::TomlConfig;
use vtel_live::api::{build_router, AppState};
use vtel_live::engine::{EngineConfig, LiveEngine};
use vtel_live::transport::HttpConnector;

/// Command-line arguments for vtel-live
#[derive(Parser, Debug)]
#[command(name = "vtel-live")]
#[command(about = "Live telemetry aggregation service for video-analytics sessions")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "VTEL_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Analytics backend base URL for the SSE streams
    #[arg(short, long, env = "VTEL_UPSTREAM")]
    upstream: Option<String>,

    /// Analytics backend base URL for the frame WebSocket
    #[arg(long, env = "VTEL_WS_UPSTREAM")]
    ws_upstream: Option<String>,

    /// Maximum number of cached sessions
    #[arg(long)]
    capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise the configured level is applied once the config is loaded
    let explicit_filter = EnvFilter::try_from_default_env().ok();
    let has_explicit_filter = explicit_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        explicit_filter.unwrap_or_else(|| EnvFilter::new("info,tower_http=debug")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting VTEL live telemetry (vtel-live) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    if !has_explicit_filter {
        let directives = format!("{},tower_http=debug", config.logging.level);
        match EnvFilter::try_new(&directives) {
            Ok(configured) => {
                if let Err(e) = filter_handle.reload(configured) {
                    warn!("Failed to apply log level {}: {}", config.logging.level, e);
                }
            }
            Err(e) => warn!("Ignoring invalid log level {}: {}", config.logging.level, e),
        }
    }

    info!(
        "Upstream: {} (frames: {})",
        config.upstream.http_base_url, config.upstream.ws_base_url
    );
    info!(
        "Engine: capacity {}, flush every {} ms, reconnect after {} ms",
        config.engine.capacity, config.engine.flush_interval_ms, config.engine.reconnect_backoff_ms
    );

    let connector = HttpConnector::new(&config.upstream.http_base_url, &config.upstream.ws_base_url)
        .context("Failed to build upstream connector")?;
    let engine = Arc::new(LiveEngine::new(
        EngineConfig::from(&config.engine),
        Arc::new(connector),
    ));

    let app = build_router(AppState::new(engine.clone()));

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.server.bind, config.server.port))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// CLI / environment values take precedence over the file
fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(upstream) = &args.upstream {
        config.upstream.http_base_url = upstream.clone();
        if args.ws_upstream.is_none() {
            config.upstream.ws_base_url = websocket_base(upstream);
        }
    }
    if let Some(ws_upstream) = &args.ws_upstream {
        config.upstream.ws_base_url = ws_upstream.clone();
    }
    if let Some(capacity) = args.capacity {
        config.engine.capacity = capacity;
    }
}

/// `http://host` -> `ws://host`, `https://host` -> `wss://host`
fn websocket_base(http_base: &str) -> String {
    if let Some(rest) = http_base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        http_base.to_string()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
