//! Multi-session MCP gateway for headless IDA analysis workers.

use anyhow::Context;
use clap::Parser;
use ida_mcp_gateway::server::http::build_router;
use ida_mcp_gateway::session::{Registry, Store};
use ida_mcp_gateway::worker::{Manager, WorkerController};
use ida_mcp_gateway::{watchdog, Config, GatewayServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HTTP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "ida-mcp-gateway", version, about = "Multi-session IDA MCP gateway")]
struct Cli {
    /// Path to the server config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// HTTP port (overrides config)
    #[arg(long)]
    port: Option<u16>,
    /// Worker script (overrides config)
    #[arg(long)]
    worker: Option<PathBuf>,
    /// Max concurrent sessions (overrides config)
    #[arg(long)]
    max_sessions: Option<usize>,
    /// Session idle timeout, e.g. 240m or 4h (overrides config)
    #[arg(long, value_parser = parse_duration)]
    session_timeout: Option<Duration>,
    /// Enable verbose debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (value, unit) = s.split_at(s.len() - s.chars().last().map_or(0, |c| c.len_utf8()));
    let (number, multiplier) = match unit {
        "s" => (value, 1),
        "m" => (value, 60),
        "h" => (value, 3600),
        _ => (s, 1),
    };
    number
        .parse::<u64>()
        .map(|n| Duration::from_secs(n * multiplier))
        .map_err(|_| format!("invalid duration: {s}"))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "ida_mcp_gateway=debug"
    } else {
        "ida_mcp_gateway=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!("starting IDA headless MCP gateway");

    let mut cfg = Config::load(&cli.config).context("failed to load config")?;
    cfg.apply_env_overrides();
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(worker) = cli.worker {
        cfg.python_worker_path = worker;
    }
    if let Some(max) = cli.max_sessions {
        cfg.max_concurrent_sessions = max;
    }
    if cli.debug {
        cfg.debug = true;
    }
    cfg.validate().context("invalid configuration")?;

    let session_timeout = cli.session_timeout.unwrap_or_else(|| cfg.session_timeout());

    let registry = Arc::new(Registry::new(cfg.max_concurrent_sessions));
    let workers: Arc<Manager> = Arc::new(Manager::new(&cfg.python_worker_path));
    let state_dir = cfg.database_directory.join("sessions");
    let store = Arc::new(Store::new(&state_dir).context("failed to initialize session store")?);

    let server = GatewayServer::new(
        registry.clone(),
        workers.clone(),
        Some(store),
        session_timeout,
        cfg.debug,
    );

    server.restore_sessions().await;
    let _watchdog = watchdog::spawn(server.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let ct = CancellationToken::new();
    let router = build_router(server, addr, ct.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    info!("HTTP transport at http://localhost:{}/", cfg.port);
    info!("SSE transport at http://localhost:{}/sse", cfg.port);
    info!("WebSocket transport at ws://localhost:{}/ws", cfg.port);

    let shutdown_ct = ct.clone();
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        wait_for_shutdown_signal().await;
        info!("shutting down gracefully");
        shutdown_ct.cancel();
    });

    // In-flight requests get a bounded drain window after the signal; a
    // stuck connection must not hold the process open.
    let drain_ct = ct.clone();
    tokio::select! {
        result = serve => result.context("http server error")?,
        _ = async {
            drain_ct.cancelled().await;
            tokio::time::sleep(HTTP_SHUTDOWN_TIMEOUT).await;
        } => {
            error!(
                "graceful shutdown timed out after {}s, forcing exit",
                HTTP_SHUTDOWN_TIMEOUT.as_secs()
            );
        }
    }

    // Stop every worker after the listener drains.
    for session in registry.list() {
        if let Err(e) = workers.stop(&session.id).await {
            error!(session_id = %session.id, "failed to stop worker: {e}");
        }
    }

    info!("shutdown complete");
    Ok(())
}
