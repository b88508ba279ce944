//! Match server binary.
//!
//! Spawns one session actor and serves it over both transports: bincode
//! frames on a raw TCP port and JSON over WebSocket on the HTTP port.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Error;
use log::info;
use pc_server::{
    api::{self, AppState, websocket::WsTransport},
    config::{Overrides, ServerConfig},
    logging, metrics,
};
use pico_args::Arguments;
use private_codex::{
    SessionActor, SessionHandle, StandardRules, TcpTransport,
    game::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore},
};
use tokio::net::TcpListener;

const HELP: &str = "\
Run a card-placement match server

USAGE:
  pc_server [OPTIONS]

OPTIONS:
  --tcp-bind   IP:PORT     Bincode TCP bind address      [default: env CODEX_TCP_BIND or 127.0.0.1:6969]
  --http-bind  IP:PORT     HTTP/WebSocket bind address   [default: env CODEX_HTTP_BIND or 127.0.0.1:8080]
  --snapshot   PATH        Snapshot file                 [default: env CODEX_SNAPSHOT_PATH or in memory]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  CODEX_METRICS_BIND       Prometheus listener (e.g., 0.0.0.0:9090)
  CODEX_PROBE_INTERVAL_MS  Liveness probe interval      [default: 5000]
  CODEX_RNG_SEED           Fixed shuffle seed
  CODEX_WS_BURST           WebSocket messages per second [default: 10]
  CODEX_WS_SUSTAINED       WebSocket messages per minute [default: 100]
  RUST_LOG                 Log filter                   [default: info]
";

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        tcp_bind: pargs.opt_value_from_str("--tcp-bind")?,
        http_bind: pargs.opt_value_from_str("--http-bind")?,
        snapshot_path: pargs.opt_value_from_str::<_, PathBuf>("--snapshot")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Metrics available at http://{}/metrics", addr);
    }

    let store: Arc<dyn SnapshotStore> = match &config.snapshot_path {
        Some(path) => {
            info!("Persisting snapshots to {}", path.display());
            Arc::new(FileSnapshotStore::new(path))
        }
        None => Arc::new(MemorySnapshotStore::new()),
    };

    let tcp = Arc::new(TcpTransport::new());
    let ws = Arc::new(WsTransport::new());
    let (actor, session) = SessionActor::new(
        config.session.clone(),
        Arc::new(StandardRules),
        store,
        vec![tcp.clone(), ws.clone()],
    );
    let actor_task = actor.spawn();

    let tcp_listener = TcpListener::bind(config.tcp_bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.tcp_bind, e))?;
    let tcp_task = tokio::spawn(TcpTransport::serve(
        tcp_listener,
        tcp,
        session.clone(),
        config.session.probe_interval,
    ));

    let status_task = config
        .metrics_bind
        .map(|_| tokio::spawn(poll_status(session.clone())));

    let app = api::create_router(AppState {
        session: session.clone(),
        transport: ws,
        probe_interval: config.session.probe_interval,
        rate_limit: config.rate_limit,
    });

    let http_listener = TcpListener::bind(config.http_bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.http_bind, e))?;

    info!(
        "Server is running: tcp://{} and http://{}. Press Ctrl+C to stop.",
        config.tcp_bind, config.http_bind
    );

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    tcp_task.abort();
    if let Some(status_task) = status_task {
        status_task.abort();
    }
    if let Err(e) = session.shutdown().await {
        log::warn!("Session already stopped: {}", e);
    }
    let _ = actor_task.await;

    Ok(())
}

/// Feed the session status into the gauges.
async fn poll_status(session: SessionHandle) {
    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        match session.status().await {
            Ok(status) => metrics::record_status(&status),
            Err(_) => break,
        }
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
