//! Structured logging configuration.
//!
//! The library logs through the `log` facade; those records are bridged into
//! the `tracing` subscriber installed here, so one filter governs both.

use std::net::SocketAddr;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` and default to `info`.
///
/// # Example
///
/// ```no_run
/// use pc_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    // `init` also installs the `log` bridge.
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("Logging already initialized: {e}");
        return;
    }

    tracing::info!("Structured logging initialized");
}

/// Log a connection opening or closing
///
/// # Arguments
///
/// * `protocol` - Transport the connection belongs to
/// * `peer` - Remote address, if known
/// * `opened` - Whether the connection was opened or closed
pub fn log_connection(protocol: &str, peer: Option<SocketAddr>, opened: bool) {
    let peer = peer.map(|addr| addr.to_string());
    if opened {
        tracing::info!(protocol = protocol, peer = peer, "Connection opened");
    } else {
        tracing::info!(protocol = protocol, peer = peer, "Connection closed");
    }
}

/// Log a rejected command.
pub fn log_rejected(protocol: &str, command: &str, error: &str) {
    tracing::debug!(
        protocol = protocol,
        command = command,
        error = error,
        "Command rejected"
    );
}

/// Log a teardown of the whole session.
pub fn log_cascade(protocol: &str, reason: &str) {
    tracing::warn!(protocol = protocol, reason = reason, "CASCADE: match torn down");
}
