//! Prometheus metrics for monitoring the match server.
//!
//! Metrics are exposed in Prometheus text format on their own listener.
//!
//! # Metrics Categories
//!
//! - **Connection Metrics**: Open and associated connections per transport
//! - **WebSocket Metrics**: Messages sent and received, rate limit hits
//! - **Session Metrics**: Command outcomes, completed matches, cascades
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pc_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::command_outcome("websocket", "user_error");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use private_codex::{messages::ServerMessage, session::SessionStatus};
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Errors
///
/// Returns a message if the exporter can't be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Connection Metrics
// ============================================================================

pub fn connections_active(protocol: &str, count: usize) {
    metrics::gauge!("connections_active", "protocol" => protocol.to_string()).set(count as f64);
}

pub fn connections_associated(protocol: &str, count: usize) {
    metrics::gauge!("connections_associated", "protocol" => protocol.to_string())
        .set(count as f64);
}

pub fn connections_total(protocol: &str) {
    metrics::counter!("connections_total", "protocol" => protocol.to_string()).increment(1);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

pub fn rate_limit_hits_total(window: &str) {
    metrics::counter!("rate_limit_hits_total", "window" => window.to_string()).increment(1);
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Outcome label for a command reply.
pub fn outcome_of(reply: &ServerMessage) -> &'static str {
    match reply {
        ServerMessage::Ack(_) => "ack",
        ServerMessage::UserError(_) => "user_error",
        ServerMessage::ClientError(_) => "client_error",
        _ => "other",
    }
}

pub fn command_outcome(protocol: &str, outcome: &'static str) {
    metrics::counter!("commands_total",
        "protocol" => protocol.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish a polled session status as gauges.
pub fn record_status(status: &SessionStatus) {
    for transport in &status.transports {
        connections_active(&transport.protocol, transport.connections);
        connections_associated(&transport.protocol, transport.associated);
    }
    metrics::gauge!("lobby_players").set(status.players.len() as f64);
    metrics::gauge!("match_turn").set(f64::from(status.turn));
    metrics::gauge!("matches_completed").set(status.matches_completed as f64);
    metrics::gauge!("cascades").set(status.cascades as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use private_codex::{UserError, messages::UserCommand};

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_of(&ServerMessage::Ack(UserCommand::Pong)), "ack");
        assert_eq!(
            outcome_of(&ServerMessage::UserError(UserError::WrongPhase)),
            "user_error"
        );
        assert_eq!(outcome_of(&ServerMessage::Ping), "other");
    }

    #[test]
    fn test_recording_without_exporter_is_harmless() {
        command_outcome("tcp", "ack");
        rate_limit_hits_total("burst");
        connections_total("websocket");
    }
}
