//! HTTP/WebSocket API for the match server.
//!
//! # Endpoints Overview
//!
//! - `GET /ws` - Establish a WebSocket connection
//! - `GET /health` - Server health status
//! - `GET /status` - Session status as JSON
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pc_server::api::{AppState, create_router, websocket::WsTransport};
//! use pc_server::config::RateLimitConfig;
//! use private_codex::SessionHandle;
//! use std::{sync::Arc, time::Duration};
//! # async fn example(session: SessionHandle) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState {
//!     session,
//!     transport: Arc::new(WsTransport::new()),
//!     probe_interval: Duration::from_secs(5),
//!     rate_limit: RateLimitConfig::default(),
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod rate_limiter;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use private_codex::SessionHandle;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tower_http::cors::CorsLayer;

use crate::config::RateLimitConfig;
use websocket::WsTransport;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// # Fields
///
/// - `session`: Handle to the session actor
/// - `transport`: The WebSocket transport, also registered with the session
/// - `probe_interval`: Time between liveness pings
/// - `rate_limit`: Per-connection message limits
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub transport: Arc<WsTransport>,
    pub probe_interval: Duration,
    pub rate_limit: RateLimitConfig,
}

/// Create the API router.
///
/// ```text
/// GET /health  - Health check
/// GET /status  - Session status
/// GET /ws      - WebSocket
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(session_status))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` while the session actor answers, `503 Service
/// Unavailable` once it has stopped.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","phase":"login","timestamp":"2026-10-19T10:30:00Z", ...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session.status().await.ok();
    let healthy = status.is_some();

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "phase": status.map(|s| s.phase),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.status().await {
        Ok(status) => (StatusCode::OK, Json(json!(status))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
