//! WebSocket transport.
//!
//! Clients exchange the same `UserCommand` / `ServerMessage` enums as over
//! TCP, encoded as JSON text frames. Liveness uses native ping/pong frames.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws`
//! 2. The connection is registered with the [`WsTransport`] registry
//! 3. Server spawns a send task that drains the connection's queue and
//!    pings every probe interval
//! 4. The receive loop rate limits, decodes and submits commands
//! 5. Whichever side stops first ends the connection and the loss is
//!    reported to the session
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//! ws.onopen = () => ws.send(JSON.stringify({ Login: "ann" }));
//! ws.onmessage = (event) => handle(JSON.parse(event.data));
//! ```

use std::{io, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, info, warn};
use private_codex::{
    messages::{ClientError, ServerMessage, UserCommand},
    transport::{ConnectionId, ConnectionRegistry, Delivery, Liveness, Outbound, TransportAdapter},
    utils,
};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval, timeout},
};
use uuid::Uuid;

use super::{AppState, rate_limiter::RateLimiter};
use crate::{logging, metrics};

pub const PROTOCOL: &str = "websocket";

/// Registry of WebSocket connections.
#[derive(Debug, Default)]
pub struct WsTransport {
    registry: ConnectionRegistry,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportAdapter for WsTransport {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

/// WebSocket upgrade handler.
///
/// # Response
///
/// Upgrades the connection to WebSocket protocol (101 Switching Protocols).
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
///
/// # Arguments
///
/// - `socket`: The WebSocket connection
/// - `state`: Shared application state
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, mut receiver) = socket.split();
    let id = Uuid::new_v4();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    state.transport.registry().register(id, outbound_tx);
    metrics::connections_total(PROTOCOL);
    logging::log_connection(PROTOCOL, None, true);
    info!("WebSocket connected: {}", id);

    let liveness = Arc::new(Liveness::new());
    let mut send_task = tokio::spawn(send_loop(
        sink,
        outbound_rx,
        liveness.clone(),
        state.clone(),
        id,
    ));

    let mut limiter = RateLimiter::new(state.rate_limit);

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    metrics::websocket_messages_received();
                    liveness.confirm();
                    if !handle_text(text.as_str(), id, &state, &mut limiter).await {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => liveness.confirm(),
                Some(Ok(Message::Binary(_))) => {
                    state.transport.deliver(
                        Delivery::Connection(id),
                        ServerMessage::ClientError(ClientError::InvalidMessage),
                    );
                }
                // Pings are answered by axum.
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed: {}", id);
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    logging::log_connection(PROTOCOL, None, false);

    match state.session.connection_lost(id).await {
        Ok(true) => logging::log_cascade(PROTOCOL, &format!("connection {id} lost")),
        Ok(false) => debug!("WebSocket {} removed", id),
        Err(e) => debug!("WebSocket {} closed after session: {}", id, e),
    }
}

/// # Returns
///
/// `false` once the connection should be dropped.
async fn handle_text(
    text: &str,
    id: ConnectionId,
    state: &AppState,
    limiter: &mut RateLimiter,
) -> bool {
    if let Err(limited) = limiter.check() {
        warn!(
            "{} rate limit exceeded for {}, retry in {:?}",
            limited.label(),
            id,
            limiter.retry_in(limited)
        );
        metrics::rate_limit_hits_total(limited.label());
        state.transport.deliver(
            Delivery::Connection(id),
            ServerMessage::ClientError(ClientError::RateLimited),
        );
        return true;
    }

    let command = match utils::decode_json::<UserCommand>(text) {
        Ok(UserCommand::Pong) => return true,
        Ok(command) => command,
        Err(e) => {
            debug!("Failed to parse message from {}: {}", id, e);
            metrics::command_outcome(PROTOCOL, "client_error");
            state.transport.deliver(
                Delivery::Connection(id),
                ServerMessage::ClientError(ClientError::InvalidMessage),
            );
            return true;
        }
    };

    let label = command.to_string();
    match state.session.submit(id, command).await {
        Ok(reply) => {
            metrics::command_outcome(PROTOCOL, metrics::outcome_of(&reply));
            if let ServerMessage::UserError(error) = &reply {
                logging::log_rejected(PROTOCOL, &label, &error.to_string());
            }
            true
        }
        Err(e) => {
            warn!("Session unavailable for {}: {}", id, e);
            false
        }
    }
}

async fn send_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    liveness: Arc<Liveness>,
    state: AppState,
    id: ConnectionId,
) {
    let mut probes = interval(state.probe_interval);
    probes.set_missed_tick_behavior(MissedTickBehavior::Delay);
    probes.tick().await;

    let deadline = state.probe_interval;
    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(Outbound::Message(msg)) => {
                    if let Err(e) = send_json(&mut sink, &msg, deadline).await {
                        warn!("WebSocket {} write failed: {}", id, e);
                        break;
                    }
                }
                Some(Outbound::Close(msg)) => {
                    let _ = send_json(&mut sink, &msg, deadline).await;
                    let _ = send_frame(&mut sink, Message::Close(None), deadline).await;
                    break;
                }
                None => break,
            },
            _ = probes.tick() => {
                if !liveness.probe() {
                    warn!("WebSocket {} missed a liveness probe", id);
                    break;
                }
                if send_frame(&mut sink, Message::Ping(Bytes::new()), deadline).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = timeout(deadline, sink.close()).await;
}

async fn send_json(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
    deadline: Duration,
) -> Result<(), axum::Error> {
    let json = match utils::encode_json(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize {}: {}", msg, e);
            return Ok(());
        }
    };
    send_frame(sink, Message::Text(json.into()), deadline).await?;
    metrics::websocket_messages_sent();
    Ok(())
}

/// A peer that stops reading for a whole probe interval counts as a missed
/// probe.
async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    deadline: Duration,
) -> Result<(), axum::Error> {
    timeout(deadline, sink.send(frame)).await.map_err(|_| {
        axum::Error::new(io::Error::new(io::ErrorKind::TimedOut, "peer stopped reading"))
    })?
}
