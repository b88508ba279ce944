//! Session actor message types.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{
    game::entities::Username,
    net::messages::{ServerMessage, UserCommand},
    transport::ConnectionId,
};

/// Messages that can be sent to a SessionActor
#[derive(Debug)]
pub enum SessionMessage {
    /// A decoded command from a connection
    Command {
        connection: ConnectionId,
        command: UserCommand,
        response: oneshot::Sender<ServerMessage>,
    },

    /// A connection closed or stopped answering probes
    ConnectionLost {
        connection: ConnectionId,
        response: oneshot::Sender<bool>,
    },

    GetStatus {
        response: oneshot::Sender<SessionStatus>,
    },

    /// Tear down the match and close every connection
    Cancel { response: oneshot::Sender<()> },

    /// Cancel, then stop the actor
    Shutdown { response: oneshot::Sender<()> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatus {
    pub protocol: String,
    pub connections: usize,
    pub associated: usize,
}

/// Snapshot of the session for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: String,
    pub capacity: Option<usize>,
    pub players: Vec<Username>,
    pub turn: u32,
    pub current_player: Option<Username>,
    pub transports: Vec<TransportStatus>,
    pub matches_completed: u64,
    pub cascades: u64,
    /// Whether a saved match is waiting for its roster to come back
    pub resumable: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
}
