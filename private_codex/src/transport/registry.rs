//! Live connections of one transport.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    game::entities::Username,
    net::messages::{ClientError, ServerMessage},
};

pub type ConnectionId = Uuid;

/// Work handed to a connection task. Socket writes happen there, never in
/// the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Send the final message, then close the socket.
    Close(ServerMessage),
}

/// Addressing for a delivery. The session only ever names players.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// Every connection, associated or not.
    Broadcast,
    Unicast(Username),
    Group(Vec<Username>),
    Connection(ConnectionId),
}

#[derive(Debug)]
struct Entry {
    sender: mpsc::UnboundedSender<Outbound>,
    username: Option<Username>,
}

/// Counts reported for status and metrics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub struct ConnectionCounts {
    pub total: usize,
    pub associated: usize,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: ConnectionId, sender: mpsc::UnboundedSender<Outbound>) {
        self.lock().insert(
            id,
            Entry {
                sender,
                username: None,
            },
        );
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Drop a connection.
    ///
    /// # Returns
    ///
    /// * `None` if the connection was unknown (already torn down)
    /// * `Some(username)` with the association it had, if any
    pub fn remove(&self, id: ConnectionId) -> Option<Option<Username>> {
        self.lock().remove(&id).map(|entry| entry.username)
    }

    /// Bind a connection to a player name. Lookup only, no ownership.
    pub fn associate(&self, id: ConnectionId, username: Username) -> Result<(), ClientError> {
        let mut connections = self.lock();
        let entry = connections.get_mut(&id).ok_or(ClientError::Unassociated)?;
        if entry.username.is_some() {
            return Err(ClientError::AlreadyAssociated);
        }
        entry.username = Some(username);
        Ok(())
    }

    pub fn username_of(&self, id: ConnectionId) -> Option<Username> {
        self.lock().get(&id).and_then(|entry| entry.username.clone())
    }

    pub fn knows(&self, username: &Username) -> bool {
        self.lock()
            .values()
            .any(|entry| entry.username.as_ref() == Some(username))
    }

    /// Clear every association but keep the connections open.
    pub fn release_all(&self) {
        for entry in self.lock().values_mut() {
            entry.username = None;
        }
    }

    /// Queue a message for the addressed connections.
    ///
    /// # Returns
    ///
    /// The number of connections the message was queued for.
    pub fn deliver(&self, to: &Delivery, msg: &ServerMessage) -> usize {
        let connections = self.lock();
        let targets = connections.iter().filter(|(id, entry)| match to {
            Delivery::Broadcast => true,
            Delivery::Unicast(name) => entry.username.as_ref() == Some(name),
            Delivery::Group(names) => entry
                .username
                .as_ref()
                .is_some_and(|username| names.contains(username)),
            Delivery::Connection(target) => *id == target,
        });
        let mut delivered = 0;
        for (id, entry) in targets {
            if entry.sender.send(Outbound::Message(msg.clone())).is_ok() {
                delivered += 1;
            } else {
                log::debug!("Connection {} is gone, dropping {}", id, msg);
            }
        }
        delivered
    }

    /// Tell every connection to close after `msg` and forget them all.
    ///
    /// # Returns
    ///
    /// The number of connections torn down.
    pub fn close_all(&self, msg: &ServerMessage) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, entry) in &drained {
            let _ = entry.sender.send(Outbound::Close(msg.clone()));
        }
        drained.len()
    }

    pub fn counts(&self) -> ConnectionCounts {
        let connections = self.lock();
        ConnectionCounts {
            total: connections.len(),
            associated: connections
                .values()
                .filter(|entry| entry.username.is_some())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(registry: &ConnectionRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(id, tx);
        (id, rx)
    }

    #[test]
    fn association_is_one_per_connection() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&registry);
        registry.associate(id, Username::new("ann")).unwrap();
        assert_eq!(
            registry.associate(id, Username::new("bob")),
            Err(ClientError::AlreadyAssociated)
        );
        assert!(registry.knows(&Username::new("ann")));
        assert_eq!(registry.username_of(id), Some(Username::new("ann")));
    }

    #[test]
    fn unicast_reaches_only_the_named_player() {
        let registry = ConnectionRegistry::new();
        let (ann, mut ann_rx) = connect(&registry);
        let (_bob, mut bob_rx) = connect(&registry);
        registry.associate(ann, Username::new("ann")).unwrap();

        let sent = registry.deliver(&Delivery::Unicast(Username::new("ann")), &ServerMessage::Ping);
        assert_eq!(sent, 1);
        assert_eq!(ann_rx.try_recv().unwrap(), Outbound::Message(ServerMessage::Ping));
        assert!(bob_rx.try_recv().is_err());

        assert_eq!(registry.deliver(&Delivery::Broadcast, &ServerMessage::Ping), 2);
    }

    #[test]
    fn remove_reports_association() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = connect(&registry);
        let (b, _b_rx) = connect(&registry);
        registry.associate(a, Username::new("ann")).unwrap();
        assert_eq!(registry.remove(a), Some(Some(Username::new("ann"))));
        assert_eq!(registry.remove(b), Some(None));
        assert_eq!(registry.remove(b), None);
    }

    #[test]
    fn close_all_empties_registry() {
        let registry = ConnectionRegistry::new();
        let (_a, mut a_rx) = connect(&registry);
        let (_b, mut b_rx) = connect(&registry);
        assert_eq!(registry.close_all(&ServerMessage::Ping), 2);
        assert_eq!(registry.counts(), ConnectionCounts::default());
        assert!(matches!(a_rx.try_recv(), Ok(Outbound::Close(_))));
        assert!(matches!(b_rx.try_recv(), Ok(Outbound::Close(_))));
    }

    #[test]
    fn release_all_keeps_connections() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&registry);
        registry.associate(a, Username::new("ann")).unwrap();
        registry.release_all();
        assert_eq!(
            registry.counts(),
            ConnectionCounts {
                total: 1,
                associated: 0
            }
        );
        registry.associate(a, Username::new("ann")).unwrap();
    }
}
