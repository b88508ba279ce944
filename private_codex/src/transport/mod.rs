//! Transport-agnostic distribution.
//!
//! Every wire protocol implements [`TransportAdapter`]. Implementors only
//! supply a name and a [`ConnectionRegistry`]; the delivery surface and the
//! event hooks are provided on top of it, so each hook behaves the same no
//! matter which protocol a client joined over. Encoding happens in the
//! connection tasks that drain the registry's queues.
//!
//! ## Architecture
//!
//! ```text
//! session actor -> Distributor -> [TcpTransport, WsTransport, ...]
//!                                      |
//!                                      v
//!                       per-connection queue -> connection task -> socket
//! ```

pub mod health;
pub mod registry;
pub mod tcp;

pub use health::Liveness;
pub use registry::{ConnectionCounts, ConnectionId, ConnectionRegistry, Delivery, Outbound};
pub use tcp::TcpTransport;

use crate::{
    game::{
        UserError,
        deck::TableView,
        entities::{CardCategory, CardId, DrawSource, Username},
        events::{EndReason, HandView, Placement, Standing},
        lobby::Roster,
    },
    net::messages::{ChatMessage, ClientError, ServerMessage},
};

pub trait TransportAdapter: Send + Sync {
    /// Short protocol name used in logs, metrics and status.
    fn protocol(&self) -> &'static str;

    fn registry(&self) -> &ConnectionRegistry;

    /// Queue a message. Never blocks on a socket.
    fn deliver(&self, to: Delivery, msg: ServerMessage) -> usize {
        self.registry().deliver(&to, &msg)
    }

    fn owns(&self, id: ConnectionId) -> bool {
        self.registry().contains(id)
    }

    fn knows(&self, name: &Username) -> bool {
        self.registry().knows(name)
    }

    fn username_of(&self, id: ConnectionId) -> Option<Username> {
        self.registry().username_of(id)
    }

    fn associate(&self, id: ConnectionId, name: Username) -> Result<(), ClientError> {
        self.registry().associate(id, name)
    }

    /// Drop a lost connection. See [`ConnectionRegistry::remove`].
    fn forget(&self, id: ConnectionId) -> Option<Option<Username>> {
        self.registry().remove(id)
    }

    fn release_all(&self) {
        self.registry().release_all();
    }

    /// Close every connection with a final `Disconnected(reason)`.
    fn disconnect_all(&self, reason: UserError) -> usize {
        let closed = self
            .registry()
            .close_all(&ServerMessage::Disconnected(reason));
        log::info!("{}: closed {} connections", self.protocol(), closed);
        closed
    }

    fn broadcast_roster_changed(&self, roster: &Roster) {
        self.deliver(Delivery::Broadcast, ServerMessage::Roster(roster.clone()));
    }

    fn broadcast_match_starting(&self, roster: &Roster, table: &TableView, resumed: bool) {
        self.deliver(
            Delivery::Broadcast,
            ServerMessage::MatchStarting {
                roster: roster.clone(),
                table: table.clone(),
                resumed,
            },
        );
    }

    fn broadcast_card_placed(&self, placement: &Placement) {
        self.deliver(
            Delivery::Broadcast,
            ServerMessage::CardPlaced(placement.clone()),
        );
    }

    fn broadcast_card_drawn(
        &self,
        player: &Username,
        category: CardCategory,
        source: DrawSource,
        table: &TableView,
    ) {
        self.deliver(
            Delivery::Broadcast,
            ServerMessage::CardDrawn {
                player: player.clone(),
                category,
                source,
                table: table.clone(),
            },
        );
    }

    fn broadcast_turn_changed(&self, player: &Username, turn: u32, final_round: bool) {
        self.deliver(
            Delivery::Broadcast,
            ServerMessage::TurnChanged {
                player: player.clone(),
                turn,
                final_round,
            },
        );
    }

    /// Tell the current player it's their move.
    fn notify_turn(&self, player: &Username, turn: u32) {
        self.deliver(
            Delivery::Unicast(player.clone()),
            ServerMessage::YourTurn { turn },
        );
    }

    fn unicast_hand(&self, player: &Username, hand: &HandView) {
        self.deliver(
            Delivery::Unicast(player.clone()),
            ServerMessage::Hand(hand.clone()),
        );
    }

    fn broadcast_objectives_revealed(&self, common: [CardId; 2]) {
        self.deliver(Delivery::Broadcast, ServerMessage::ObjectivesRevealed(common));
    }

    fn unicast_secret_objective_choices(&self, player: &Username, choices: [CardId; 2]) {
        self.deliver(
            Delivery::Unicast(player.clone()),
            ServerMessage::SecretObjectiveChoices(choices),
        );
    }

    fn broadcast_end_game(&self, reason: EndReason, standings: &[Standing]) {
        self.deliver(
            Delivery::Broadcast,
            ServerMessage::EndGame {
                reason,
                standings: standings.to_vec(),
            },
        );
    }

    /// Deliver chat. An empty `recipients` list means everyone; otherwise
    /// the listed players plus the sender get it.
    fn route_chat_message(&self, sender: &Username, text: &str, recipients: &[Username]) {
        let msg = ServerMessage::Chat(ChatMessage {
            from: sender.clone(),
            text: text.to_string(),
            direct: !recipients.is_empty(),
        });
        if recipients.is_empty() {
            self.deliver(Delivery::Broadcast, msg);
        } else {
            let mut group = recipients.to_vec();
            if !group.contains(sender) {
                group.push(sender.clone());
            }
            self.deliver(Delivery::Group(group), msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct Loopback {
        registry: ConnectionRegistry,
    }

    impl TransportAdapter for Loopback {
        fn protocol(&self) -> &'static str {
            "loopback"
        }

        fn registry(&self) -> &ConnectionRegistry {
            &self.registry
        }
    }

    fn join(
        adapter: &Loopback,
        name: Option<&str>,
    ) -> mpsc::UnboundedReceiver<Outbound> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        adapter.registry().register(id, tx);
        if let Some(name) = name {
            adapter.associate(id, Username::new(name)).unwrap();
        }
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn direct_chat_reaches_recipients_and_sender() {
        let adapter = Loopback::default();
        let mut ann = join(&adapter, Some("ann"));
        let mut bob = join(&adapter, Some("bob"));
        let mut cat = join(&adapter, Some("cat"));

        adapter.route_chat_message(&Username::new("ann"), "@bob hi", &[Username::new("bob")]);
        assert_eq!(drain(&mut ann).len(), 1);
        assert_eq!(drain(&mut bob).len(), 1);
        assert!(drain(&mut cat).is_empty());
    }

    #[test]
    fn undirected_chat_reaches_unassociated_connections() {
        let adapter = Loopback::default();
        let mut ann = join(&adapter, Some("ann"));
        let mut watcher = join(&adapter, None);
        adapter.route_chat_message(&Username::new("ann"), "hello", &[]);
        assert_eq!(drain(&mut ann).len(), 1);
        let msgs = drain(&mut watcher);
        assert!(matches!(
            msgs.as_slice(),
            [Outbound::Message(ServerMessage::Chat(ChatMessage { direct: false, .. }))]
        ));
    }

    #[test]
    fn disconnect_all_sends_reason_then_closes() {
        let adapter = Loopback::default();
        let mut ann = join(&adapter, Some("ann"));
        assert_eq!(adapter.disconnect_all(UserError::MatchCancelled), 1);
        assert_eq!(
            drain(&mut ann),
            vec![Outbound::Close(ServerMessage::Disconnected(
                UserError::MatchCancelled
            ))]
        );
        assert!(!adapter.knows(&Username::new("ann")));
    }

    #[test]
    fn hand_is_private() {
        let adapter = Loopback::default();
        let mut ann = join(&adapter, Some("ann"));
        let mut bob = join(&adapter, Some("bob"));
        adapter.unicast_hand(
            &Username::new("bob"),
            &HandView {
                cards: [Some(1), None, Some(41)],
                root: None,
            },
        );
        assert!(drain(&mut ann).is_empty());
        assert_eq!(drain(&mut bob).len(), 1);
    }
}
