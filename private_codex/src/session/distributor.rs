//! Fan-out of match events to every transport.

use std::sync::Arc;

use crate::{
    game::{UserError, entities::Username, events::MatchEvent},
    transport::{ConnectionCounts, ConnectionId, TransportAdapter},
};

/// Walks events in issue order and hands each one to every transport, so
/// per-transport ordering always matches the order the match produced.
#[derive(Clone)]
pub struct Distributor {
    adapters: Vec<Arc<dyn TransportAdapter>>,
}

impl Distributor {
    pub fn new(adapters: Vec<Arc<dyn TransportAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &[Arc<dyn TransportAdapter>] {
        &self.adapters
    }

    /// The transport a connection belongs to.
    pub fn owner(&self, id: ConnectionId) -> Option<&Arc<dyn TransportAdapter>> {
        self.adapters.iter().find(|adapter| adapter.owns(id))
    }

    pub fn knows(&self, name: &Username) -> bool {
        self.adapters.iter().any(|adapter| adapter.knows(name))
    }

    pub fn dispatch<I>(&self, events: I)
    where
        I: IntoIterator<Item = MatchEvent>,
    {
        for event in events {
            log::trace!("Dispatching {}", event.kind());
            for adapter in &self.adapters {
                Self::dispatch_one(adapter.as_ref(), &event);
            }
        }
    }

    fn dispatch_one(adapter: &dyn TransportAdapter, event: &MatchEvent) {
        match event {
            MatchEvent::RosterChanged(roster) => adapter.broadcast_roster_changed(roster),
            MatchEvent::MatchStarting {
                roster,
                table,
                resumed,
            } => adapter.broadcast_match_starting(roster, table, *resumed),
            MatchEvent::CardPlaced(placement) => adapter.broadcast_card_placed(placement),
            MatchEvent::CardDrawn {
                player,
                category,
                source,
                table,
            } => adapter.broadcast_card_drawn(player, *category, *source, table),
            MatchEvent::TurnChanged {
                player,
                turn,
                final_round,
            } => {
                adapter.broadcast_turn_changed(player, *turn, *final_round);
                adapter.notify_turn(player, *turn);
            }
            MatchEvent::Hand { player, hand } => adapter.unicast_hand(player, hand),
            MatchEvent::ObjectivesRevealed { common } => {
                adapter.broadcast_objectives_revealed(*common)
            }
            MatchEvent::SecretObjectiveChoices { player, choices } => {
                adapter.unicast_secret_objective_choices(player, *choices)
            }
            MatchEvent::EndGame { reason, standings } => {
                adapter.broadcast_end_game(*reason, standings)
            }
        }
    }

    /// Route chat across every transport. `@name` tokens that match a
    /// connected player make the message direct; if none match, everyone
    /// gets it.
    pub fn route_chat(&self, sender: &Username, text: &str) {
        let recipients: Vec<Username> = mentions(text)
            .into_iter()
            .filter(|name| self.knows(name))
            .collect();
        for adapter in &self.adapters {
            adapter.route_chat_message(sender, text, &recipients);
        }
    }

    pub fn disconnect_all(&self, reason: UserError) -> usize {
        self.adapters
            .iter()
            .map(|adapter| adapter.disconnect_all(reason.clone()))
            .sum()
    }

    pub fn release_all(&self) {
        for adapter in &self.adapters {
            adapter.release_all();
        }
    }

    pub fn counts(&self) -> Vec<(&'static str, ConnectionCounts)> {
        self.adapters
            .iter()
            .map(|adapter| (adapter.protocol(), adapter.registry().counts()))
            .collect()
    }
}

/// `@name` tokens in chat text, deduplicated, in order of appearance.
pub fn mentions(text: &str) -> Vec<Username> {
    let mut names: Vec<Username> = Vec::new();
    for token in text.split_whitespace() {
        let Some(raw) = token.strip_prefix('@') else {
            continue;
        };
        let raw = raw.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_');
        if raw.is_empty() {
            continue;
        }
        let name = Username::new(raw);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
