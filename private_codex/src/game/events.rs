//! Events produced by the game master, in issue order.

use serde::{Deserialize, Serialize};

use super::{
    constants::HAND_SIZE,
    deck::TableView,
    entities::{CardCategory, CardId, Coordinate, Corner, DrawSource, Facing, Resources, Username},
    lobby::Roster,
};

/// A committed placement with the player's new totals.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Placement {
    pub player: Username,
    pub card: CardId,
    pub coordinate: Coordinate,
    pub facing: Facing,
    pub links: Vec<(Corner, Coordinate)>,
    pub points: u32,
    pub resources: Resources,
}

/// What a single player privately holds.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandView {
    pub cards: [Option<CardId>; HAND_SIZE],
    /// Starter card waiting to be placed at the origin.
    pub root: Option<CardId>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Standing {
    pub player: Username,
    pub points: u32,
    pub objective_bonus: u32,
    pub total: u32,
    pub winner: bool,
}

/// Why a match reached its end.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Both decks and every face-up slot are empty.
    TableExhausted,
    /// A player emptied their hand with nothing left to draw.
    HandExhausted,
    /// The final round came back around to the first player.
    FinalRound,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEvent {
    RosterChanged(Roster),
    MatchStarting {
        roster: Roster,
        table: TableView,
        resumed: bool,
    },
    CardPlaced(Placement),
    CardDrawn {
        player: Username,
        category: CardCategory,
        source: DrawSource,
        table: TableView,
    },
    TurnChanged {
        player: Username,
        turn: u32,
        final_round: bool,
    },
    /// Private to `player`.
    Hand { player: Username, hand: HandView },
    ObjectivesRevealed { common: [CardId; 2] },
    /// Private to `player`.
    SecretObjectiveChoices {
        player: Username,
        choices: [CardId; 2],
    },
    EndGame {
        reason: EndReason,
        standings: Vec<Standing>,
    },
}

impl MatchEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RosterChanged(_) => "roster_changed",
            Self::MatchStarting { .. } => "match_starting",
            Self::CardPlaced(_) => "card_placed",
            Self::CardDrawn { .. } => "card_drawn",
            Self::TurnChanged { .. } => "turn_changed",
            Self::Hand { .. } => "hand",
            Self::ObjectivesRevealed { .. } => "objectives_revealed",
            Self::SecretObjectiveChoices { .. } => "secret_objective_choices",
            Self::EndGame { .. } => "end_game",
        }
    }
}
