//! Match model and rules engine.
//!
//! This module holds everything that mutates during a match:
//! - Lobby admission, capacity and colors
//! - The shared table with its two decks and face-up slots
//! - Per-player boards with derived corner links
//! - The phase machine and the [`GameMaster`] aggregate
//! - Snapshot persistence of an in-flight match

pub mod board;
pub mod constants;
pub mod deck;
pub mod entities;
pub mod errors;
pub mod events;
pub mod lobby;
pub mod master;
pub mod phases;
pub mod rules;
pub mod snapshot;

pub use errors::UserError;
pub use events::{EndReason, MatchEvent};
pub use master::{GameMaster, MatchState};
pub use phases::{Phase, PhaseRules};
pub use rules::{RuleEvaluator, StandardRules};
pub use snapshot::{FileSnapshotStore, MatchSnapshot, MemorySnapshotStore, SnapshotStore};
