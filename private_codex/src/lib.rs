//! # Private Codex
//!
//! An authoritative match server for a 2 to 4 player card-placement game.
//!
//! The library owns the whole coordination engine: lobby admission, the
//! phase machine, the shared table of decks and face-up cards, per-player
//! boards, and the distribution of every resulting event to clients no matter
//! which wire protocol they joined over.
//!
//! ## Architecture
//!
//! A match moves through seven phases, never skipping and never going back:
//!
//! - **Login**: Waiting for the first player
//! - **AwaitCapacity**: The first player fixes how many players to wait for
//! - **AwaitColor**: Everyone picks a distinct color
//! - **RootPlacement**: Everyone places their starter card at the origin
//! - **ObjectiveSelection**: Everyone keeps one of two secret objectives
//! - **TurnFlow**: Players take turns placing one card and drawing one card
//! - **End**: Objective bonuses are scored and standings announced
//!
//! All mutation happens inside a single session actor. Transports decode
//! client frames, submit them through a [`SessionHandle`], and drain
//! per-connection queues the actor fills.
//!
//! ## Core Modules
//!
//! - [`game`]: Match model, phase machine, rules and snapshots
//! - [`session`]: The session actor, its handle and event fan-out
//! - [`transport`]: Transport trait, connection registry and TCP transport
//! - [`net`]: Wire messages, frame codecs and a blocking test client
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use private_codex::{GameMaster, StandardRules, entities::Username};
//!
//! let mut master = GameMaster::new(Arc::new(StandardRules), Some(42));
//! assert_eq!(master.login(Username::new("ann")), Ok(true));
//! ```

/// Core match logic, entities and phase machine.
pub mod game;
pub use game::{
    GameMaster, MatchState, Phase, StandardRules, UserError,
    constants::{self, MAX_PLAYERS, MIN_PLAYERS},
    entities,
};

/// Wire messages and codecs.
pub mod net;
pub use net::{client::Client, messages, utils};

/// Session actor and event fan-out.
pub mod session;
pub use session::{SessionActor, SessionConfig, SessionHandle};

/// Transport-agnostic distribution and the TCP transport.
pub mod transport;
pub use transport::{TcpTransport, TransportAdapter};
