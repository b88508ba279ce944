//! Game-wide limits and card id ranges.

use std::ops::RangeInclusive;

/// Fewest players a lobby can be fixed to.
pub const MIN_PLAYERS: usize = 2;

/// Most players a single match supports.
pub const MAX_PLAYERS: usize = 4;

/// Number of card slots in a player's hand.
pub const HAND_SIZE: usize = 3;

/// Number of face-up slots per card category on the shared table.
pub const FACE_UP_SLOTS: usize = 2;

/// Points are capped here until objective bonuses are added at the end.
pub const POINT_CAP: u32 = 29;

/// Reaching this many points starts the final round.
pub const FINAL_ROUND_POINTS: u32 = 20;

/// Usernames are truncated to this many characters.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Chat messages are truncated to this many characters.
pub const MAX_CHAT_LENGTH: usize = 256;

pub const RESOURCE_CARDS: RangeInclusive<u16> = 1..=40;
pub const GOLD_CARDS: RangeInclusive<u16> = 41..=80;
pub const STARTER_CARDS: RangeInclusive<u16> = 81..=86;
pub const OBJECTIVE_CARDS: RangeInclusive<u16> = 87..=102;

/// Resource and gold cards come in runs of this many per kingdom.
pub const CARDS_PER_KINGDOM: u16 = 10;
