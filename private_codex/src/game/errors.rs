use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::Username;

/// Errors returned to the acting connection. Only `ConnectionLost` and
/// `MatchCancelled` are ever sent to everyone, as part of a teardown.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserError {
    #[error("name already taken")]
    NameTaken,
    #[error("lobby is full")]
    LobbyFull,
    #[error("capacity must be between 2 and 4 and cover admitted players")]
    InvalidCapacity,
    #[error("capacity already fixed")]
    AlreadyFixed,
    #[error("color already taken")]
    ColorTaken,
    #[error("no such player")]
    UnknownName,
    #[error("action not allowed in this phase")]
    WrongPhase,
    #[error("not your turn")]
    NotYourTurn,
    #[error("card can't be placed there")]
    CardPositionInvalid,
    #[error("not enough resources")]
    NotEnoughResources,
    #[error("nothing to draw there")]
    InvalidPosition,
    #[error("invalid action")]
    InvalidAction,
    #[error("connection to {0} lost")]
    ConnectionLost(Username),
    #[error("match cancelled")]
    MatchCancelled,
}

impl UserError {
    /// Short stable label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NameTaken => "name_taken",
            Self::LobbyFull => "lobby_full",
            Self::InvalidCapacity => "invalid_capacity",
            Self::AlreadyFixed => "already_fixed",
            Self::ColorTaken => "color_taken",
            Self::UnknownName => "unknown_name",
            Self::WrongPhase => "wrong_phase",
            Self::NotYourTurn => "not_your_turn",
            Self::CardPositionInvalid => "card_position_invalid",
            Self::NotEnoughResources => "not_enough_resources",
            Self::InvalidPosition => "invalid_position",
            Self::InvalidAction => "invalid_action",
            Self::ConnectionLost(_) => "connection_lost",
            Self::MatchCancelled => "match_cancelled",
        }
    }
}
