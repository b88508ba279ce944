use serde::{Deserialize, Serialize};
use std::fmt;

use super::super::game::{
    UserError,
    deck::TableView,
    entities::{CardCategory, CardId, Color, Coordinate, DrawSource, Facing, Username},
    events::{EndReason, HandView, Placement, Standing},
    lobby::Roster,
};

/// Errors due to the client's interaction with the server and not from
/// the user's particular action.
#[derive(Clone, Debug, Deserialize, Eq, thiserror::Error, PartialEq, Serialize)]
pub enum ClientError {
    #[error("already associated")]
    AlreadyAssociated,
    #[error("unassociated")]
    Unassociated,
    #[error("invalid message")]
    InvalidMessage,
    #[error("rate limited")]
    RateLimited,
}

/// A user command. Everything except `Login` acts as the player the
/// connection is associated with.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UserCommand {
    /// Join the lobby under a unique name.
    Login(Username),
    /// First player only: how many players the match waits for.
    FixCapacity(usize),
    AssignColor(Color),
    /// Place a hand card. During root placement the starter card is placed
    /// and `hand_index` is ignored.
    PlaceCard {
        hand_index: usize,
        coordinate: Coordinate,
        facing: Facing,
    },
    DrawCard {
        category: CardCategory,
        source: DrawSource,
    },
    /// Keep one of the two offered secret objectives.
    ChooseObjective(usize),
    /// Chat text. `@name` tokens direct it to those players only.
    SendChat(String),
    /// Reply to a liveness probe.
    Pong,
}

impl fmt::Display for UserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match &self {
            Self::Login(name) => &format!("logged in as {name}"),
            Self::FixCapacity(n) => &format!("fixed capacity to {n}"),
            Self::AssignColor(color) => &format!("picked {color}"),
            Self::PlaceCard {
                hand_index,
                coordinate,
                facing,
            } => &format!("placed card #{hand_index} {facing} up at {coordinate}"),
            Self::DrawCard { category, source } => &format!("drew {category} from {source}"),
            Self::ChooseObjective(idx) => &format!("chose objective #{idx}"),
            Self::SendChat(_) => "sent a chat message",
            Self::Pong => "pong",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChatMessage {
    pub from: Username,
    pub text: String,
    /// Whether the message was addressed with `@name` tokens.
    pub direct: bool,
}

/// A message from the server to a client.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ServerMessage {
    /// The command was processed successfully.
    Ack(UserCommand),
    /// The client caused an error unrelated to game rules.
    ClientError(ClientError),
    /// The command was read but the match rejected it.
    UserError(UserError),
    Roster(Roster),
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
    /// Sent only to the player whose turn just started.
    YourTurn { turn: u32 },
    Hand(HandView),
    ObjectivesRevealed([CardId; 2]),
    SecretObjectiveChoices([CardId; 2]),
    EndGame {
        reason: EndReason,
        standings: Vec<Standing>,
    },
    Chat(ChatMessage),
    /// Liveness probe. Clients answer with `UserCommand::Pong`.
    Ping,
    /// The match was torn down. The connection closes after this.
    Disconnected(UserError),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match &self {
            Self::Ack(command) => format!("ack: {command}"),
            Self::ClientError(error) => error.to_string(),
            Self::UserError(error) => error.to_string(),
            Self::Roster(roster) => format!("roster of {}", roster.players.len()),
            Self::MatchStarting { resumed, .. } => {
                if *resumed {
                    "match resumed".to_string()
                } else {
                    "match starting".to_string()
                }
            }
            Self::CardPlaced(placement) => format!(
                "{} placed {} at {} ({} points)",
                placement.player, placement.card, placement.coordinate, placement.points
            ),
            Self::CardDrawn {
                player,
                category,
                source,
                ..
            } => format!("{player} drew {category} from {source}"),
            Self::TurnChanged { player, turn, .. } => format!("turn {turn}: {player}"),
            Self::YourTurn { turn } => format!("your turn ({turn})"),
            Self::Hand(_) => "hand".to_string(),
            Self::ObjectivesRevealed(common) => {
                format!("common objectives {} and {}", common[0], common[1])
            }
            Self::SecretObjectiveChoices(choices) => {
                format!("choose objective {} or {}", choices[0], choices[1])
            }
            Self::EndGame { reason, .. } => format!("game over ({reason:?})"),
            Self::Chat(chat) => format!("{}: {}", chat.from, chat.text),
            Self::Ping => "ping".to_string(),
            Self::Disconnected(error) => format!("disconnected: {error}"),
        };
        write!(f, "{repr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        assert_eq!(ClientError::AlreadyAssociated.to_string(), "already associated");
        assert_eq!(ClientError::Unassociated.to_string(), "unassociated");
        assert_eq!(ClientError::InvalidMessage.to_string(), "invalid message");
    }

    #[test]
    fn test_user_command_display() {
        let cmd = UserCommand::DrawCard {
            category: CardCategory::Gold,
            source: DrawSource::FaceUp(1),
        };
        assert_eq!(cmd.to_string(), "drew gold from face-up slot 1");
        assert_eq!(
            UserCommand::Login(Username::new("ann")).to_string(),
            "logged in as ann"
        );
    }

    #[test]
    fn test_login_json_shape() {
        let json = serde_json::to_string(&UserCommand::Login(Username::new("ann lee"))).unwrap();
        assert_eq!(json, r#"{"Login":"ann_lee"}"#);
        let cmd: UserCommand = serde_json::from_str(
            r#"{"PlaceCard":{"hand_index":1,"coordinate":{"x":0,"y":-1},"facing":"back"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            UserCommand::PlaceCard {
                hand_index: 1,
                coordinate: Coordinate::new(0, -1),
                facing: Facing::Back,
            }
        );
    }

    #[test]
    fn test_unit_commands_are_plain_strings() {
        assert_eq!(serde_json::to_string(&UserCommand::Pong).unwrap(), r#""Pong""#);
        assert_eq!(serde_json::to_string(&ServerMessage::Ping).unwrap(), r#""Ping""#);
    }

    #[test]
    fn test_server_message_display() {
        let msg = ServerMessage::Disconnected(UserError::ConnectionLost(Username::new("bob")));
        assert_eq!(msg.to_string(), "disconnected: connection to bob lost");
        let msg = ServerMessage::UserError(UserError::NotYourTurn);
        assert_eq!(msg.to_string(), "not your turn");
    }

    #[test]
    fn test_user_error_survives_bincode() {
        let msg = ServerMessage::UserError(UserError::ConnectionLost(Username::new("eve")));
        let bytes = bincode::serde::encode_to_vec(&msg, bincode::config::standard()).unwrap();
        let (back, _): (ServerMessage, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(back, msg);
    }
}
