//! Wire codec errors.

use thiserror::Error;

/// Errors while turning messages into frames or frames into messages.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode refused to encode a message
    #[error("failed to encode frame: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// A TCP frame body was not a valid message
    #[error("failed to decode frame: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("frame size {actual} exceeds maximum {max}")]
    MessageTooLarge { actual: usize, max: usize },

    /// A WebSocket text frame was not a valid message
    #[error("invalid json frame: {0}")]
    InvalidFormat(String),
}

impl SerializationError {
    /// Whether the peer sent something unreadable, as opposed to us failing
    /// to produce a frame.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::InvalidFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, SerializationError>;
