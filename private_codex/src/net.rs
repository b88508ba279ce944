//! Wire protocol shared by every transport.
//!
//! Both transports speak the same [`messages`]: TCP as length-prefixed
//! bincode frames, WebSocket as JSON text frames.

/// Blocking TCP client, mostly for tests.
pub mod client;

/// Codec errors.
pub mod errors;

/// Commands from clients and messages from the server.
pub mod messages;

/// Frame encoding and decoding.
pub mod utils;
