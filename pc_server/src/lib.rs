//! Match server library: configuration, logging, metrics and the
//! HTTP/WebSocket API. The binary in `main.rs` wires these together with
//! the session actor and TCP transport from `private_codex`.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
