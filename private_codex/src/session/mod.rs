//! Session coordination.
//!
//! One [`SessionActor`] owns the match and is the only place it is mutated.
//! Transports hand decoded commands to it through a cloneable
//! [`SessionHandle`]; the actor applies them in arrival order, queues the
//! reply for the acting connection and then fans the resulting events out
//! through the [`Distributor`].

pub mod actor;
pub mod config;
pub mod distributor;
pub mod messages;

pub use actor::{SessionActor, SessionHandle};
pub use config::SessionConfig;
pub use distributor::Distributor;
pub use messages::{SessionError, SessionMessage, SessionStatus, TransportStatus};
