//! Per-connection liveness.
//!
//! A connection alternates between believed-alive and awaiting-confirmation.
//! Each probe interval the connection task calls [`Liveness::probe`] before
//! sending a probe; the reader calls [`Liveness::confirm`] on every reply.
//! A probe that finds the previous one still unanswered means the
//! connection is dead.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct Liveness {
    awaiting: AtomicBool,
    probes: AtomicU32,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a probe as outstanding.
    ///
    /// # Returns
    ///
    /// `false` if the previous probe was never confirmed.
    pub fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::Relaxed);
        !self.awaiting.swap(true, Ordering::AcqRel)
    }

    pub fn confirm(&self) {
        self.awaiting.store(false, Ordering::Release);
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting.load(Ordering::Acquire)
    }

    pub fn probes_sent(&self) -> u32 {
        self.probes.load(Ordering::Relaxed)
    }
}
