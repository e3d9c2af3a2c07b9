//! Round state: whether a round is active, the selected club, and the
//! golfer's handedness. Feeds the validation context of every swing.

use std::sync::{Arc, RwLock};

pub use swingsense::{Club, Handedness, RoundSnapshot};

/// Shared interior state backing both `RoundState` (read) and
/// `RoundStateWriter` (write).
struct RoundStateInner {
    round_active: RwLock<bool>,
    club: RwLock<Option<Club>>,
    handedness: RwLock<Option<Handedness>>,
}

/// Read-only round state. Exposes only `snapshot()`. Lives on
/// `SystemState.round` and is accessible to all actors.
pub struct RoundState {
    inner: Arc<RoundStateInner>,
}

/// Write handle for round state mutations.
///
/// Only the `SystemActor` holds this. All round mutations flow through bus
/// events processed by `SystemActor`, enforced at the type level.
pub struct RoundStateWriter {
    inner: Arc<RoundStateInner>,
}

impl RoundState {
    /// Create a new `RoundState` and its companion `RoundStateWriter`. A
    /// round starts inactive with no club selected.
    pub fn new() -> (Self, RoundStateWriter) {
        let inner = Arc::new(RoundStateInner {
            round_active: RwLock::new(false),
            club: RwLock::new(None),
            handedness: RwLock::new(None),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            RoundStateWriter { inner },
        )
    }

    /// Take an immutable snapshot of the current round.
    pub fn snapshot(&self) -> RoundSnapshot {
        let round_active = *self
            .inner
            .round_active
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let club = *self.inner.club.read().unwrap_or_else(|e| e.into_inner());
        let handedness = *self
            .inner
            .handedness
            .read()
            .unwrap_or_else(|e| e.into_inner());
        RoundSnapshot {
            round_active,
            club,
            handedness,
        }
    }
}

impl RoundStateWriter {
    pub fn set_round_active(&self, active: bool) {
        *self
            .inner
            .round_active
            .write()
            .unwrap_or_else(|e| e.into_inner()) = active;
    }

    pub fn set_club(&self, club: Club) {
        *self.inner.club.write().unwrap_or_else(|e| e.into_inner()) = Some(club);
    }

    pub fn set_handedness(&self, handedness: Handedness) {
        *self
            .inner
            .handedness
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(handedness);
    }
}
