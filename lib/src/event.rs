//! Shared domain types carried by bus messages.
//!
//! Pure data with no channel affinity; `message.rs` wraps them into the
//! typed bus events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CompletedSwing, DetailedSwingMetrics, PatternMatchResult, ValidationResult};

/// Full pipeline output for one closed swing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingAnalysis {
    #[serde(default)]
    pub user_id: Option<String>,
    pub swing: CompletedSwing,
    pub detailed: DetailedSwingMetrics,
    /// Template matches, best first.
    #[serde(default)]
    pub matches: Vec<PatternMatchResult>,
    pub validation: ValidationResult,
}

impl SwingAnalysis {
    pub fn best_match(&self) -> Option<&PatternMatchResult> {
        self.matches.first()
    }
}

/// User (or coach) verdict on a detected swing, fed back into adaptation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingFeedback {
    pub user_id: String,
    pub swing_id: Uuid,
    pub correct: bool,
}

// ---------------------------------------------------------------------------
// ActorStatus: generic actor lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Starting,
    Running,
    Stopped,
}

impl std::fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Actor state emitted on the bus. Carries lifecycle status and
/// actor-specific key/value telemetry (swing count, buffer fill, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorState {
    pub status: ActorStatus,
    #[serde(default)]
    pub telemetry: HashMap<String, String>,
}

impl ActorState {
    pub fn new(status: ActorStatus, telemetry: HashMap<String, String>) -> Self {
        Self { status, telemetry }
    }
}
