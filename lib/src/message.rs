//! Unified `EngineMessage` bus types.
//!
//! All events flow through a single `broadcast<EngineMessage>` channel.
//! Each message has a source (global ID of the originator), timestamp, and
//! a typed event. Producers create messages; consumers subscribe and filter.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ActorState, Club, ErrorPatternAlert, Handedness, HealthCheckResult, RawMotionPayload,
    RoundSnapshot, SwingAnalysis, SwingCalibration, SwingFeedback,
};

// ---------------------------------------------------------------------------
// Top-level message
// ---------------------------------------------------------------------------

/// A single event on the unified bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMessage {
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

impl EngineMessage {
    /// Create a new message with the current UTC timestamp. `BusSender`
    /// stamps the source on send; `.source()` sets it explicitly.
    pub fn new(event: impl Into<EngineEvent>) -> Self {
        Self {
            source: String::new(),
            timestamp: Utc::now(),
            event: event.into(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

// ---------------------------------------------------------------------------
// From impls: inner event types -> EngineEvent
// ---------------------------------------------------------------------------

impl From<MotionBatch> for EngineEvent {
    fn from(batch: MotionBatch) -> Self {
        EngineEvent::Motion(batch)
    }
}

impl From<RoundCommandEvent> for EngineEvent {
    fn from(event: RoundCommandEvent) -> Self {
        EngineEvent::RoundCommand(RoundCommand { event })
    }
}

impl From<RoundSnapshot> for EngineEvent {
    fn from(snapshot: RoundSnapshot) -> Self {
        EngineEvent::RoundSnapshot(snapshot)
    }
}

impl From<SwingAnalysis> for EngineEvent {
    fn from(analysis: SwingAnalysis) -> Self {
        EngineEvent::SwingAnalyzed(Box::new(analysis))
    }
}

impl From<SwingFeedback> for EngineEvent {
    fn from(feedback: SwingFeedback) -> Self {
        EngineEvent::SwingFeedback(feedback)
    }
}

impl From<SwingCalibration> for EngineEvent {
    fn from(calibration: SwingCalibration) -> Self {
        EngineEvent::CalibrationUpdated(Box::new(calibration))
    }
}

impl From<ActorState> for EngineEvent {
    fn from(state: ActorState) -> Self {
        EngineEvent::ActorStatus(state)
    }
}

impl From<AlertMessage> for EngineEvent {
    fn from(alert: AlertMessage) -> Self {
        EngineEvent::Alert(alert)
    }
}

impl From<HealthCheckResult> for EngineEvent {
    fn from(report: HealthCheckResult) -> Self {
        EngineEvent::Health(report)
    }
}

impl From<ErrorPatternAlert> for EngineEvent {
    fn from(alert: ErrorPatternAlert) -> Self {
        EngineEvent::ErrorPattern(alert)
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// The typed event payload carried by an `EngineMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Raw samples from a sensor producer.
    Motion(MotionBatch),
    /// Round-context mutation (from the round manager).
    RoundCommand(RoundCommand),
    /// Round context after a command was applied.
    RoundSnapshot(RoundSnapshot),
    /// A swing closed and went through the full pipeline.
    SwingAnalyzed(Box<SwingAnalysis>),
    /// Verdict on a previously analyzed swing.
    SwingFeedback(SwingFeedback),
    /// Calibration completed or adapted for a user.
    CalibrationUpdated(Box<SwingCalibration>),
    /// Generic actor status update.
    ActorStatus(ActorState),
    /// Alert for user-visible warn/error conditions.
    Alert(AlertMessage),
    /// Health-check report.
    Health(HealthCheckResult),
    /// Error-pattern check tripped.
    ErrorPattern(ErrorPatternAlert),
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// A batch of raw readings in stream order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionBatch {
    pub samples: Vec<RawMotionPayload>,
}

// ---------------------------------------------------------------------------
// RoundCommand: from the round manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCommand {
    pub event: RoundCommandEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundCommandEvent {
    SetRoundActive { active: bool },
    SetClub { club: Club },
    SetHandedness { handedness: Handedness },
}

// ---------------------------------------------------------------------------
// AlertMessage: user-visible warn/error notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warn,
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warn => write!(f, "warn"),
            AlertLevel::Error => write!(f, "error"),
        }
    }
}

/// A user-visible alert. Info/debug/trace stays in the tracing backend;
/// warn/error conditions surface here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub level: AlertLevel,
    pub message: String,
}
