//! Calibration sessions and the persisted per-user calibration records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ClubType, Handedness, MetricRange, MotionSample, SwingMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A swing recorded during calibration, confirmed or rejected by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSwing {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub confirmed: bool,
    #[serde(default)]
    pub club: Option<ClubType>,
    pub metrics: SwingMetrics,
    #[serde(default)]
    pub samples: Vec<MotionSample>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl CalibrationSwing {
    pub fn new(confirmed: bool, metrics: SwingMetrics, samples: Vec<MotionSample>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            confirmed,
            club: None,
            metrics,
            samples,
            feedback: None,
        }
    }

    pub fn with_club(mut self, club: ClubType) -> Self {
        self.club = Some(club);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// Environment at session start.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(default)]
    pub indoor: bool,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Device at session start.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub sample_rate_hz: f64,
    #[serde(default)]
    pub firmware: Option<String>,
}

/// An explicit calibration session. At most one is active per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSession {
    pub id: Uuid,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub swings: Vec<CalibrationSwing>,
    #[serde(default)]
    pub environment: EnvironmentSnapshot,
    #[serde(default)]
    pub device: DeviceSnapshot,
    pub status: SessionStatus,
}

impl CalibrationSession {
    pub fn new(user_id: impl Into<String>, environment: EnvironmentSnapshot, device: DeviceSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            swings: Vec::new(),
            environment,
            device,
            status: SessionStatus::Active,
        }
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &CalibrationSwing> {
        self.swings.iter().filter(|s| s.confirmed)
    }

    pub fn unconfirmed(&self) -> impl Iterator<Item = &CalibrationSwing> {
        self.swings.iter().filter(|s| !s.confirmed)
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed().count()
    }
}

/// Personalized acceptance ranges derived from confirmed calibration swings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedRanges {
    pub max_speed: MetricRange,
    pub clubhead_speed: MetricRange,
    pub backswing_angle: MetricRange,
    pub downswing_angle: MetricRange,
    pub swing_tempo: MetricRange,
    pub impact_timing: MetricRange,
}

impl PersonalizedRanges {
    pub fn all(&self) -> [MetricRange; 6] {
        [
            self.max_speed,
            self.clubhead_speed,
            self.backswing_angle,
            self.downswing_angle,
            self.swing_tempo,
            self.impact_timing,
        ]
    }
}

/// Per-user detection thresholds. Persisted as a flat JSON record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingCalibration {
    pub user_id: String,
    pub baseline_noise: f64,
    pub swing_threshold: f64,
    pub handedness: Handedness,
    #[serde(default)]
    pub dominant_club: Option<ClubType>,
    pub ranges: PersonalizedRanges,
    pub confidence_threshold: f64,
    pub calibrated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Running adaptive-learning totals for one user. Persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveLearningData {
    pub user_id: String,
    pub total_swings: u64,
    pub confirmed_swings: u64,
    pub false_positive_swings: u64,
    pub accuracy: f64, // 0-100
    pub learning_rate: f64,
    pub stability_period: u64,
    pub updated_at: DateTime<Utc>,
}

impl AdaptiveLearningData {
    pub fn new(user_id: impl Into<String>, learning_rate: f64, stability_period: u64) -> Self {
        Self {
            user_id: user_id.into(),
            total_swings: 0,
            confirmed_swings: 0,
            false_positive_swings: 0,
            accuracy: 0.0,
            learning_rate,
            stability_period,
            updated_at: Utc::now(),
        }
    }
}
