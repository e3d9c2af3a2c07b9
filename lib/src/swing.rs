//! Swing phases, per-swing metric vectors, and the completed-swing record.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ClubType, MotionSample};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTag {
    Address,
    Backswing,
    Transition,
    Downswing,
    Impact,
    FollowThrough,
}

impl PhaseTag {
    /// All tags in swing order.
    pub const ALL: &[PhaseTag] = &[
        PhaseTag::Address,
        PhaseTag::Backswing,
        PhaseTag::Transition,
        PhaseTag::Downswing,
        PhaseTag::Impact,
        PhaseTag::FollowThrough,
    ];
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Backswing => write!(f, "backswing"),
            Self::Transition => write!(f, "transition"),
            Self::Downswing => write!(f, "downswing"),
            Self::Impact => write!(f, "impact"),
            Self::FollowThrough => write!(f, "followthrough"),
        }
    }
}

/// A labeled time segment `[start, end)` of a single swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPhase {
    pub tag: PhaseTag,
    pub start: u64, // ms
    pub end: u64,   // ms, exclusive
    pub peak_acceleration: f64, // m/s²
}

impl SwingPhase {
    pub fn new(tag: PhaseTag, start: u64, end: u64, peak_acceleration: f64) -> Self {
        Self {
            tag,
            start,
            end,
            peak_acceleration,
        }
    }

    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// First phase carrying `tag`, if any.
pub fn find_phase(phases: &[SwingPhase], tag: PhaseTag) -> Option<&SwingPhase> {
    phases.iter().find(|p| p.tag == tag)
}

// ---------------------------------------------------------------------------
// Basic metrics
// ---------------------------------------------------------------------------

/// Basic per-swing feature vector emitted when a swing closes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwingMetrics {
    pub max_speed: f64,            // m/s², peak acceleration magnitude
    pub backswing_angle: f64,      // deg of rotation during backswing
    pub downswing_angle: f64,      // deg of rotation during downswing
    pub impact_timing: f64,        // ms from downswing start to impact
    pub follow_through_angle: f64, // deg of rotation after impact
    pub swing_tempo: f64,          // backswing / downswing duration
    pub swing_plane: f64,          // deg from horizontal
    pub clubhead_speed: f64,       // mph, estimated
}

impl SwingMetrics {
    pub fn is_finite(&self) -> bool {
        MetricKind::ALL.iter().all(|k| k.value(self).is_finite())
    }
}

/// Addressable metric of a `SwingMetrics` vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MaxSpeed,
    BackswingAngle,
    DownswingAngle,
    ImpactTiming,
    FollowThroughAngle,
    SwingTempo,
    SwingPlane,
    ClubheadSpeed,
}

impl MetricKind {
    pub const ALL: &[MetricKind] = &[
        MetricKind::MaxSpeed,
        MetricKind::BackswingAngle,
        MetricKind::DownswingAngle,
        MetricKind::ImpactTiming,
        MetricKind::FollowThroughAngle,
        MetricKind::SwingTempo,
        MetricKind::SwingPlane,
        MetricKind::ClubheadSpeed,
    ];

    pub fn value(self, m: &SwingMetrics) -> f64 {
        match self {
            Self::MaxSpeed => m.max_speed,
            Self::BackswingAngle => m.backswing_angle,
            Self::DownswingAngle => m.downswing_angle,
            Self::ImpactTiming => m.impact_timing,
            Self::FollowThroughAngle => m.follow_through_angle,
            Self::SwingTempo => m.swing_tempo,
            Self::SwingPlane => m.swing_plane,
            Self::ClubheadSpeed => m.clubhead_speed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MaxSpeed => "swing speed",
            Self::BackswingAngle => "backswing rotation",
            Self::DownswingAngle => "downswing rotation",
            Self::ImpactTiming => "impact timing",
            Self::FollowThroughAngle => "follow-through rotation",
            Self::SwingTempo => "tempo",
            Self::SwingPlane => "swing plane",
            Self::ClubheadSpeed => "clubhead speed",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Detailed metrics
// ---------------------------------------------------------------------------

/// Per-phase durations (ms). Zero when the phase is absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub address: u64,
    pub backswing: u64,
    pub transition: u64,
    pub downswing: u64,
    pub impact: u64,
    pub follow_through: u64,
}

impl PhaseDurations {
    pub fn get(&self, tag: PhaseTag) -> u64 {
        match tag {
            PhaseTag::Address => self.address,
            PhaseTag::Backswing => self.backswing,
            PhaseTag::Transition => self.transition,
            PhaseTag::Downswing => self.downswing,
            PhaseTag::Impact => self.impact,
            PhaseTag::FollowThrough => self.follow_through,
        }
    }

    pub fn set(&mut self, tag: PhaseTag, value: u64) {
        match tag {
            PhaseTag::Address => self.address = value,
            PhaseTag::Backswing => self.backswing = value,
            PhaseTag::Transition => self.transition = value,
            PhaseTag::Downswing => self.downswing = value,
            PhaseTag::Impact => self.impact = value,
            PhaseTag::FollowThrough => self.follow_through = value,
        }
    }
}

/// Mean acceleration magnitude per phase (m/s²). Zero when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSpeeds {
    pub address: f64,
    pub backswing: f64,
    pub transition: f64,
    pub downswing: f64,
    pub impact: f64,
    pub follow_through: f64,
}

impl PhaseSpeeds {
    pub fn get(&self, tag: PhaseTag) -> f64 {
        match tag {
            PhaseTag::Address => self.address,
            PhaseTag::Backswing => self.backswing,
            PhaseTag::Transition => self.transition,
            PhaseTag::Downswing => self.downswing,
            PhaseTag::Impact => self.impact,
            PhaseTag::FollowThrough => self.follow_through,
        }
    }

    pub fn set(&mut self, tag: PhaseTag, value: f64) {
        match tag {
            PhaseTag::Address => self.address = value,
            PhaseTag::Backswing => self.backswing = value,
            PhaseTag::Transition => self.transition = value,
            PhaseTag::Downswing => self.downswing = value,
            PhaseTag::Impact => self.impact = value,
            PhaseTag::FollowThrough => self.follow_through = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsistencyFeatures {
    pub motion_smoothness: f64, // 0-100
    pub path_deviation: f64,    // deg, 0-20
    pub rhythm_score: f64,      // 0-100
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerFeatures {
    pub power_transfer: f64,    // 0-100
    pub peak_speed_timing: f64, // % of swing samples
    pub speed_acceleration: f64, // max |Δ magnitude| per frame
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotationFeatures {
    pub axis_stability: f64, // 0-100
    pub face_angle: f64,     // deg, ±20
    pub attack_angle: f64,   // deg, -10..5
}

/// Superset of `SwingMetrics`. Derived on demand from basic metrics, raw
/// samples, and phases; never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetailedSwingMetrics {
    pub basic: SwingMetrics,
    pub phase_durations: PhaseDurations,
    pub phase_speeds: PhaseSpeeds,
    pub consistency: ConsistencyFeatures,
    pub power: PowerFeatures,
    pub balance_score: f64, // 0-100
    pub rotation: RotationFeatures,
}

// ---------------------------------------------------------------------------
// Completed swing
// ---------------------------------------------------------------------------

/// A closed swing as emitted by the segmenter: ordered phases, the samples
/// that fall inside them, basic metrics, and the detection confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSwing {
    pub id: Uuid,
    pub phases: Vec<SwingPhase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<MotionSample>,
    pub metrics: SwingMetrics,
    pub confidence: f64, // 0-100
    #[serde(default)]
    pub club: Option<ClubType>,
}

impl CompletedSwing {
    pub fn start(&self) -> u64 {
        self.phases.first().map(|p| p.start).unwrap_or(0)
    }

    pub fn end(&self) -> u64 {
        self.phases.last().map(|p| p.end).unwrap_or(0)
    }

    pub fn duration_ms(&self) -> u64 {
        self.end().saturating_sub(self.start())
    }

    pub fn phase(&self, tag: PhaseTag) -> Option<&SwingPhase> {
        find_phase(&self.phases, tag)
    }
}
