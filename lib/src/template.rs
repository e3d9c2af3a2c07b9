//! Club-specific swing templates and pattern-match results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ClubType, MetricKind, PhaseTag, SwingMetrics};

/// Closed numeric range. Constructors keep `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    /// Build a range, swapping the bounds if given in the wrong order.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Symmetric range `center ± half_width`.
    pub fn around(center: f64, half_width: f64) -> Self {
        Self::new(center - half_width.abs(), center + half_width.abs())
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Acceptable range for each basic metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTolerances {
    pub max_speed: MetricRange,
    pub backswing_angle: MetricRange,
    pub downswing_angle: MetricRange,
    pub impact_timing: MetricRange,
    pub follow_through_angle: MetricRange,
    pub swing_tempo: MetricRange,
    pub swing_plane: MetricRange,
    pub clubhead_speed: MetricRange,
}

impl MetricTolerances {
    pub fn range(&self, kind: MetricKind) -> MetricRange {
        match kind {
            MetricKind::MaxSpeed => self.max_speed,
            MetricKind::BackswingAngle => self.backswing_angle,
            MetricKind::DownswingAngle => self.downswing_angle,
            MetricKind::ImpactTiming => self.impact_timing,
            MetricKind::FollowThroughAngle => self.follow_through_angle,
            MetricKind::SwingTempo => self.swing_tempo,
            MetricKind::SwingPlane => self.swing_plane,
            MetricKind::ClubheadSpeed => self.clubhead_speed,
        }
    }
}

/// Expected shape of one phase in a template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseExpectation {
    pub tag: PhaseTag,
    pub duration: f64,           // ms
    pub duration_tolerance: f64, // ms, symmetric
    pub acceleration: f64,       // m/s² peak
    pub acceleration_tolerance: f64,
    #[serde(default)]
    pub critical: bool,
}

/// Reference swing for a club family. Static data: the library can be
/// extended with custom templates but a stored template is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingTemplate {
    pub id: String,
    pub name: String,
    pub club: ClubType,
    pub ideal: SwingMetrics,
    pub tolerances: MetricTolerances,
    #[serde(default)]
    pub phases: Vec<PhaseExpectation>,
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationSeverity {
    Minor,
    Moderate,
    Major,
}

impl DeviationSeverity {
    /// Severity for a metric score below the 80-point acceptance line.
    pub fn from_score(score: f64) -> Self {
        if score < 50.0 {
            Self::Major
        } else if score < 70.0 {
            Self::Moderate
        } else {
            Self::Minor
        }
    }
}

impl fmt::Display for DeviationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Moderate => write!(f, "moderate"),
            Self::Major => write!(f, "major"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationDirection {
    TooLow,
    TooHigh,
}

/// A metric that scored below 80 against the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub metric: MetricKind,
    pub expected: f64,
    pub actual: f64,
    pub score: f64,
    pub severity: DeviationSeverity,
    pub direction: DeviationDirection,
    pub impact: String,
}

/// Score of one template phase against the observed phases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMatch {
    pub tag: PhaseTag,
    pub duration_score: f64,
    pub acceleration_score: f64,
    pub score: f64,
    pub within_tolerance: bool,
    pub critical: bool,
}

/// Result of comparing one swing against one template. Recomputed per
/// comparison, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatchResult {
    pub template_id: String,
    pub template_name: String,
    pub club: ClubType,
    pub overall_match: f64, // 0-100
    pub metrics_match: f64,
    pub phase_match: f64,
    #[serde(default)]
    pub phase_matches: Vec<PhaseMatch>,
    #[serde(default)]
    pub deviations: Vec<Deviation>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}
