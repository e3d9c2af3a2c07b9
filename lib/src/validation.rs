//! Validation context supplied per call, validation verdicts, and the
//! false-positive signature schema.

use serde::{Deserialize, Serialize};

use crate::MetricRange;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Activity signals from the activity monitor for the minutes before a swing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecentActivity {
    #[serde(default)]
    pub walking: bool,
    #[serde(default)]
    pub driving: bool,
    /// Seconds the device was static immediately before the swing.
    #[serde(default)]
    pub static_seconds: f64,
}

/// Device stability signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceStability {
    pub signal_quality: f64, // 0-100
    pub accelerometer_variance: f64,
}

impl Default for DeviceStability {
    fn default() -> Self {
        Self {
            signal_quality: 100.0,
            accelerometer_variance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentalFactors {
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub wind_speed_mps: Option<f64>,
    #[serde(default)]
    pub indoor: bool,
}

/// Per-call validation context. Owned by the caller, not the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    pub round_active: bool,
    pub hour_of_day: u8, // 0-23, local
    #[serde(default)]
    pub activity: RecentActivity,
    #[serde(default)]
    pub device: DeviceStability,
    #[serde(default)]
    pub environment: EnvironmentalFactors,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            round_active: true,
            hour_of_day: 12,
            activity: RecentActivity::default(),
            device: DeviceStability::default(),
            environment: EnvironmentalFactors::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Pipeline stage that produced a factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    Context,
    FalsePositive,
    History,
    PatternMatch,
    Device,
}

/// One named adjustment applied during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFactor {
    pub source: FactorSource,
    pub name: String,
    /// Multiplier applied to confidence (1.0 = none).
    pub confidence_multiplier: f64,
    /// Additive confidence change (negative = penalty).
    #[serde(default)]
    pub confidence_delta: f64,
    pub risk_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub adjusted_confidence: f64, // 0-100
    pub false_positive_risk: f64, // 0-100
    #[serde(default)]
    pub factors: Vec<ValidationFactor>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// False-positive signatures
// ---------------------------------------------------------------------------

/// Shape of the acceleration envelope of a known non-swing motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationPattern {
    /// Expected peak magnitude (m/s²).
    pub peak: MetricRange,
    /// Expected crest factor (peak / mean magnitude).
    pub crest_factor: MetricRange,
}

/// Static signature of a motion that is easily mistaken for a swing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositivePattern {
    pub name: String,
    pub duration_ms: MetricRange,
    pub acceleration: AccelerationPattern,
    /// Dominant frequency (Hz) estimated from zero crossings.
    pub frequency_hz: MetricRange,
    /// Whether the motion repeats (walking) rather than occurring once.
    pub periodic: bool,
    /// Confidence points removed at full match strength.
    pub confidence_penalty: f64,
}
