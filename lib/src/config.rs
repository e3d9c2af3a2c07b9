//! Persisted config types. All fields are in user-friendly units (ms,
//! m/s², 0-100 percent) so the TOML file is hand-editable.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine sections
// ---------------------------------------------------------------------------

/// Phase-segmentation tuning. The calibrated baseline noise and swing
/// threshold come from the user's calibration; everything else here is the
/// tunable surface around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Samples in the moving-average magnitude window.
    pub smoothing_window: usize,
    /// Quiet time below baseline noise required to enter address (ms).
    pub stability_window_ms: u64,
    /// Backswing starts when the smoothed magnitude exceeds
    /// `baseline_noise * rise_factor`.
    pub rise_factor: f64,
    /// Transition starts when the smoothed magnitude falls below this share
    /// of the backswing peak. The smoothed rotation rate must fall by the
    /// same share of its own backswing peak.
    pub transition_drop_ratio: f64,
    /// Backswing rotation peaks (rad/s) below this carry no usable gyro
    /// signal; the top is then found from acceleration alone.
    pub min_top_rotation: f64,
    /// Downswing starts when the smoothed magnitude climbs this multiple
    /// above the transition minimum.
    pub downswing_rise_ratio: f64,
    /// Impact ends once raw magnitude drops below this share of the spike.
    pub impact_release_ratio: f64,
    pub impact_max_ms: u64,
    /// Follow-through ends when the smoothed magnitude decays below
    /// `baseline_noise * settle_factor`.
    pub settle_factor: f64,
    pub follow_through_max_ms: u64,
    /// A single phase running longer than this aborts the swing.
    pub max_phase_ms: u64,
    pub buffer_capacity: usize,
    pub buffer_retain: usize,
    /// Used until the user has a calibration.
    pub default_baseline_noise: f64,
    pub default_swing_threshold: f64,
    /// Hand-to-clubhead lever used for the clubhead speed estimate.
    pub clubhead_speed_factor: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 3,
            stability_window_ms: 300,
            rise_factor: 3.0,
            transition_drop_ratio: 0.6,
            min_top_rotation: 0.5,
            downswing_rise_ratio: 1.5,
            impact_release_ratio: 0.6,
            impact_max_ms: 80,
            settle_factor: 2.0,
            follow_through_max_ms: 1500,
            max_phase_ms: 2000,
            buffer_capacity: 1000,
            buffer_retain: 500,
            default_baseline_noise: 0.5,
            default_swing_threshold: 12.0,
            clubhead_speed_factor: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_valid_confidence: f64,
    pub max_valid_risk: f64,
    pub history_cap: usize,
    /// Only swings above this adjusted confidence enter the history.
    pub history_min_confidence: f64,
    pub consistency_window: usize,
    /// Local hours considered typical for golf, inclusive.
    pub typical_hours: (u8, u8),
    pub long_static_seconds: f64,
    /// Combined strength (0-1) above which a false-positive signature matches.
    pub false_positive_threshold: f64,
    pub min_signal_quality: f64,
    pub max_accel_variance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_valid_confidence: 60.0,
            max_valid_risk: 40.0,
            history_cap: 50,
            history_min_confidence: 30.0,
            consistency_window: 5,
            typical_hours: (6, 21),
            long_static_seconds: 3.0,
            false_positive_threshold: 0.6,
            min_signal_quality: 70.0,
            max_accel_variance: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub min_confirmed_swings: usize,
    pub initial_learning_rate: f64,
    pub learning_decay: f64,
    pub min_learning_rate: f64,
    pub stability_period: u64,
    pub initial_confidence_threshold: f64,
    pub max_confidence_threshold: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_confirmed_swings: 5,
            initial_learning_rate: 0.1,
            learning_decay: 0.95,
            min_learning_rate: 0.05,
            stability_period: 50,
            initial_confidence_threshold: 75.0,
            max_confidence_threshold: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub history_cap: usize,
    pub pattern_window_minutes: i64,
    pub severe_error_limit: usize,
    /// Percent of recent operations.
    pub error_rate_limit: f64,
    pub probe_timeout_ms: u64,
    /// Window used by health probes to compute their error rate.
    pub probe_window_minutes: i64,
    pub pattern_check_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_cap: 100,
            pattern_window_minutes: 60,
            severe_error_limit: 5,
            error_rate_limit: 20.0,
            probe_timeout_ms: 2000,
            probe_window_minutes: 5,
            pattern_check_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the JSON store. None = platform data dir.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Actor sections
// ---------------------------------------------------------------------------

/// A synthetic sensor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockSensorSection {
    #[serde(default)]
    pub name: String,
    /// Seconds between synthetic swings.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Emit handheld-style payloads instead of wearable ones.
    #[serde(default)]
    pub handheld: bool,
}

/// A mock round manager that cycles clubs after each swing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockRoundSection {
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Top-level persisted config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingSenseConfig {
    /// User whose calibration drives live ingestion.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mock_sensor: HashMap<String, MockSensorSection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mock_round: HashMap<String, MockRoundSection>,
}

impl Default for SwingSenseConfig {
    /// Known good defaults: engine tuning only, no mock actors.
    fn default() -> Self {
        Self {
            user_id: None,
            segmentation: SegmentationConfig::default(),
            validation: ValidationConfig::default(),
            calibration: CalibrationConfig::default(),
            monitor: MonitorConfig::default(),
            storage: StorageConfig::default(),
            mock_sensor: HashMap::new(),
            mock_round: HashMap::new(),
        }
    }
}
