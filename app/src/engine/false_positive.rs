//! Library of non-swing motion signatures (walking, car door, practice swing,
//! putting) and the scorer that compares a detected swing window to them.

use swingsense::{AccelerationPattern, FalsePositivePattern, MetricRange, MotionSample};

const DURATION_WEIGHT: f64 = 0.3;
const ACCELERATION_WEIGHT: f64 = 0.4;
const FREQUENCY_WEIGHT: f64 = 0.3;
/// A periodic signature needs at least this many crossings to look periodic.
const MIN_PERIODIC_CROSSINGS: usize = 4;

/// A signature that matched a swing window.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatch {
    pub name: String,
    /// Combined 0-1 strength.
    pub strength: f64,
    /// Confidence points to remove: base penalty scaled by strength.
    pub penalty: f64,
}

/// Envelope features of a motion window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFeatures {
    pub duration_ms: f64,
    pub peak: f64,
    pub crest_factor: f64,
    pub frequency_hz: f64,
    pub zero_crossings: usize,
}

impl WindowFeatures {
    pub fn from_samples(samples: &[MotionSample]) -> Option<Self> {
        let (first, last) = (samples.first()?, samples.last()?);
        let magnitudes: Vec<f64> = samples.iter().map(|s| s.accel_magnitude()).collect();
        let mean = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;
        let peak = magnitudes.iter().copied().fold(0.0, f64::max);
        let duration_ms = (last.timestamp - first.timestamp) as f64;

        let zero_crossings = magnitudes
            .windows(2)
            .filter(|w| (w[0] - mean).signum() != (w[1] - mean).signum())
            .count();
        let frequency_hz = if duration_ms > 0.0 {
            (zero_crossings as f64 / 2.0) / (duration_ms / 1000.0)
        } else {
            0.0
        };

        Some(Self {
            duration_ms,
            peak,
            crest_factor: if mean > 0.0 { peak / mean } else { 0.0 },
            frequency_hz,
            zero_crossings,
        })
    }
}

/// 1 inside the range, falling to 0 one range width outside it.
pub fn range_fit(value: f64, range: &MetricRange) -> f64 {
    if range.contains(value) {
        return 1.0;
    }
    let width = range.width();
    if width <= 0.0 {
        return 0.0;
    }
    let excess = if value < range.min {
        range.min - value
    } else {
        value - range.max
    };
    (1.0 - excess / width).max(0.0)
}

pub struct FalsePositiveLibrary {
    patterns: Vec<FalsePositivePattern>,
    /// Combined strength above which a signature counts as matched.
    threshold: f64,
}

impl FalsePositiveLibrary {
    pub fn builtin(threshold: f64) -> Self {
        Self {
            patterns: vec![walking(), car_door(), practice_swing(), putting()],
            threshold,
        }
    }

    pub fn patterns(&self) -> &[FalsePositivePattern] {
        &self.patterns
    }

    /// Combined strength of one signature against a window.
    pub fn strength(pattern: &FalsePositivePattern, features: &WindowFeatures) -> f64 {
        let duration = range_fit(features.duration_ms, &pattern.duration_ms);
        let acceleration = 0.5 * range_fit(features.peak, &pattern.acceleration.peak)
            + 0.5 * range_fit(features.crest_factor, &pattern.acceleration.crest_factor);
        let mut frequency = range_fit(features.frequency_hz, &pattern.frequency_hz);
        if pattern.periodic && features.zero_crossings < MIN_PERIODIC_CROSSINGS {
            frequency *= 0.5;
        }
        DURATION_WEIGHT * duration + ACCELERATION_WEIGHT * acceleration + FREQUENCY_WEIGHT * frequency
    }

    /// Signatures that match above the threshold, strongest first.
    pub fn evaluate(&self, samples: &[MotionSample]) -> Vec<SignatureMatch> {
        let Some(features) = WindowFeatures::from_samples(samples) else {
            return Vec::new();
        };
        let mut matches: Vec<SignatureMatch> = self
            .patterns
            .iter()
            .filter_map(|p| {
                let strength = Self::strength(p, &features);
                (strength > self.threshold).then(|| SignatureMatch {
                    name: p.name.clone(),
                    strength,
                    penalty: p.confidence_penalty * strength,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        matches
    }
}

fn signature(
    name: &str,
    duration_ms: (f64, f64),
    peak: (f64, f64),
    crest_factor: (f64, f64),
    frequency_hz: (f64, f64),
    periodic: bool,
    confidence_penalty: f64,
) -> FalsePositivePattern {
    FalsePositivePattern {
        name: name.into(),
        duration_ms: MetricRange::new(duration_ms.0, duration_ms.1),
        acceleration: AccelerationPattern {
            peak: MetricRange::new(peak.0, peak.1),
            crest_factor: MetricRange::new(crest_factor.0, crest_factor.1),
        },
        frequency_hz: MetricRange::new(frequency_hz.0, frequency_hz.1),
        periodic,
        confidence_penalty,
    }
}

fn walking() -> FalsePositivePattern {
    signature("walking", (1000.0, 10000.0), (2.0, 8.0), (1.2, 2.5), (1.5, 2.5), true, 30.0)
}

fn car_door() -> FalsePositivePattern {
    signature("car_door", (100.0, 800.0), (15.0, 60.0), (4.0, 20.0), (0.0, 3.0), false, 40.0)
}

fn practice_swing() -> FalsePositivePattern {
    signature("practice_swing", (800.0, 2500.0), (6.0, 14.0), (2.0, 5.0), (0.3, 2.0), false, 20.0)
}

fn putting() -> FalsePositivePattern {
    signature("putting", (600.0, 2000.0), (0.5, 4.0), (1.5, 4.0), (0.3, 2.0), false, 25.0)
}
