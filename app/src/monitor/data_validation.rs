//! Up-front input checks. Run before any computation; each check
//! short-circuits on the first violation.

use swingsense::{ErrorKind, MotionSample};

/// Minimum samples for a window to be analyzable.
pub const MIN_SAMPLES: usize = 50;
/// Any axis beyond this is treated as a corrupted reading (m/s²).
pub const MAX_AXIS_ACCEL: f64 = 50.0;

pub const CLUBHEAD_SPEED_RANGE: (f64, f64) = (20.0, 150.0);
pub const TEMPO_RANGE: (f64, f64) = (0.5, 10.0);
pub const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MotionDataError {
    #[error("no motion samples")]
    Empty,
    #[error("{count} samples, at least {required} required")]
    InsufficientSamples { count: usize, required: usize },
    #[error("sample {index} has a non-finite field")]
    NonFinite { index: usize },
    #[error("sample {index} is corrupted: {reason}")]
    Corrupted { index: usize, reason: String },
    #[error("sample {index} timestamp {current} does not follow {previous}")]
    TimestampOrder {
        index: usize,
        previous: u64,
        current: u64,
    },
}

impl MotionDataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty | Self::InsufficientSamples { .. } => ErrorKind::InsufficientData,
            Self::NonFinite { .. } => ErrorKind::InvalidMotionData,
            Self::Corrupted { .. } => ErrorKind::CorruptedData,
            Self::TimestampOrder { .. } => ErrorKind::TimestampOrder,
        }
    }

    /// Index of the offending sample, where there is one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::NonFinite { index }
            | Self::Corrupted { index, .. }
            | Self::TimestampOrder { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Check a motion window: non-empty, enough samples, finite, not corrupted,
/// strictly increasing timestamps. In that order.
pub fn validate_motion_data(samples: &[MotionSample]) -> Result<(), MotionDataError> {
    if samples.is_empty() {
        return Err(MotionDataError::Empty);
    }
    if samples.len() < MIN_SAMPLES {
        return Err(MotionDataError::InsufficientSamples {
            count: samples.len(),
            required: MIN_SAMPLES,
        });
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(MotionDataError::NonFinite { index });
    }
    for (index, s) in samples.iter().enumerate() {
        if let Some(axis) = s.accel.iter().position(|a| a.abs() > MAX_AXIS_ACCEL) {
            return Err(MotionDataError::Corrupted {
                index,
                reason: format!("axis {axis} reads {:.1} m/s²", s.accel[axis]),
            });
        }
        if s.is_all_zero() {
            return Err(MotionDataError::Corrupted {
                index,
                reason: "all-zero reading".into(),
            });
        }
    }
    for (index, pair) in samples.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(MotionDataError::TimestampOrder {
                index: index + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// Summary of an analyzed swing as reported by a client.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwingSummary {
    #[serde(default)]
    pub swing_id: Option<String>,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub clubhead_speed: Option<f64>, // mph
    #[serde(default)]
    pub tempo_seconds: Option<f64>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SummaryError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("confidence {confidence:.1} below minimum {minimum:.1}")]
    ConfidenceTooLow { confidence: f64, minimum: f64 },
    #[error("{field} {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl SummaryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) => ErrorKind::InvalidSwingSummary,
            Self::ConfidenceTooLow { .. } => ErrorKind::ConfidenceTooLow,
            Self::OutOfRange { .. } => ErrorKind::MetricOutOfRange,
        }
    }
}

fn in_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), SummaryError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SummaryError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Required fields, minimum confidence, then metric ranges.
pub fn validate_swing_summary(
    summary: &SwingSummary,
    min_confidence: f64,
) -> Result<(), SummaryError> {
    if summary.swing_id.as_deref().is_none_or(str::is_empty) {
        return Err(SummaryError::MissingField("swing_id"));
    }
    let confidence = summary
        .confidence
        .ok_or(SummaryError::MissingField("confidence"))?;
    let clubhead_speed = summary
        .clubhead_speed
        .ok_or(SummaryError::MissingField("clubhead_speed"))?;
    let tempo = summary
        .tempo_seconds
        .ok_or(SummaryError::MissingField("tempo_seconds"))?;

    if confidence < min_confidence {
        return Err(SummaryError::ConfidenceTooLow {
            confidence,
            minimum: min_confidence,
        });
    }

    in_range("clubhead_speed", clubhead_speed, CLUBHEAD_SPEED_RANGE)?;
    in_range("tempo_seconds", tempo, TEMPO_RANGE)?;
    in_range("confidence", confidence, PERCENT_RANGE)?;
    if let Some(balance) = summary.balance {
        in_range("balance", balance, PERCENT_RANGE)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::quiet_samples;

    #[test]
    fn test_rejects_fewer_than_fifty() {
        assert_eq!(validate_motion_data(&[]), Err(MotionDataError::Empty));
        assert_eq!(
            validate_motion_data(&quiet_samples(0, 49)),
            Err(MotionDataError::InsufficientSamples {
                count: 49,
                required: 50
            })
        );
        assert_eq!(validate_motion_data(&quiet_samples(0, 50)), Ok(()));
        assert_eq!(validate_motion_data(&quiet_samples(0, 500)), Ok(()));
    }

    #[test]
    fn test_timestamp_error_references_index() {
        for bad in [1, 17, 59] {
            let mut samples = quiet_samples(0, 60);
            samples[bad].timestamp = samples[bad - 1].timestamp;
            let err = validate_motion_data(&samples).unwrap_err();
            assert_eq!(err.index(), Some(bad));
            assert_eq!(err.kind(), ErrorKind::TimestampOrder);
        }
    }

    #[test]
    fn test_checks_run_in_order() {
        // non-finite reported before a later ordering problem
        let mut samples = quiet_samples(0, 60);
        samples[5].timestamp = 0;
        samples[30].gyro[2] = f64::INFINITY;
        assert_eq!(
            validate_motion_data(&samples),
            Err(MotionDataError::NonFinite { index: 30 })
        );
    }

    #[test]
    fn test_corrupted_readings() {
        let mut samples = quiet_samples(0, 60);
        samples[12].accel[2] = -51.0;
        assert!(matches!(
            validate_motion_data(&samples),
            Err(MotionDataError::Corrupted { index: 12, .. })
        ));

        let mut samples = quiet_samples(0, 60);
        samples[3] = MotionSample::new(samples[3].timestamp, [0.0; 3], [0.0; 3]);
        let err = validate_motion_data(&samples).unwrap_err();
        assert_eq!(err.index(), Some(3));
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    fn summary() -> SwingSummary {
        SwingSummary {
            swing_id: Some("s1".into()),
            club: Some("7I".into()),
            clubhead_speed: Some(85.0),
            tempo_seconds: Some(2.8),
            balance: Some(90.0),
            confidence: Some(80.0),
        }
    }

    #[test]
    fn test_summary_accepts_well_formed() {
        assert_eq!(validate_swing_summary(&summary(), 60.0), Ok(()));
    }

    #[test]
    fn test_summary_required_fields() {
        let mut s = summary();
        s.swing_id = None;
        assert_eq!(
            validate_swing_summary(&s, 60.0),
            Err(SummaryError::MissingField("swing_id"))
        );
        let mut s = summary();
        s.tempo_seconds = None;
        assert_eq!(
            validate_swing_summary(&s, 60.0),
            Err(SummaryError::MissingField("tempo_seconds"))
        );
    }

    #[test]
    fn test_summary_confidence_and_ranges() {
        assert!(matches!(
            validate_swing_summary(&summary(), 90.0),
            Err(SummaryError::ConfidenceTooLow { .. })
        ));
        let mut s = summary();
        s.clubhead_speed = Some(160.0);
        assert!(matches!(
            validate_swing_summary(&s, 60.0),
            Err(SummaryError::OutOfRange {
                field: "clubhead_speed",
                ..
            })
        ));
        let mut s = summary();
        s.balance = Some(120.0);
        assert_eq!(validate_swing_summary(&s, 60.0).unwrap_err().kind(), ErrorKind::MetricOutOfRange);
    }
}
