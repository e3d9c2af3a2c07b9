//! Motion samples and the per-source raw payloads they are resolved from.
//!
//! The engine only ever sees `MotionSample`. Producers (wearable band,
//! handheld phone) send a `RawMotionPayload` whose variant fixes the field
//! set and units; `into_sample()` converts to engine units before ingest.

use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²), used to convert handheld readings reported in g.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// A single accelerometer + gyroscope reading.
///
/// Acceleration is linear (gravity removed) in m/s²; rotation rate is rad/s.
/// Timestamps are monotonic milliseconds and must strictly increase within a
/// contiguous stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub timestamp: u64, // ms
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

impl MotionSample {
    pub fn new(timestamp: u64, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            timestamp,
            accel,
            gyro,
        }
    }

    pub fn accel_magnitude(&self) -> f64 {
        magnitude(&self.accel)
    }

    pub fn gyro_magnitude(&self) -> f64 {
        magnitude(&self.gyro)
    }

    /// True when every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        self.accel.iter().chain(self.gyro.iter()).all(|v| v.is_finite())
    }

    /// Exact all-zero reading on both sensors (stuck sensor signature).
    pub fn is_all_zero(&self) -> bool {
        self.accel.iter().chain(self.gyro.iter()).all(|v| *v == 0.0)
    }
}

/// Euclidean norm of a 3-vector.
pub fn magnitude(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

// ---------------------------------------------------------------------------
// Raw payloads
// ---------------------------------------------------------------------------

/// Rotation rate as reported by handheld motion APIs (deg/s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationRate {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Acceleration triple in g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationG {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Source-tagged raw reading. Serializes with a `source` discriminator:
///
/// ```json
/// {"source":"wearable","t":120,"ax":0.1,"ay":0.0,"az":0.2,"gx":0.0,"gy":0.1,"gz":0.0}
/// {"source":"handheld","timestamp":120,"user_acceleration":{"x":0.01,"y":0,"z":0.02},
///  "rotation_rate":{"alpha":0,"beta":5.7,"gamma":0}}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawMotionPayload {
    /// Wrist-worn sensor: SI units, flat field set.
    Wearable {
        t: u64,
        ax: f64,
        ay: f64,
        az: f64,
        gx: f64,
        gy: f64,
        gz: f64,
    },
    /// Phone held or clipped to the club: g and deg/s.
    Handheld {
        timestamp: u64,
        user_acceleration: AccelerationG,
        rotation_rate: RotationRate,
    },
}

impl RawMotionPayload {
    /// Resolve to engine units (m/s², rad/s).
    pub fn into_sample(self) -> MotionSample {
        match self {
            Self::Wearable {
                t,
                ax,
                ay,
                az,
                gx,
                gy,
                gz,
            } => MotionSample::new(t, [ax, ay, az], [gx, gy, gz]),
            Self::Handheld {
                timestamp,
                user_acceleration: a,
                rotation_rate: r,
            } => MotionSample::new(
                timestamp,
                [
                    a.x * STANDARD_GRAVITY,
                    a.y * STANDARD_GRAVITY,
                    a.z * STANDARD_GRAVITY,
                ],
                [
                    r.alpha.to_radians(),
                    r.beta.to_radians(),
                    r.gamma.to_radians(),
                ],
            ),
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            Self::Wearable { .. } => "wearable",
            Self::Handheld { .. } => "handheld",
        }
    }
}

impl From<RawMotionPayload> for MotionSample {
    fn from(raw: RawMotionPayload) -> Self {
        raw.into_sample()
    }
}
