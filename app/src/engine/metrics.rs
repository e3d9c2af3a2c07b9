//! Detailed biomechanical features derived from samples, phases, and the
//! basic metric vector. Everything here is a pure function of its inputs.

use swingsense::{
    ConsistencyFeatures, DetailedSwingMetrics, MotionSample, PhaseDurations, PhaseSpeeds,
    PhaseTag, PowerFeatures, RotationFeatures, SwingMetrics, SwingPhase, find_phase, magnitude,
};

const FACE_ANGLE_LIMIT: f64 = 20.0;
const ATTACK_ANGLE_RANGE: (f64, f64) = (-10.0, 5.0);
const PATH_DEVIATION_RANGE: (f64, f64) = (0.0, 20.0);
const POWER_TRANSFER_FALLBACK: f64 = 50.0;

/// Integrated rotation (degrees) per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseRotation([f64; 6]);

impl PhaseRotation {
    pub fn get(&self, tag: PhaseTag) -> f64 {
        self.0[tag as usize]
    }
}

/// Integrate gyro magnitude over time, attributing each interval to the phase
/// containing its closing sample.
pub fn rotation_by_phase(samples: &[MotionSample], phases: &[SwingPhase]) -> PhaseRotation {
    let mut out = PhaseRotation::default();
    for pair in samples.windows(2) {
        let dt = (pair[1].timestamp.saturating_sub(pair[0].timestamp)) as f64 / 1000.0;
        if let Some(phase) = phases.iter().find(|p| p.contains(pair[1].timestamp)) {
            out.0[phase.tag as usize] += pair[1].gyro_magnitude() * dt;
        }
    }
    for v in out.0.iter_mut() {
        *v = v.to_degrees();
    }
    out
}

/// Derive the detailed metric set. Absent phases contribute zeros (or the
/// documented fallback) rather than failing.
pub fn compute_detailed(
    samples: &[MotionSample],
    phases: &[SwingPhase],
    basic: &SwingMetrics,
) -> DetailedSwingMetrics {
    let magnitudes: Vec<f64> = samples.iter().map(|s| s.accel_magnitude()).collect();

    let mut phase_durations = PhaseDurations::default();
    let mut phase_speeds = PhaseSpeeds::default();
    for &tag in PhaseTag::ALL {
        if let Some(phase) = find_phase(phases, tag) {
            phase_durations.set(tag, phase.duration());
            phase_speeds.set(tag, mean(phase_samples(samples, phase).map(|s| s.accel_magnitude())));
        }
    }

    DetailedSwingMetrics {
        basic: *basic,
        phase_durations,
        phase_speeds,
        consistency: ConsistencyFeatures {
            motion_smoothness: motion_smoothness(&magnitudes),
            path_deviation: path_deviation(samples, phases),
            rhythm_score: rhythm_score(phases),
        },
        power: PowerFeatures {
            power_transfer: power_transfer(samples, phases),
            peak_speed_timing: peak_speed_timing(&magnitudes),
            speed_acceleration: speed_acceleration(&magnitudes),
        },
        balance_score: balance_score(samples),
        rotation: RotationFeatures {
            axis_stability: axis_stability(samples),
            face_angle: face_angle(samples, phases),
            attack_angle: attack_angle(samples, phases),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn phase_samples<'a>(
    samples: &'a [MotionSample],
    phase: &'a SwingPhase,
) -> impl Iterator<Item = &'a MotionSample> + 'a {
    samples.iter().filter(move |s| phase.contains(s.timestamp))
}

fn samples_in<'a>(
    samples: &'a [MotionSample],
    phases: &[SwingPhase],
    tags: &[PhaseTag],
) -> Vec<&'a MotionSample> {
    let windows: Vec<&SwingPhase> = tags.iter().filter_map(|t| find_phase(phases, *t)).collect();
    samples
        .iter()
        .filter(|s| windows.iter().any(|p| p.contains(s.timestamp)))
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn deltas(magnitudes: &[f64]) -> impl Iterator<Item = f64> + '_ {
    magnitudes.windows(2).map(|w| (w[1] - w[0]).abs())
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

/// Index of the peak magnitude as a percentage of the sample count.
pub fn peak_speed_timing(magnitudes: &[f64]) -> f64 {
    let Some((index, _)) = magnitudes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    else {
        return 0.0;
    };
    100.0 * index as f64 / magnitudes.len() as f64
}

/// Largest frame-to-frame magnitude change.
pub fn speed_acceleration(magnitudes: &[f64]) -> f64 {
    deltas(magnitudes).fold(0.0, f64::max)
}

fn phase_energy(samples: &[MotionSample], phase: &SwingPhase) -> f64 {
    phase_samples(samples, phase)
        .map(|s| 0.5 * s.accel_magnitude().powi(2))
        .sum()
}

/// Impact energy relative to backswing energy, capped at 100.
pub fn power_transfer(samples: &[MotionSample], phases: &[SwingPhase]) -> f64 {
    let (Some(backswing), Some(impact)) = (
        find_phase(phases, PhaseTag::Backswing),
        find_phase(phases, PhaseTag::Impact),
    ) else {
        return POWER_TRANSFER_FALLBACK;
    };
    let backswing_energy = phase_energy(samples, backswing);
    if backswing_energy <= 0.0 {
        return POWER_TRANSFER_FALLBACK;
    }
    (100.0 * phase_energy(samples, impact) / backswing_energy).min(100.0)
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

pub fn motion_smoothness(magnitudes: &[f64]) -> f64 {
    if magnitudes.len() < 2 {
        return 100.0;
    }
    (100.0 - 10.0 * mean(deltas(magnitudes))).clamp(0.0, 100.0)
}

/// Lateral (y-axis) acceleration variance through the delivery.
pub fn path_deviation(samples: &[MotionSample], phases: &[SwingPhase]) -> f64 {
    let lateral: Vec<f64> = samples_in(samples, phases, &[PhaseTag::Downswing, PhaseTag::Impact])
        .iter()
        .map(|s| s.accel[1])
        .collect();
    if lateral.len() < 2 {
        return 0.0;
    }
    let m = mean(lateral.iter().copied());
    let variance = mean(lateral.iter().map(|v| (v - m).powi(2)));
    variance.clamp(PATH_DEVIATION_RANGE.0, PATH_DEVIATION_RANGE.1)
}

/// Uniformity of the present phase durations.
pub fn rhythm_score(phases: &[SwingPhase]) -> f64 {
    let durations: Vec<f64> = phases
        .iter()
        .map(|p| p.duration() as f64)
        .filter(|d| *d > 0.0)
        .collect();
    if durations.is_empty() {
        return 0.0;
    }
    let m = mean(durations.iter().copied());
    let spread = mean(durations.iter().map(|d| (d - m).abs()));
    (100.0 - 100.0 * spread / m).clamp(0.0, 100.0)
}

pub fn balance_score(samples: &[MotionSample]) -> f64 {
    if samples.is_empty() {
        return 100.0;
    }
    let n = samples.len() as f64;
    let centroid = samples.iter().fold([0.0; 3], |acc, s| {
        [acc[0] + s.accel[0] / n, acc[1] + s.accel[1] / n, acc[2] + s.accel[2] / n]
    });
    let spread = mean(samples.iter().map(|s| {
        magnitude(&[
            s.accel[0] - centroid[0],
            s.accel[1] - centroid[1],
            s.accel[2] - centroid[2],
        ])
    }));
    (100.0 - 5.0 * spread).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// How tightly the rotation axis holds: unit gyro directions compared to
/// their mean direction.
pub fn axis_stability(samples: &[MotionSample]) -> f64 {
    let directions: Vec<[f64; 3]> = samples
        .iter()
        .filter_map(|s| {
            let m = s.gyro_magnitude();
            (m > 1e-6).then(|| [s.gyro[0] / m, s.gyro[1] / m, s.gyro[2] / m])
        })
        .collect();
    if directions.is_empty() {
        return 100.0;
    }
    let n = directions.len() as f64;
    let centroid = directions.iter().fold([0.0; 3], |acc, d| {
        [acc[0] + d[0] / n, acc[1] + d[1] / n, acc[2] + d[2] / n]
    });
    let spread = mean(directions.iter().map(|d| {
        magnitude(&[d[0] - centroid[0], d[1] - centroid[1], d[2] - centroid[2]])
    }));
    (100.0 - 50.0 * spread).clamp(0.0, 100.0)
}

/// Change in roll rate (gyro z) across the impact window.
pub fn face_angle(samples: &[MotionSample], phases: &[SwingPhase]) -> f64 {
    let window = samples_in(samples, phases, &[PhaseTag::Impact]);
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => (last.gyro[2] - first.gyro[2])
            .to_degrees()
            .clamp(-FACE_ANGLE_LIMIT, FACE_ANGLE_LIMIT),
        _ => 0.0,
    }
}

/// Change in pitch rate (gyro x) across the downswing.
pub fn attack_angle(samples: &[MotionSample], phases: &[SwingPhase]) -> f64 {
    let window = samples_in(samples, phases, &[PhaseTag::Downswing]);
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => (last.gyro[0] - first.gyro[0])
            .to_degrees()
            .clamp(ATTACK_ANGLE_RANGE.0, ATTACK_ANGLE_RANGE.1),
        _ => 0.0,
    }
}
