//! Motion ingest and phase segmentation.
//!
//! A per-sample state machine over the smoothed acceleration magnitude:
//!
//! ```text
//! Idle --quiet for stability window--> Address --rise--> Backswing
//!   --drop below share of peak--> Transition --climb off minimum--> Downswing
//!   --raw spike >= swing threshold--> Impact --release--> FollowThrough
//!   --settle--> (swing closed, back to Idle)
//! ```
//!
//! Thresholds scale with the user's calibrated baseline noise and swing
//! threshold; the ratios around them come from `SegmentationConfig`.

use std::collections::VecDeque;

use tracing::{debug, info};
use uuid::Uuid;

use super::metrics::rotation_by_phase;
use crate::monitor::MotionDataError;
use swingsense::{
    CompletedSwing, PhaseTag, SegmentationConfig, SwingCalibration, SwingMetrics, SwingPhase,
    find_phase,
};

const MPS_TO_MPH: f64 = 2.23694;

/// Calibrated detection thresholds in effect for the current stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    pub baseline_noise: f64,
    pub swing_threshold: f64,
}

impl DetectionThresholds {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            baseline_noise: config.default_baseline_noise,
            swing_threshold: config.default_swing_threshold,
        }
    }

    /// Thresholds from a calibration, falling back to config defaults.
    pub fn resolve(calibration: Option<&SwingCalibration>, config: &SegmentationConfig) -> Self {
        match calibration {
            Some(c) => Self {
                baseline_noise: c.baseline_noise,
                swing_threshold: c.swing_threshold,
            },
            None => Self::from_config(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Idle,
    Address,
    Backswing,
    Transition,
    Downswing,
    Impact,
    FollowThrough,
}

#[derive(Debug, Clone, Copy)]
struct OpenPhase {
    tag: PhaseTag,
    start: u64,
    peak: f64,
}

/// Streaming segmenter. Owns a bounded buffer of recent samples.
pub struct PhaseSegmenter {
    config: SegmentationConfig,
    buffer: VecDeque<swingsense::MotionSample>,
    window: VecDeque<f64>,
    spin_window: VecDeque<f64>,
    state: SegmentState,
    /// Samples accepted since creation; used to report offending indices.
    accepted: usize,
    last_timestamp: Option<u64>,
    quiet_since: Option<u64>,
    phases: Vec<SwingPhase>,
    open: Option<OpenPhase>,
    backswing_peak: f64,
    /// Peak smoothed rotation rate seen during the backswing.
    backswing_spin: f64,
    transition_min: f64,
}

impl PhaseSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.buffer_capacity),
            window: VecDeque::with_capacity(config.smoothing_window.max(1)),
            spin_window: VecDeque::with_capacity(config.smoothing_window.max(1)),
            config,
            state: SegmentState::Idle,
            accepted: 0,
            last_timestamp: None,
            quiet_since: None,
            phases: Vec::new(),
            open: None,
            backswing_peak: 0.0,
            backswing_spin: 0.0,
            transition_min: f64::INFINITY,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn samples_seen(&self) -> usize {
        self.accepted
    }

    /// True while a swing is in progress (past address).
    pub fn in_swing(&self) -> bool {
        !matches!(self.state, SegmentState::Idle | SegmentState::Address)
    }

    /// Feed one sample. Returns the completed swing when this sample closes
    /// the follow-through. Non-finite and out-of-order samples are rejected
    /// without touching segmenter state.
    pub fn ingest(
        &mut self,
        sample: swingsense::MotionSample,
        thresholds: DetectionThresholds,
    ) -> Result<Option<CompletedSwing>, MotionDataError> {
        let index = self.accepted;
        if !sample.is_finite() {
            return Err(MotionDataError::NonFinite { index });
        }
        if let Some(prev) = self.last_timestamp
            && sample.timestamp <= prev
        {
            return Err(MotionDataError::TimestampOrder {
                index,
                previous: prev,
                current: sample.timestamp,
            });
        }

        self.accepted += 1;
        self.last_timestamp = Some(sample.timestamp);
        self.push_buffer(sample);

        let raw = sample.accel_magnitude();
        let width = self.config.smoothing_window.max(1);
        let smooth = moving_mean(&mut self.window, raw, width);
        let spin = moving_mean(&mut self.spin_window, sample.gyro_magnitude(), width);
        Ok(self.step(sample.timestamp, raw, smooth, spin, thresholds))
    }

    /// Drop any in-progress swing and buffered samples.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.window.clear();
        self.spin_window.clear();
        self.abandon();
        self.quiet_since = None;
    }

    fn push_buffer(&mut self, sample: swingsense::MotionSample) {
        self.buffer.push_back(sample);
        let capacity = self.config.buffer_capacity.max(1);
        if self.buffer.len() > capacity {
            // Retain never exceeds capacity, so the subtraction cannot underflow.
            let retain = self.config.buffer_retain.min(capacity);
            let excess = self.buffer.len() - retain;
            self.buffer.drain(..excess);
            debug!("segmenter: buffer full, trimmed {excess} samples");
        }
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    fn step(
        &mut self,
        t: u64,
        raw: f64,
        smooth: f64,
        spin: f64,
        th: DetectionThresholds,
    ) -> Option<CompletedSwing> {
        let rise = th.baseline_noise * self.config.rise_factor;

        match self.state {
            SegmentState::Idle => {
                if smooth < th.baseline_noise {
                    let since = *self.quiet_since.get_or_insert(t);
                    if t - since >= self.config.stability_window_ms {
                        self.enter(SegmentState::Address, PhaseTag::Address, since);
                    }
                } else {
                    self.quiet_since = None;
                }
            }
            SegmentState::Address => {
                if smooth > rise {
                    self.close_open(t);
                    self.enter(SegmentState::Backswing, PhaseTag::Backswing, t);
                    self.backswing_peak = smooth;
                    self.backswing_spin = spin;
                } else if let Some(open) = self.open.as_mut() {
                    // Keep address bounded while the player stands still.
                    open.start = open.start.max(t.saturating_sub(self.config.max_phase_ms));
                }
            }
            SegmentState::Backswing => {
                self.backswing_peak = self.backswing_peak.max(smooth);
                self.backswing_spin = self.backswing_spin.max(spin);
                let drop = self.config.transition_drop_ratio;
                // The top is where the club stops turning, not only where
                // acceleration dips.
                let rotation_slowed = self.backswing_spin < self.config.min_top_rotation
                    || spin <= self.backswing_spin * drop;
                if smooth < self.backswing_peak * drop && rotation_slowed {
                    self.close_open(t);
                    self.enter(SegmentState::Transition, PhaseTag::Transition, t);
                    self.transition_min = smooth;
                } else if raw >= th.swing_threshold {
                    // No visible pause at the top: straight into the downswing.
                    self.close_open(t);
                    self.enter(SegmentState::Downswing, PhaseTag::Downswing, t);
                }
            }
            SegmentState::Transition => {
                self.transition_min = self.transition_min.min(smooth);
                let trigger = (self.transition_min * self.config.downswing_rise_ratio).max(rise);
                if smooth > trigger {
                    self.close_open(t);
                    self.enter(SegmentState::Downswing, PhaseTag::Downswing, t);
                } else if smooth < th.baseline_noise {
                    debug!("segmenter: motion died out at the top, not a swing");
                    self.abandon();
                }
            }
            SegmentState::Downswing => {
                if raw >= th.swing_threshold {
                    self.close_open(t);
                    self.enter(SegmentState::Impact, PhaseTag::Impact, t);
                } else if smooth < rise {
                    debug!("segmenter: downswing faded without impact");
                    self.abandon();
                }
            }
            SegmentState::Impact => {
                let peak = self.open.map(|o| o.peak).unwrap_or(raw);
                let elapsed = t - self.open.map(|o| o.start).unwrap_or(t);
                if raw < peak * self.config.impact_release_ratio
                    || elapsed >= self.config.impact_max_ms
                {
                    self.close_open(t);
                    self.enter(SegmentState::FollowThrough, PhaseTag::FollowThrough, t);
                }
            }
            SegmentState::FollowThrough => {
                let elapsed = t - self.open.map(|o| o.start).unwrap_or(t);
                if smooth < th.baseline_noise * self.config.settle_factor
                    || elapsed >= self.config.follow_through_max_ms
                {
                    self.close_open(t);
                    return Some(self.finish(th));
                }
            }
        }

        if let Some(open) = self.open.as_mut() {
            open.peak = open.peak.max(raw);
            if matches!(
                self.state,
                SegmentState::Backswing | SegmentState::Transition | SegmentState::Downswing
            ) && t - open.start > self.config.max_phase_ms
            {
                debug!("segmenter: {} exceeded {}ms, abandoning", open.tag, self.config.max_phase_ms);
                self.abandon();
            }
        }
        None
    }

    fn enter(&mut self, state: SegmentState, tag: PhaseTag, start: u64) {
        debug!("segmenter: {:?} -> {:?} at {start}ms", self.state, state);
        self.state = state;
        self.open = Some(OpenPhase {
            tag,
            start,
            peak: 0.0,
        });
    }

    fn close_open(&mut self, end: u64) {
        if let Some(open) = self.open.take() {
            self.phases
                .push(SwingPhase::new(open.tag, open.start, end, open.peak));
        }
    }

    fn abandon(&mut self) {
        self.state = SegmentState::Idle;
        self.open = None;
        self.phases.clear();
        self.backswing_peak = 0.0;
        self.backswing_spin = 0.0;
        self.transition_min = f64::INFINITY;
        self.quiet_since = None;
    }

    fn finish(&mut self, th: DetectionThresholds) -> CompletedSwing {
        let phases = std::mem::take(&mut self.phases);
        let start = phases.first().map(|p| p.start).unwrap_or(0);
        let end = phases.last().map(|p| p.end).unwrap_or(0);
        let samples: Vec<_> = self
            .buffer
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp < end)
            .copied()
            .collect();

        let metrics = basic_metrics(&samples, &phases, &self.config);
        let confidence = detection_confidence(metrics.max_speed, th.swing_threshold);
        info!(
            "swing closed: {}ms, peak {:.1}m/s², tempo {:.2}, confidence {:.0}",
            end - start,
            metrics.max_speed,
            metrics.swing_tempo,
            confidence,
        );

        self.abandon();
        CompletedSwing {
            id: Uuid::new_v4(),
            phases,
            samples,
            metrics,
            confidence,
            club: None,
        }
    }
}

fn moving_mean(window: &mut VecDeque<f64>, value: f64, width: usize) -> f64 {
    window.push_back(value);
    while window.len() > width {
        window.pop_front();
    }
    window.iter().sum::<f64>() / window.len() as f64
}

// ---------------------------------------------------------------------------
// Basic metrics
// ---------------------------------------------------------------------------

/// Confidence that a closed swing is real, from how far the peak cleared
/// the swing threshold: 50 at the threshold, 100 at twice it.
pub fn detection_confidence(peak: f64, swing_threshold: f64) -> f64 {
    if swing_threshold <= 0.0 {
        return 50.0;
    }
    (50.0 + 50.0 * (peak - swing_threshold) / swing_threshold).clamp(0.0, 100.0)
}

/// Basic metrics from phase boundaries and the samples inside them.
pub fn basic_metrics(
    samples: &[swingsense::MotionSample],
    phases: &[SwingPhase],
    config: &SegmentationConfig,
) -> SwingMetrics {
    let duration = |tag| find_phase(phases, tag).map(|p| p.duration()).unwrap_or(0);

    let max_speed = samples
        .iter()
        .map(|s| s.accel_magnitude())
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))))
        .unwrap_or_else(|| {
            phases
                .iter()
                .map(|p| p.peak_acceleration)
                .fold(0.0, f64::max)
        });

    let backswing = duration(PhaseTag::Backswing);
    let downswing = duration(PhaseTag::Downswing);
    let swing_tempo = if downswing > 0 {
        backswing as f64 / downswing as f64
    } else {
        0.0
    };

    let impact_timing = match (
        find_phase(phases, PhaseTag::Downswing),
        find_phase(phases, PhaseTag::Impact),
    ) {
        (Some(d), Some(i)) => i.start.saturating_sub(d.start) as f64,
        _ => 0.0,
    };

    let rotation = rotation_by_phase(samples, phases);

    // Plane of the mean downswing acceleration vector, from horizontal.
    let downswing_samples: Vec<_> = match find_phase(phases, PhaseTag::Downswing) {
        Some(p) => samples.iter().filter(|s| p.contains(s.timestamp)).collect(),
        None => Vec::new(),
    };
    let swing_plane = if downswing_samples.is_empty() {
        0.0
    } else {
        let n = downswing_samples.len() as f64;
        let mean = downswing_samples.iter().fold([0.0; 3], |acc, s| {
            [acc[0] + s.accel[0], acc[1] + s.accel[1], acc[2] + s.accel[2]]
        });
        let (x, y, z) = (mean[0] / n, mean[1] / n, mean[2] / n);
        z.abs().atan2(x.hypot(y)).to_degrees()
    };

    // Integrated hand speed through downswing and impact, levered out to the
    // clubhead.
    let mut hand_speed = 0.0;
    for pair in samples.windows(2) {
        let in_delivery = phases.iter().any(|p| {
            matches!(p.tag, PhaseTag::Downswing | PhaseTag::Impact) && p.contains(pair[1].timestamp)
        });
        if in_delivery {
            let dt = (pair[1].timestamp - pair[0].timestamp) as f64 / 1000.0;
            hand_speed += pair[1].accel_magnitude() * dt;
        }
    }
    let clubhead_speed = hand_speed * config.clubhead_speed_factor * MPS_TO_MPH;

    SwingMetrics {
        max_speed,
        backswing_angle: rotation.get(PhaseTag::Backswing),
        downswing_angle: rotation.get(PhaseTag::Downswing),
        impact_timing,
        follow_through_angle: rotation.get(PhaseTag::FollowThrough),
        swing_tempo,
        swing_plane,
        clubhead_speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{quiet_samples, synthetic_swing};
    use swingsense::MotionSample;

    fn defaults() -> (PhaseSegmenter, DetectionThresholds) {
        let config = SegmentationConfig::default();
        let th = DetectionThresholds::from_config(&config);
        (PhaseSegmenter::new(config), th)
    }

    fn run(seg: &mut PhaseSegmenter, th: DetectionThresholds, samples: &[MotionSample]) -> Vec<CompletedSwing> {
        samples
            .iter()
            .filter_map(|s| seg.ingest(*s, th).expect("well-formed stream"))
            .collect()
    }

    #[test]
    fn test_synthetic_swing_is_segmented_in_order() {
        let (mut seg, th) = defaults();
        let swings = run(&mut seg, th, &synthetic_swing(0));
        assert_eq!(swings.len(), 1);

        let tags: Vec<_> = swings[0].phases.iter().map(|p| p.tag).collect();
        assert_eq!(
            tags,
            vec![
                PhaseTag::Address,
                PhaseTag::Backswing,
                PhaseTag::Transition,
                PhaseTag::Downswing,
                PhaseTag::Impact,
                PhaseTag::FollowThrough,
            ]
        );
        for pair in swings[0].phases.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "phases must be contiguous");
        }
    }

    #[test]
    fn test_impact_is_the_spike() {
        let (mut seg, th) = defaults();
        let swing = run(&mut seg, th, &synthetic_swing(0)).remove(0);
        let impact = swing.phase(PhaseTag::Impact).unwrap();
        assert_eq!(impact.start, 1550);
        assert_eq!(impact.end, 1580);
        assert!((impact.peak_acceleration - 20.0).abs() < 1e-9);
        assert!((swing.metrics.max_speed - 20.0).abs() < 1e-9);
        assert!(swing.metrics.swing_tempo > 0.0);
        assert!(swing.confidence > 80.0);
    }

    fn transition_start(samples: &[MotionSample]) -> u64 {
        let (mut seg, th) = defaults();
        let swing = run(&mut seg, th, samples).remove(0);
        swing.phase(PhaseTag::Transition).unwrap().start
    }

    #[test]
    fn test_transition_waits_for_rotation_to_slow() {
        let accel_led = transition_start(&synthetic_swing(0));
        assert!(accel_led < 1250, "{accel_led}");

        // Acceleration dips at the usual place but the club keeps turning
        // at full rate until 1250ms.
        let mut still_turning = synthetic_swing(0);
        for s in still_turning.iter_mut().filter(|s| (600..1300).contains(&s.timestamp)) {
            s.gyro = if s.timestamp < 1250 { [0.0, 3.0, 0.0] } else { [0.0, 0.3, 0.0] };
        }
        let start = transition_start(&still_turning);
        assert!(start >= 1250, "{start}");
    }

    #[test]
    fn test_accel_only_stream_still_finds_the_top() {
        let mut no_gyro = synthetic_swing(0);
        for s in &mut no_gyro {
            s.gyro = [0.0; 3];
        }
        assert!(transition_start(&no_gyro) < 1250);
    }

    #[test]
    fn test_quiet_stream_never_closes_a_swing() {
        let (mut seg, th) = defaults();
        assert!(run(&mut seg, th, &quiet_samples(0, 400)).is_empty());
        assert!(!seg.in_swing());
    }

    #[test]
    fn test_out_of_order_sample_is_rejected_with_index() {
        let (mut seg, th) = defaults();
        seg.ingest(MotionSample::new(100, [0.1, 0.0, 0.0], [0.0; 3]), th)
            .unwrap();
        seg.ingest(MotionSample::new(110, [0.1, 0.0, 0.0], [0.0; 3]), th)
            .unwrap();
        let err = seg
            .ingest(MotionSample::new(110, [0.1, 0.0, 0.0], [0.0; 3]), th)
            .unwrap_err();
        assert_eq!(
            err,
            MotionDataError::TimestampOrder {
                index: 2,
                previous: 110,
                current: 110
            }
        );
        // rejected sample is not counted
        assert_eq!(seg.samples_seen(), 2);
    }

    #[test]
    fn test_non_finite_sample_is_rejected() {
        let (mut seg, th) = defaults();
        let err = seg
            .ingest(MotionSample::new(0, [f64::NAN, 0.0, 0.0], [0.0; 3]), th)
            .unwrap_err();
        assert_eq!(err, MotionDataError::NonFinite { index: 0 });
    }

    #[test]
    fn test_buffer_overflow_retains_most_recent() {
        let (mut seg, th) = defaults();
        run(&mut seg, th, &quiet_samples(0, 1001));
        assert_eq!(seg.buffered(), 500);
        run(&mut seg, th, &quiet_samples(1001 * 10, 10));
        assert_eq!(seg.buffered(), 510);
    }

    #[test]
    fn test_retain_larger_than_capacity_is_clamped() {
        let config = SegmentationConfig {
            buffer_capacity: 100,
            buffer_retain: 200,
            ..SegmentationConfig::default()
        };
        let th = DetectionThresholds::from_config(&config);
        let mut seg = PhaseSegmenter::new(config);
        run(&mut seg, th, &quiet_samples(0, 101));
        assert_eq!(seg.buffered(), 100);
        run(&mut seg, th, &quiet_samples(101 * 10, 50));
        assert_eq!(seg.buffered(), 100);
    }

    #[test]
    fn test_zero_capacity_keeps_one_sample() {
        let config = SegmentationConfig {
            buffer_capacity: 0,
            buffer_retain: 0,
            ..SegmentationConfig::default()
        };
        let th = DetectionThresholds::from_config(&config);
        let mut seg = PhaseSegmenter::new(config);
        run(&mut seg, th, &quiet_samples(0, 5));
        assert!(seg.buffered() <= 1);
    }

    #[test]
    fn test_calibrated_threshold_suppresses_weak_swing() {
        let (mut seg, _) = defaults();
        // Spike of 20 never reaches a 25 m/s² threshold, so the downswing
        // fades without an impact.
        let strict = DetectionThresholds {
            baseline_noise: 0.5,
            swing_threshold: 25.0,
        };
        assert!(run(&mut seg, strict, &synthetic_swing(0)).is_empty());
    }

    #[test]
    fn test_tempo_from_phase_boundaries() {
        let phases = vec![
            SwingPhase::new(PhaseTag::Address, 0, 400, 0.2),
            SwingPhase::new(PhaseTag::Backswing, 400, 1100, 6.0),
            SwingPhase::new(PhaseTag::Downswing, 1100, 1350, 16.0),
            SwingPhase::new(PhaseTag::Impact, 1350, 1390, 14.0),
            SwingPhase::new(PhaseTag::FollowThrough, 1390, 1990, 8.0),
        ];
        let m = basic_metrics(&[], &phases, &SegmentationConfig::default());
        assert!((m.swing_tempo - 2.8).abs() < 1e-9);
        assert!((m.impact_timing - 250.0).abs() < 1e-9);
        assert!((m.max_speed - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_detection_confidence_scale() {
        assert_eq!(detection_confidence(12.0, 12.0), 50.0);
        assert_eq!(detection_confidence(24.0, 12.0), 100.0);
        assert_eq!(detection_confidence(0.0, 12.0), 0.0);
    }
}
