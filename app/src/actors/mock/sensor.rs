//! Mock sensor: streams still readings at 100 Hz and drops a synthetic
//! swing into the stream on a fixed interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{next_rand, now_seed};
use crate::actors::{Actor, spawn_named};
use crate::bus::{BusReceiver, BusSender};
use crate::state::SystemState;
use swingsense::{
    AccelerationG, ActorState, ActorStatus, EngineMessage, MockSensorSection, MotionBatch,
    RawMotionPayload, RotationRate, STANDARD_GRAVITY,
};

const DEFAULT_INTERVAL_SECS: u64 = 10;
const STEP_MS: u64 = 10;
const BATCH_LEN: usize = 10;
/// Length of one synthetic swing, address to settle.
const SWING_MS: u64 = 2600;
const QUIET_LEVEL: f64 = 0.1;
/// Peak-to-peak noise added to every reading (m/s²).
const NOISE: f64 = 0.2;

/// Acceleration magnitude `t` ms into a synthetic swing, peak scaled by
/// `scale`.
///
/// 600ms still, a 700ms backswing arc, a 250ms ramp into a 30ms impact
/// spike at 1550, an exponential decay, then still again.
pub(crate) fn swing_magnitude(t: u64, scale: f64) -> f64 {
    let tf = t as f64;
    let shaped = match t {
        600..1300 => 2.0 + 4.0 * (std::f64::consts::PI * (tf - 600.0) / 700.0).sin(),
        1300..1550 => 2.0 + 9.5 * (tf - 1300.0) / 250.0,
        1550..1580 => 20.0,
        1580..2200 => 8.0 * (-(tf - 1580.0) / 120.0).exp(),
        _ => return QUIET_LEVEL,
    };
    shaped * scale
}

/// Gyro reading (rad/s) matching `swing_magnitude`.
pub(crate) fn swing_rotation(t: u64, magnitude: f64) -> [f64; 3] {
    if (600..2200).contains(&t) {
        let twist = if (1550..1580).contains(&t) { 0.2 } else { 0.0 };
        [0.05 * magnitude, 0.3 * magnitude, twist]
    } else {
        [0.0, 0.0, 0.01]
    }
}

/// Deterministic stream generator behind the actor.
pub(crate) struct SwingSynth {
    interval_ms: u64,
    handheld: bool,
    seed: u64,
    clock: u64,
    next_swing: u64,
    swing_start: Option<u64>,
    scale: f64,
    swings: u64,
}

impl SwingSynth {
    pub(crate) fn new(interval: Duration, handheld: bool, seed: u64) -> Self {
        let interval_ms = (interval.as_millis() as u64).max(SWING_MS);
        Self {
            interval_ms,
            handheld,
            seed,
            clock: 0,
            next_swing: interval_ms,
            swing_start: None,
            scale: 1.0,
            swings: 0,
        }
    }

    pub(crate) fn swings(&self) -> u64 {
        self.swings
    }

    fn noise(&mut self) -> f64 {
        let r = (next_rand(&mut self.seed) % 1000) as f64 / 1000.0;
        (r - 0.5) * NOISE
    }

    fn next_reading(&mut self) -> RawMotionPayload {
        let t = self.clock;
        self.clock += STEP_MS;

        if self.swing_start.is_none() && t >= self.next_swing {
            self.swing_start = Some(t);
            self.swings += 1;
            // Vary each swing's power between roughly 85% and 115%.
            self.scale = 1.0 + 0.15 * (self.swings as f64 * 0.7).sin();
        }

        let (magnitude, gyro) = match self.swing_start {
            Some(start) if t - start < SWING_MS => {
                let offset = t - start;
                let magnitude = swing_magnitude(offset, self.scale);
                (magnitude, swing_rotation(offset, magnitude))
            }
            Some(_) => {
                self.swing_start = None;
                self.next_swing = t + self.interval_ms;
                (QUIET_LEVEL, [0.0, 0.0, 0.01])
            }
            None => (QUIET_LEVEL, [0.0, 0.0, 0.01]),
        };
        let magnitude = (magnitude + self.noise()).max(0.0);
        let accel = [magnitude * 0.8, magnitude * 0.6, 0.0];

        if self.handheld {
            RawMotionPayload::Handheld {
                timestamp: t,
                user_acceleration: AccelerationG {
                    x: accel[0] / STANDARD_GRAVITY,
                    y: accel[1] / STANDARD_GRAVITY,
                    z: accel[2] / STANDARD_GRAVITY,
                },
                rotation_rate: RotationRate {
                    alpha: gyro[0].to_degrees(),
                    beta: gyro[1].to_degrees(),
                    gamma: gyro[2].to_degrees(),
                },
            }
        } else {
            RawMotionPayload::Wearable {
                t,
                ax: accel[0],
                ay: accel[1],
                az: accel[2],
                gx: gyro[0],
                gy: gyro[1],
                gz: gyro[2],
            }
        }
    }

    /// Next 100ms of readings.
    pub(crate) fn next_batch(&mut self) -> MotionBatch {
        MotionBatch {
            samples: (0..BATCH_LEN).map(|_| self.next_reading()).collect(),
        }
    }
}

/// Mock sensor actor.
pub struct MockSensorActor {
    interval: Duration,
    handheld: bool,
}

impl MockSensorActor {
    pub fn from_section(section: &MockSensorSection) -> Self {
        Self {
            interval: Duration::from_secs(section.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)),
            handheld: section.handheld,
        }
    }
}

impl Actor for MockSensorActor {
    fn start(&self, _state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let synth = SwingSynth::new(self.interval, self.handheld, now_seed());
        spawn_named(format!("mock:{}", sender.actor_id()), move || {
            run(synth, sender, receiver)
        });
    }
}

fn emit_status(sender: &BusSender, status: ActorStatus, swings: u64) {
    let telemetry = HashMap::from([("swings".to_string(), swings.to_string())]);
    sender.send(EngineMessage::new(ActorState::new(status, telemetry)));
}

fn run(mut synth: SwingSynth, sender: BusSender, receiver: BusReceiver) {
    let name = sender.actor_id().to_string();
    tracing::info!("mock_sensor '{name}': streaming, swing every {}ms", synth.interval_ms);
    emit_status(&sender, ActorStatus::Running, 0);

    let mut reported = 0;
    while !receiver.is_shutdown() {
        sender.send(EngineMessage::new(synth.next_batch()));
        if synth.swings() != reported {
            reported = synth.swings();
            tracing::debug!("mock_sensor '{name}': swing #{reported}");
            emit_status(&sender, ActorStatus::Running, reported);
        }
        std::thread::sleep(Duration::from_millis(STEP_MS * BATCH_LEN as u64));
    }

    emit_status(&sender, ActorStatus::Stopped, synth.swings());
    tracing::info!("mock_sensor '{name}': stopped");
}
