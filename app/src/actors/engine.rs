//! Engine actor: owns the `SwingEngine` and runs the full pipeline on
//! every motion batch.
//!
//! Consumes `Motion` and `SwingFeedback` events. Publishes `SwingAnalyzed`
//! for each closed swing, `CalibrationUpdated` when feedback moves a
//! calibration, `Alert` for rejected input worth surfacing, and on a fixed
//! interval `ErrorPattern` / `Health` reports.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Timelike;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actors::{Actor, spawn_named};
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::engine::SwingEngine;
use crate::monitor::{ErrorContext, recovery_strategy, retry_with_backoff};
use crate::state::SystemState;
use crate::store::{KeyValueStore, StoreError, calibration_key, load_json};
use swingsense::{
    ActorState, ActorStatus, AlertLevel, AlertMessage, EngineEvent, EngineMessage, ErrorKind,
    RawMotionPayload, RecentActivity, RecoveryStrategy, RoundSnapshot, Severity,
    SwingAnalysisError, SwingCalibration, SwingFeedback, SwingMetrics, SwingSenseConfig,
    ValidationContext,
};

/// Analyzed swings remembered for later feedback.
const RECENT_SWINGS: usize = 32;
const IDLE_SLEEP: Duration = Duration::from_millis(10);

pub struct EngineActor {
    config: SwingSenseConfig,
    store: Arc<dyn KeyValueStore>,
    runtime: tokio::runtime::Handle,
}

impl EngineActor {
    pub fn new(
        config: SwingSenseConfig,
        store: Arc<dyn KeyValueStore>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            config,
            store,
            runtime,
        }
    }
}

impl Actor for EngineActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let runtime = self.runtime.clone();
        spawn_named(sender.actor_id().to_string(), move || {
            run(config, store, runtime, state, sender, receiver)
        });
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Bus-independent core of the actor: turns inbound events into outbound
/// messages.
pub struct EngineWorker {
    engine: SwingEngine,
    recent: VecDeque<(Uuid, SwingMetrics)>,
}

impl EngineWorker {
    pub fn new(engine: SwingEngine) -> Self {
        Self {
            engine,
            recent: VecDeque::with_capacity(RECENT_SWINGS),
        }
    }

    pub fn engine(&self) -> &SwingEngine {
        &self.engine
    }

    pub fn handle(&mut self, event: &EngineEvent, round: &RoundSnapshot) -> Vec<EngineMessage> {
        match event {
            EngineEvent::Motion(batch) => self.ingest_batch(&batch.samples, round),
            EngineEvent::SwingFeedback(feedback) => self.feedback(feedback),
            _ => Vec::new(),
        }
    }

    fn ingest_batch(
        &mut self,
        samples: &[RawMotionPayload],
        round: &RoundSnapshot,
    ) -> Vec<EngineMessage> {
        let mut out = Vec::new();
        for raw in samples {
            match self.engine.ingest_raw(*raw) {
                Ok(Some(swing)) => {
                    let context = validation_context(round, &swing);
                    let club = round.club.map(|c| c.club_type());
                    let analysis = self.engine.analyze(swing, &context, club);
                    self.remember(analysis.swing.id, analysis.swing.metrics);
                    out.push(EngineMessage::new(analysis));
                }
                Ok(None) => {}
                Err(e) => {
                    if let Some(alert) = alert_for(&e) {
                        out.push(EngineMessage::new(alert));
                    }
                }
            }
        }
        out
    }

    fn remember(&mut self, id: Uuid, metrics: SwingMetrics) {
        self.recent.push_back((id, metrics));
        while self.recent.len() > RECENT_SWINGS {
            self.recent.pop_front();
        }
    }

    fn feedback(&mut self, feedback: &SwingFeedback) -> Vec<EngineMessage> {
        let Some(metrics) = self
            .recent
            .iter()
            .find(|(id, _)| *id == feedback.swing_id)
            .map(|(_, m)| *m)
        else {
            warn!("engine: feedback for unknown swing {}", feedback.swing_id);
            return Vec::new();
        };
        match self.engine.adapt(&feedback.user_id, &metrics, feedback.correct) {
            Ok(Some(calibration)) => vec![EngineMessage::new(calibration)],
            Ok(None) => Vec::new(),
            Err(e) => alert_for(&e).map(EngineMessage::new).into_iter().collect(),
        }
    }

    /// Periodic housekeeping: error-pattern check and health report.
    pub fn tick(&self, runtime: &tokio::runtime::Handle) -> Vec<EngineMessage> {
        let mut out = Vec::new();
        if let Some(pattern) = self.engine.check_error_patterns() {
            out.push(EngineMessage::new(AlertMessage {
                level: AlertLevel::Warn,
                message: pattern.message.clone(),
            }));
            out.push(EngineMessage::new(pattern));
        }
        let report = runtime.block_on(self.engine.health_check());
        out.push(EngineMessage::new(report));
        out
    }
}

/// Validation context for a live swing: round state, local hour, and how
/// long the device sat still at address.
pub fn validation_context(
    round: &RoundSnapshot,
    swing: &swingsense::CompletedSwing,
) -> ValidationContext {
    let address_ms = swing
        .phase(swingsense::PhaseTag::Address)
        .map(|p| p.duration())
        .unwrap_or(0);
    ValidationContext {
        round_active: round.round_active,
        hour_of_day: chrono::Local::now().hour() as u8,
        activity: RecentActivity {
            static_seconds: address_ms as f64 / 1000.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Surface medium and worse input errors to the user.
fn alert_for(e: &SwingAnalysisError) -> Option<AlertMessage> {
    let level = match e.severity {
        Severity::Low => return None,
        Severity::Medium => AlertLevel::Warn,
        Severity::High | Severity::Critical => AlertLevel::Error,
    };
    Some(AlertMessage {
        level,
        message: e.user_message.clone(),
    })
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn telemetry(engine: &SwingEngine) -> HashMap<String, String> {
    let mut t = HashMap::from([("templates".into(), engine.templates().len().to_string())]);
    if let Some(user) = engine.user_id() {
        t.insert("user".into(), user.to_string());
        t.insert(
            "swing_threshold".into(),
            format!("{:.1}", engine.thresholds().swing_threshold),
        );
    }
    t
}

/// Load the bound user's calibration with retries before going live.
///
/// `SwingEngine::new` resolves thresholds from a single read; when that read
/// failed the engine is still on defaults, so a record recovered here is
/// installed and detection switches to it.
fn warm_up(
    engine: &mut SwingEngine,
    store: &Arc<dyn KeyValueStore>,
    runtime: &tokio::runtime::Handle,
    strategy: &RecoveryStrategy,
) -> Option<AlertMessage> {
    let user = engine.user_id()?.to_string();
    let key = calibration_key(&user);
    let loaded = runtime.block_on(retry_with_backoff(strategy, "engine: calibration load", || {
        let store = Arc::clone(store);
        let key = key.clone();
        async move { load_json::<SwingCalibration>(store.as_ref(), &key) }
    }));
    match loaded {
        Ok(Some(calibration)) => {
            if let Err(record) = engine.install_calibration(calibration) {
                return alert_for(&record);
            }
            info!(
                "engine: '{user}' calibrated, threshold {:.1}",
                engine.thresholds().swing_threshold
            );
            None
        }
        Ok(None) => {
            info!("engine: no calibration for '{user}', using default thresholds");
            None
        }
        Err(e) => {
            // Plain I/O failures on this path are reads, not writes.
            let kind = match &e {
                StoreError::Io { .. } if !e.is_storage_full() && !e.is_permission_denied() => {
                    Some(ErrorKind::StorageReadFailed)
                }
                _ => None,
            };
            let ctx = ErrorContext::new().with("operation", "warm_up").with("user", &user);
            let record = engine.handle_error(&e, ctx, kind);
            alert_for(&record)
        }
    }
}

fn run(
    config: SwingSenseConfig,
    store: Arc<dyn KeyValueStore>,
    runtime: tokio::runtime::Handle,
    state: Arc<SystemState>,
    sender: BusSender,
    mut receiver: BusReceiver,
) {
    let interval = Duration::from_secs(config.monitor.pattern_check_interval_secs.max(1));
    let mut engine = SwingEngine::new(config, Arc::clone(&store));
    let strategy = recovery_strategy(ErrorKind::StorageReadFailed);
    if let Some(alert) = warm_up(&mut engine, &store, &runtime, &strategy) {
        sender.send(EngineMessage::new(alert));
    }
    sender.send(EngineMessage::new(ActorState::new(
        ActorStatus::Running,
        telemetry(&engine),
    )));
    let mut worker = EngineWorker::new(engine);
    let mut last_tick = Instant::now();

    loop {
        let mut idle = true;
        loop {
            match receiver.poll() {
                Err(PollError::Shutdown) => {
                    sender.send(EngineMessage::new(ActorState::new(
                        ActorStatus::Stopped,
                        HashMap::new(),
                    )));
                    return;
                }
                Ok(None) => break,
                Ok(Some(msg)) => {
                    idle = false;
                    let round = state.round.snapshot();
                    for out in worker.handle(&msg.event, &round) {
                        sender.send(out);
                    }
                }
            }
        }

        if last_tick.elapsed() >= interval {
            last_tick = Instant::now();
            for out in worker.tick(&runtime) {
                sender.send(out);
            }
        }

        if idle {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutil::{FlakyStore, synthetic_swing};
    use swingsense::{Club, MotionBatch};

    fn worker() -> EngineWorker {
        let engine = SwingEngine::new(SwingSenseConfig::default(), Arc::new(MemoryStore::new()))
            .with_user("alice");
        EngineWorker::new(engine)
    }

    fn wearable(samples: &[swingsense::MotionSample]) -> EngineEvent {
        EngineEvent::Motion(MotionBatch {
            samples: samples
                .iter()
                .map(|s| RawMotionPayload::Wearable {
                    t: s.timestamp,
                    ax: s.accel[0],
                    ay: s.accel[1],
                    az: s.accel[2],
                    gx: s.gyro[0],
                    gy: s.gyro[1],
                    gz: s.gyro[2],
                })
                .collect(),
        })
    }

    fn round() -> RoundSnapshot {
        RoundSnapshot {
            round_active: true,
            club: Some(Club::Iron7),
            handedness: None,
        }
    }

    #[test]
    fn test_motion_batch_publishes_analysis() {
        let mut w = worker();
        let out = w.handle(&wearable(&synthetic_swing(0)), &round());
        let analyses: Vec<_> = out
            .iter()
            .filter_map(|m| match &m.event {
                EngineEvent::SwingAnalyzed(a) => Some(a),
                _ => None,
            })
            .collect();
        assert_eq!(analyses.len(), 1);
        let a = analyses[0];
        assert_eq!(a.swing.club, Some(swingsense::ClubType::Iron));
        assert!(a.matches.iter().all(|m| m.club == swingsense::ClubType::Iron));
        assert_eq!(a.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_feedback_updates_learning_data() {
        let mut w = worker();
        let out = w.handle(&wearable(&synthetic_swing(0)), &round());
        let swing_id = out
            .iter()
            .find_map(|m| match &m.event {
                EngineEvent::SwingAnalyzed(a) => Some(a.swing.id),
                _ => None,
            })
            .unwrap();

        // alice is not calibrated: learning data moves, no calibration event
        let feedback = EngineEvent::SwingFeedback(SwingFeedback {
            user_id: "alice".into(),
            swing_id,
            correct: true,
        });
        assert!(w.handle(&feedback, &round()).is_empty());
        let learning = w.engine().learning_data("alice");
        assert_eq!(learning.total_swings, 1);
        assert_eq!(learning.confirmed_swings, 1);

        let unknown = EngineEvent::SwingFeedback(SwingFeedback {
            user_id: "alice".into(),
            swing_id: Uuid::new_v4(),
            correct: false,
        });
        assert!(w.handle(&unknown, &round()).is_empty());
        assert_eq!(w.engine().learning_data("alice").total_swings, 1);
    }

    #[test]
    fn test_low_severity_rejections_are_not_alerted() {
        let mut w = worker();
        let samples = vec![
            swingsense::MotionSample::new(100, [0.1, 0.0, 0.0], [0.0; 3]),
            swingsense::MotionSample::new(50, [0.1, 0.0, 0.0], [0.0; 3]),
        ];
        assert!(w.handle(&wearable(&samples), &round()).is_empty());
        assert_eq!(w.engine().monitor().history_len(), 1);
    }

    #[test]
    fn test_alert_levels() {
        let disconnected = w_error(ErrorKind::SensorDisconnected);
        assert_eq!(alert_for(&disconnected).map(|a| a.level), Some(AlertLevel::Error));
        let timeout = w_error(ErrorKind::NetworkTimeout);
        assert_eq!(alert_for(&timeout).map(|a| a.level), Some(AlertLevel::Warn));
        assert!(alert_for(&w_error(ErrorKind::TimestampOrder)).is_none());
    }

    fn calibrated_store(min_speed: f64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut engine = SwingEngine::new(SwingSenseConfig::default(), store.clone());
        engine
            .start_calibration("bob", Default::default(), Default::default())
            .unwrap();
        for speed in [min_speed, min_speed + 1.0, min_speed + 2.0, min_speed + 3.0, min_speed + 4.0] {
            let metrics = SwingMetrics {
                max_speed: speed,
                ..Default::default()
            };
            engine
                .add_calibration_swing("bob", swingsense::CalibrationSwing::new(true, metrics, Vec::new()))
                .unwrap();
        }
        engine.complete_calibration("bob").unwrap().unwrap();
        store
    }

    fn fast_retry() -> RecoveryStrategy {
        RecoveryStrategy::Retry {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_warm_up_installs_calibration_after_failed_first_read() {
        let inner = calibrated_store(20.0);
        let store: Arc<dyn KeyValueStore> = Arc::new(FlakyStore::new(inner, 1));
        let config = SwingSenseConfig {
            user_id: Some("bob".into()),
            ..Default::default()
        };
        let mut engine = SwingEngine::new(config, Arc::clone(&store));
        // the constructor's read failed
        assert_eq!(engine.thresholds().swing_threshold, 12.0);

        let rt = tokio::runtime::Runtime::new().unwrap();
        assert!(warm_up(&mut engine, &store, rt.handle(), &fast_retry()).is_none());
        assert!((engine.thresholds().swing_threshold - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_alerts_when_reads_keep_failing() {
        let inner = calibrated_store(20.0);
        let store: Arc<dyn KeyValueStore> = Arc::new(FlakyStore::new(inner, 10));
        let mut engine = SwingEngine::new(SwingSenseConfig::default(), Arc::clone(&store))
            .with_user("bob");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let alert = warm_up(&mut engine, &store, rt.handle(), &fast_retry()).unwrap();
        assert_eq!(alert.level, AlertLevel::Error);
        assert_eq!(engine.thresholds().swing_threshold, 12.0);
        let history = engine.monitor().history();
        assert_eq!(history.last().unwrap().kind, ErrorKind::StorageReadFailed);
    }

    fn w_error(kind: ErrorKind) -> SwingAnalysisError {
        worker()
            .engine()
            .handle_error(&std::fmt::Error, ErrorContext::new(), Some(kind))
    }
}
