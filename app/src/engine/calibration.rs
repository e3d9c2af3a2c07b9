//! Calibration sessions and continuous threshold adaptation.
//!
//! Calibrations and learning data are cached per user in memory and backed
//! by the injected `KeyValueStore`. Writes are fire-and-forget: a failed
//! save is logged and the in-memory value stays authoritative.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{
    KeyValueStore, StoreError, calibration_key, learning_key, load_json, save_json,
};
use swingsense::{
    AdaptiveLearningData, CalibrationConfig, CalibrationSession, CalibrationSwing, ClubType,
    DeviceSnapshot, EnvironmentSnapshot, Handedness, MetricRange, MotionSample,
    PersonalizedRanges, SessionStatus, SwingCalibration, SwingMetrics,
};

const DEFAULT_BASELINE_NOISE: f64 = 0.5;
const THRESHOLD_SHARE_OF_MIN_SPEED: f64 = 0.8;
const SPEED_MARGIN: f64 = 0.2;
const ANGLE_MARGIN: f64 = 0.1;
const TEMPO_MARGIN: f64 = 0.2;
const TIMING_MARGIN: f64 = 0.1;
const CONFIDENCE_STEP: f64 = 2.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CalibrationError {
    #[error("user '{0}' already has an active calibration session")]
    SessionActive(String),
    #[error("user '{0}' has no active calibration session")]
    NoActiveSession(String),
    #[error("stored record '{key}' could not be read: {reason}")]
    Unreadable { key: String, reason: String },
    #[error("calibration state lock poisoned")]
    Poisoned,
}

impl CalibrationError {
    pub fn kind(&self) -> swingsense::ErrorKind {
        match self {
            Self::SessionActive(_) => swingsense::ErrorKind::SessionConflict,
            Self::NoActiveSession(_) => swingsense::ErrorKind::CalibrationRequired,
            Self::Unreadable { .. } => swingsense::ErrorKind::StorageReadFailed,
            Self::Poisoned => swingsense::ErrorKind::Unknown,
        }
    }

    fn unreadable(key: String, e: StoreError) -> Self {
        Self::Unreadable {
            key,
            reason: e.to_string(),
        }
    }
}

type SessionHandle = Arc<Mutex<CalibrationSession>>;

/// Per-user calibration state.
///
/// Lock order: user lock, then `sessions`, then a session's own mutex.
/// Every read-modify-write of a user's calibration or learning data runs
/// under that user's lock.
pub struct CalibrationManager {
    config: CalibrationConfig,
    store: Arc<dyn KeyValueStore>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    calibrations: RwLock<HashMap<String, SwingCalibration>>,
    learning: RwLock<HashMap<String, AdaptiveLearningData>>,
}

impl CalibrationManager {
    pub fn new(config: CalibrationConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            store,
            user_locks: Mutex::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            calibrations: RwLock::new(HashMap::new()),
            learning: RwLock::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>, CalibrationError> {
        let mut locks = self.user_locks.lock().map_err(|_| CalibrationError::Poisoned)?;
        Ok(Arc::clone(locks.entry(user_id.to_string()).or_default()))
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub fn start_session(
        &self,
        user_id: &str,
        environment: EnvironmentSnapshot,
        device: DeviceSnapshot,
    ) -> Result<Uuid, CalibrationError> {
        let mut sessions = self.sessions.write().map_err(|_| CalibrationError::Poisoned)?;
        if sessions.contains_key(user_id) {
            return Err(CalibrationError::SessionActive(user_id.to_string()));
        }
        let session = CalibrationSession::new(user_id, environment, device);
        let id = session.id;
        sessions.insert(user_id.to_string(), Arc::new(Mutex::new(session)));
        info!("calibration: session {id} started for '{user_id}'");
        Ok(id)
    }

    fn session(&self, user_id: &str) -> Result<SessionHandle, CalibrationError> {
        let sessions = self.sessions.read().map_err(|_| CalibrationError::Poisoned)?;
        sessions
            .get(user_id)
            .cloned()
            .ok_or_else(|| CalibrationError::NoActiveSession(user_id.to_string()))
    }

    /// Record a swing in the active session. Returns the confirmed count.
    pub fn add_swing(
        &self,
        user_id: &str,
        swing: CalibrationSwing,
    ) -> Result<usize, CalibrationError> {
        let handle = self.session(user_id)?;
        let mut session = handle.lock().map_err(|_| CalibrationError::Poisoned)?;
        // The handle may have been completed or cancelled after we fetched it.
        if session.status != SessionStatus::Active {
            return Err(CalibrationError::NoActiveSession(user_id.to_string()));
        }
        debug!(
            "calibration: '{user_id}' swing {} (confirmed={})",
            swing.id, swing.confirmed
        );
        session.swings.push(swing);
        Ok(session.confirmed_count())
    }

    pub fn active_session(&self, user_id: &str) -> Option<CalibrationSession> {
        let handle = self.session(user_id).ok()?;
        let session = handle.lock().ok()?;
        Some(session.clone())
    }

    /// Derive a calibration from the active session. With too few confirmed
    /// swings returns `Ok(None)` and the session stays active.
    pub fn complete_session(
        &self,
        user_id: &str,
    ) -> Result<Option<SwingCalibration>, CalibrationError> {
        let user_lock = self.user_lock(user_id)?;
        let _user = user_lock.lock().map_err(|_| CalibrationError::Poisoned)?;

        // Held until the session is gone from the map, so no caller can
        // fetch a handle to a completed session.
        let mut sessions = self.sessions.write().map_err(|_| CalibrationError::Poisoned)?;
        let handle = sessions
            .get(user_id)
            .cloned()
            .ok_or_else(|| CalibrationError::NoActiveSession(user_id.to_string()))?;
        let calibration = {
            let mut session = handle.lock().map_err(|_| CalibrationError::Poisoned)?;
            if session.status != SessionStatus::Active {
                return Err(CalibrationError::NoActiveSession(user_id.to_string()));
            }
            let confirmed = session.confirmed_count();
            if confirmed < self.config.min_confirmed_swings {
                info!(
                    "calibration: '{user_id}' has {confirmed}/{} confirmed swings, not completing",
                    self.config.min_confirmed_swings
                );
                return Ok(None);
            }
            let Some(calibration) = derive_calibration(&session, self.config.initial_confidence_threshold)
            else {
                return Ok(None);
            };
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
            calibration
        };
        sessions.remove(user_id);
        drop(sessions);

        self.calibrations
            .write()
            .map_err(|_| CalibrationError::Poisoned)?
            .insert(user_id.to_string(), calibration.clone());
        self.persist(&calibration_key(user_id), &calibration);
        info!(
            "calibration: '{user_id}' calibrated, threshold {:.2}, noise {:.2}, {}",
            calibration.swing_threshold, calibration.baseline_noise, calibration.handedness
        );
        Ok(Some(calibration))
    }

    pub fn cancel_session(&self, user_id: &str) -> Result<CalibrationSession, CalibrationError> {
        let handle = self
            .sessions
            .write()
            .map_err(|_| CalibrationError::Poisoned)?
            .remove(user_id)
            .ok_or_else(|| CalibrationError::NoActiveSession(user_id.to_string()))?;
        let mut session = handle.lock().map_err(|_| CalibrationError::Poisoned)?;
        session.status = SessionStatus::Cancelled;
        session.ended_at = Some(Utc::now());
        info!("calibration: session {} cancelled for '{user_id}'", session.id);
        Ok(session.clone())
    }

    // -----------------------------------------------------------------------
    // Cached records
    // -----------------------------------------------------------------------

    /// Cached calibration, loading from the store on first access. An
    /// unreadable record is an error, never a missing one.
    fn load_calibration(&self, user_id: &str) -> Result<Option<SwingCalibration>, CalibrationError> {
        if let Some(c) = self
            .calibrations
            .read()
            .map_err(|_| CalibrationError::Poisoned)?
            .get(user_id)
        {
            return Ok(Some(c.clone()));
        }
        let key = calibration_key(user_id);
        let loaded = load_json::<SwingCalibration>(self.store.as_ref(), &key)
            .map_err(|e| CalibrationError::unreadable(key, e))?;
        if let Some(c) = &loaded {
            self.calibrations
                .write()
                .map_err(|_| CalibrationError::Poisoned)?
                .insert(user_id.to_string(), c.clone());
        }
        Ok(loaded)
    }

    /// Learning data from the cache or the store. Fresh data is seeded only
    /// when no record exists.
    fn load_learning(&self, user_id: &str) -> Result<AdaptiveLearningData, CalibrationError> {
        if let Some(d) = self
            .learning
            .read()
            .map_err(|_| CalibrationError::Poisoned)?
            .get(user_id)
        {
            return Ok(d.clone());
        }
        let key = learning_key(user_id);
        let loaded = load_json::<AdaptiveLearningData>(self.store.as_ref(), &key)
            .map_err(|e| CalibrationError::unreadable(key, e))?;
        Ok(loaded.unwrap_or_else(|| {
            AdaptiveLearningData::new(
                user_id,
                self.config.initial_learning_rate,
                self.config.stability_period,
            )
        }))
    }

    pub fn calibration(&self, user_id: &str) -> Option<SwingCalibration> {
        self.load_calibration(user_id).unwrap_or_else(|e| {
            warn!("calibration: load for '{user_id}' failed: {e}");
            None
        })
    }

    /// Put a calibration read elsewhere (e.g. a retried load) into the
    /// cache without writing it back.
    pub fn install(&self, calibration: SwingCalibration) -> Result<(), CalibrationError> {
        let user_lock = self.user_lock(&calibration.user_id)?;
        let _user = user_lock.lock().map_err(|_| CalibrationError::Poisoned)?;
        self.calibrations
            .write()
            .map_err(|_| CalibrationError::Poisoned)?
            .insert(calibration.user_id.clone(), calibration);
        Ok(())
    }

    /// Read-only view; an unreadable record shows as fresh data.
    pub fn learning_data(&self, user_id: &str) -> AdaptiveLearningData {
        self.load_learning(user_id).unwrap_or_else(|e| {
            warn!("calibration: learning data for '{user_id}' unreadable: {e}");
            AdaptiveLearningData::new(
                user_id,
                self.config.initial_learning_rate,
                self.config.stability_period,
            )
        })
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = save_json(self.store.as_ref(), key, value) {
            warn!("calibration: failed to persist '{key}': {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Adaptation
    // -----------------------------------------------------------------------

    /// Fold one classified swing into the user's learning data and, if the
    /// user is calibrated, nudge their thresholds. Returns the updated
    /// calibration.
    ///
    /// Both records are read before either is changed; if one cannot be
    /// read nothing is written and the error is returned.
    pub fn adapt(
        &self,
        user_id: &str,
        metrics: &SwingMetrics,
        was_correct: bool,
    ) -> Result<Option<SwingCalibration>, CalibrationError> {
        let user_lock = self.user_lock(user_id)?;
        let _user = user_lock.lock().map_err(|_| CalibrationError::Poisoned)?;

        let mut learning = self.load_learning(user_id)?;
        let calibration = self.load_calibration(user_id)?;
        let alpha = learning.learning_rate;

        learning.total_swings += 1;
        if was_correct {
            learning.confirmed_swings += 1;
        } else {
            learning.false_positive_swings += 1;
        }
        learning.accuracy = 100.0 * learning.confirmed_swings as f64 / learning.total_swings as f64;
        if learning.total_swings > learning.stability_period {
            learning.learning_rate =
                (learning.learning_rate * self.config.learning_decay).max(self.config.min_learning_rate);
        }
        learning.updated_at = Utc::now();
        self.persist(&learning_key(user_id), &learning);
        self.learning
            .write()
            .map_err(|_| CalibrationError::Poisoned)?
            .insert(user_id.to_string(), learning);

        let Some(mut calibration) = calibration else {
            return Ok(None);
        };
        if was_correct {
            let target = THRESHOLD_SHARE_OF_MIN_SPEED * metrics.max_speed;
            calibration.swing_threshold += alpha * (target - calibration.swing_threshold);
            calibration.ranges.max_speed = nudge_range(calibration.ranges.max_speed, metrics.max_speed, alpha);
        } else {
            calibration.swing_threshold *= 1.0 + 0.1 * alpha;
            calibration.confidence_threshold = (calibration.confidence_threshold + CONFIDENCE_STEP)
                .min(self.config.max_confidence_threshold);
        }
        calibration.updated_at = Utc::now();
        debug!(
            "calibration: '{user_id}' adapted (correct={was_correct}, alpha={alpha:.3}), threshold {:.2}",
            calibration.swing_threshold
        );

        self.calibrations
            .write()
            .map_err(|_| CalibrationError::Poisoned)?
            .insert(user_id.to_string(), calibration.clone());
        self.persist(&calibration_key(user_id), &calibration);
        Ok(Some(calibration))
    }
}

/// Move the nearer bound toward an observation outside the range.
fn nudge_range(range: MetricRange, observed: f64, alpha: f64) -> MetricRange {
    if observed < range.min {
        MetricRange::new(range.min + alpha * (observed - range.min), range.max)
    } else if observed > range.max {
        MetricRange::new(range.min, range.max + alpha * (observed - range.max))
    } else {
        range
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

fn derive_calibration(session: &CalibrationSession, confidence_threshold: f64) -> Option<SwingCalibration> {
    let confirmed: Vec<&CalibrationSwing> = session.confirmed().collect();
    let min_speed = confirmed
        .iter()
        .map(|s| s.metrics.max_speed)
        .min_by(f64::total_cmp)?;

    let noise_samples: Vec<f64> = session
        .unconfirmed()
        .flat_map(|s| s.samples.iter().map(MotionSample::accel_magnitude))
        .collect();
    let baseline_noise = percentile(noise_samples, 0.95).unwrap_or(DEFAULT_BASELINE_NOISE);

    let now = Utc::now();
    Some(SwingCalibration {
        user_id: session.user_id.clone(),
        baseline_noise,
        swing_threshold: THRESHOLD_SHARE_OF_MIN_SPEED * min_speed,
        handedness: handedness(&confirmed),
        dominant_club: dominant_club(&confirmed),
        ranges: PersonalizedRanges {
            max_speed: widened(&confirmed, |m| m.max_speed, SPEED_MARGIN),
            clubhead_speed: widened(&confirmed, |m| m.clubhead_speed, SPEED_MARGIN),
            backswing_angle: widened(&confirmed, |m| m.backswing_angle, ANGLE_MARGIN),
            downswing_angle: widened(&confirmed, |m| m.downswing_angle, ANGLE_MARGIN),
            swing_tempo: widened(&confirmed, |m| m.swing_tempo, TEMPO_MARGIN),
            impact_timing: widened(&confirmed, |m| m.impact_timing, TIMING_MARGIN),
        },
        confidence_threshold,
        calibrated_at: now,
        updated_at: now,
        session_id: Some(session.id),
    })
}

/// Nearest-rank percentile.
pub fn percentile(mut values: Vec<f64>, p: f64) -> Option<f64> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let rank = (p * values.len() as f64).ceil() as usize;
    Some(values[rank.clamp(1, values.len()) - 1])
}

fn handedness(swings: &[&CalibrationSwing]) -> Handedness {
    let (mut right, mut left) = (0, 0);
    for swing in swings.iter().filter(|s| !s.samples.is_empty()) {
        let mean_y =
            swing.samples.iter().map(|s| s.gyro[1]).sum::<f64>() / swing.samples.len() as f64;
        if mean_y > 0.0 {
            right += 1;
        } else if mean_y < 0.0 {
            left += 1;
        }
    }
    if left > right {
        Handedness::Left
    } else {
        Handedness::Right
    }
}

fn dominant_club(swings: &[&CalibrationSwing]) -> Option<ClubType> {
    let mut counts: HashMap<ClubType, usize> = HashMap::new();
    for club in swings.iter().filter_map(|s| s.club) {
        *counts.entry(club).or_default() += 1;
    }
    // ties broken toward the longer club for a stable result
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(club, _)| club)
}

fn widened(
    swings: &[&CalibrationSwing],
    metric: impl Fn(&SwingMetrics) -> f64,
    margin: f64,
) -> MetricRange {
    let (lo, hi) = swings
        .iter()
        .map(|s| metric(&s.metrics))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return MetricRange::new(0.0, 0.0);
    }
    MetricRange::new(lo - margin * lo.abs(), hi + margin * hi.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutil::FlakyStore;

    fn manager() -> (CalibrationManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            CalibrationManager::new(CalibrationConfig::default(), store.clone()),
            store,
        )
    }

    fn metrics(max_speed: f64) -> SwingMetrics {
        SwingMetrics {
            max_speed,
            backswing_angle: 240.0,
            downswing_angle: 200.0,
            impact_timing: 250.0,
            follow_through_angle: 180.0,
            swing_tempo: 2.8,
            swing_plane: 55.0,
            clubhead_speed: 85.0,
        }
    }

    fn confirmed(max_speed: f64, gyro_y: f64) -> CalibrationSwing {
        let samples = (0..5)
            .map(|i| MotionSample::new(i * 10, [max_speed, 0.0, 0.0], [0.0, gyro_y, 0.0]))
            .collect();
        CalibrationSwing::new(true, metrics(max_speed), samples)
    }

    fn start(m: &CalibrationManager, user: &str) {
        m.start_session(user, EnvironmentSnapshot::default(), DeviceSnapshot::default())
            .unwrap();
    }

    fn calibrate(m: &CalibrationManager, user: &str) -> SwingCalibration {
        start(m, user);
        for speed in [14.0, 15.0, 16.0, 17.0, 18.0] {
            m.add_swing(user, confirmed(speed, 1.0)).unwrap();
        }
        m.complete_session(user).unwrap().unwrap()
    }

    #[test]
    fn test_one_active_session_per_user() {
        let (m, _) = manager();
        start(&m, "alice");
        let err = m
            .start_session("alice", EnvironmentSnapshot::default(), DeviceSnapshot::default())
            .unwrap_err();
        assert_eq!(err, CalibrationError::SessionActive("alice".into()));
        start(&m, "bob");
    }

    #[test]
    fn test_complete_requires_five_confirmed() {
        let (m, _) = manager();
        start(&m, "alice");
        for speed in [14.0, 15.0, 16.0, 17.0] {
            m.add_swing("alice", confirmed(speed, 1.0)).unwrap();
        }
        m.add_swing("alice", CalibrationSwing::new(false, metrics(3.0), Vec::new()))
            .unwrap();
        assert_eq!(m.complete_session("alice").unwrap(), None);
        // still active, can keep adding
        assert_eq!(m.add_swing("alice", confirmed(18.0, 1.0)).unwrap(), 5);
        assert!(m.complete_session("alice").unwrap().is_some());
        assert!(m.active_session("alice").is_none());
    }

    #[test]
    fn test_threshold_is_share_of_slowest_confirmed() {
        let (m, store) = manager();
        let c = calibrate(&m, "alice");
        assert!((c.swing_threshold - 0.8 * 14.0).abs() < 1e-9);
        assert_eq!(c.baseline_noise, DEFAULT_BASELINE_NOISE);
        assert_eq!(c.confidence_threshold, 75.0);
        assert_eq!(c.handedness, Handedness::Right);
        assert!((c.ranges.max_speed.min - 14.0 * 0.8).abs() < 1e-9);
        assert!((c.ranges.max_speed.max - 18.0 * 1.2).abs() < 1e-9);
        assert!((c.ranges.backswing_angle.max - 264.0).abs() < 1e-9);
        for r in c.ranges.all() {
            assert!(r.min <= r.max);
        }
        assert!(store.get(&calibration_key("alice")).unwrap().is_some());
    }

    #[test]
    fn test_baseline_noise_from_unconfirmed_p95() {
        let (m, _) = manager();
        start(&m, "alice");
        let noise: Vec<_> = (1..=20)
            .map(|i| MotionSample::new(i * 10, [i as f64 * 0.1, 0.0, 0.0], [0.0; 3]))
            .collect();
        m.add_swing("alice", CalibrationSwing::new(false, metrics(2.0), noise))
            .unwrap();
        for speed in [14.0, 15.0, 16.0, 17.0, 18.0] {
            m.add_swing("alice", confirmed(speed, -1.0)).unwrap();
        }
        let c = m.complete_session("alice").unwrap().unwrap();
        // 95th of 0.1..2.0 nearest rank = 19th value
        assert!((c.baseline_noise - 1.9).abs() < 1e-9);
        assert_eq!(c.handedness, Handedness::Left);
    }

    #[test]
    fn test_dominant_club_is_mode() {
        let (m, _) = manager();
        start(&m, "alice");
        let clubs = [ClubType::Iron, ClubType::Iron, ClubType::Driver, ClubType::Iron, ClubType::Wedge];
        for club in clubs {
            m.add_swing("alice", confirmed(15.0, 1.0).with_club(club)).unwrap();
        }
        let c = m.complete_session("alice").unwrap().unwrap();
        assert_eq!(c.dominant_club, Some(ClubType::Iron));
    }

    #[test]
    fn test_cancel_discards_session() {
        let (m, store) = manager();
        start(&m, "alice");
        m.add_swing("alice", confirmed(15.0, 1.0)).unwrap();
        let cancelled = m.cancel_session("alice").unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(cancelled.ended_at.is_some());
        assert_eq!(
            m.complete_session("alice").unwrap_err(),
            CalibrationError::NoActiveSession("alice".into())
        );
        assert!(store.get(&calibration_key("alice")).unwrap().is_none());
    }

    #[test]
    fn test_false_positive_adaptation_is_monotonic_and_capped() {
        let (m, _) = manager();
        let mut last = calibrate(&m, "alice");
        for _ in 0..30 {
            let next = m.adapt("alice", &metrics(15.0), false).unwrap().unwrap();
            assert!(next.swing_threshold >= last.swing_threshold);
            assert!(next.confidence_threshold >= last.confidence_threshold);
            assert!(next.confidence_threshold <= 95.0);
            last = next;
        }
        assert_eq!(last.confidence_threshold, 95.0);
        let learning = m.learning_data("alice");
        assert_eq!(learning.false_positive_swings, 30);
        assert_eq!(learning.accuracy, 0.0);
    }

    #[test]
    fn test_correct_detection_nudges_toward_observation() {
        let (m, _) = manager();
        let before = calibrate(&m, "alice");
        let after = m.adapt("alice", &metrics(30.0), true).unwrap().unwrap();
        // 11.2 + 0.1 * (24 - 11.2)
        assert!((after.swing_threshold - 12.48).abs() < 1e-9);
        // 30 above 21.6 -> max moves by 0.1 * 8.4
        assert!((after.ranges.max_speed.max - 22.44).abs() < 1e-9);
        assert_eq!(after.ranges.max_speed.min, before.ranges.max_speed.min);
        assert_eq!(after.confidence_threshold, before.confidence_threshold);
    }

    #[test]
    fn test_learning_rate_decays_after_stability_period() {
        let (m, _) = manager();
        for _ in 0..50 {
            m.adapt("bob", &metrics(15.0), true).unwrap();
        }
        assert_eq!(m.learning_data("bob").learning_rate, 0.1);
        m.adapt("bob", &metrics(15.0), true).unwrap();
        assert!((m.learning_data("bob").learning_rate - 0.095).abs() < 1e-12);
        for _ in 0..200 {
            m.adapt("bob", &metrics(15.0), true).unwrap();
        }
        assert_eq!(m.learning_data("bob").learning_rate, 0.05);
        assert_eq!(m.learning_data("bob").accuracy, 100.0);
    }

    #[test]
    fn test_adapt_without_calibration_returns_none() {
        let (m, _) = manager();
        assert!(m.adapt("nobody", &metrics(15.0), true).unwrap().is_none());
        assert_eq!(m.learning_data("nobody").total_swings, 1);
    }

    #[test]
    fn test_calibration_loaded_from_store() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let first = CalibrationManager::new(CalibrationConfig::default(), store.clone());
        let c = calibrate(&first, "alice");

        let second = CalibrationManager::new(CalibrationConfig::default(), store);
        let loaded = second.calibration("alice").unwrap();
        assert_eq!(loaded.session_id, c.session_id);
        assert_eq!(loaded.handedness, c.handedness);
        assert!((loaded.swing_threshold - c.swing_threshold).abs() < 1e-9);
    }

    #[test]
    fn test_unreadable_learning_record_is_never_overwritten() {
        let inner = Arc::new(MemoryStore::new());
        let first = CalibrationManager::new(CalibrationConfig::default(), inner.clone());
        for _ in 0..40 {
            first.adapt("bob", &metrics(15.0), true).unwrap();
        }

        let flaky = Arc::new(FlakyStore::new(inner.clone(), 1));
        let second = CalibrationManager::new(CalibrationConfig::default(), flaky);
        let err = second.adapt("bob", &metrics(15.0), false).unwrap_err();
        assert_eq!(err.kind(), swingsense::ErrorKind::StorageReadFailed);

        let stored: AdaptiveLearningData = load_json(inner.as_ref(), &learning_key("bob"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_swings, 40);

        // the read succeeds now: history continues from the stored record
        second.adapt("bob", &metrics(15.0), false).unwrap();
        let stored: AdaptiveLearningData = load_json(inner.as_ref(), &learning_key("bob"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_swings, 41);
        assert_eq!(stored.false_positive_swings, 1);
    }

    #[test]
    fn test_concurrent_adapt_loses_no_updates() {
        let (m, store) = manager();
        calibrate(&m, "bob");
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..200 {
                        m.adapt("bob", &metrics(15.0), false).unwrap();
                    }
                });
            }
        });
        let learning = m.learning_data("bob");
        assert_eq!(learning.total_swings, 1600);
        assert_eq!(learning.false_positive_swings, 1600);
        let stored: AdaptiveLearningData = load_json(store.as_ref(), &learning_key("bob"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_swings, 1600);
        assert_eq!(m.calibration("bob").unwrap().confidence_threshold, 95.0);
    }

    #[test]
    fn test_concurrent_add_swing_keeps_every_swing() {
        let (m, _) = manager();
        start(&m, "alice");
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        m.add_swing("alice", confirmed(15.0, 1.0)).unwrap();
                    }
                });
            }
        });
        let session = m.active_session("alice").unwrap();
        assert_eq!(session.swings.len(), 200);
        assert_eq!(session.confirmed_count(), 200);
    }

    #[test]
    fn test_session_completes_exactly_once_under_contention() {
        let (m, _) = manager();
        start(&m, "alice");
        for speed in [14.0, 15.0, 16.0, 17.0, 18.0] {
            m.add_swing("alice", confirmed(speed, 1.0)).unwrap();
        }
        let (completed, rejected_adds) = std::thread::scope(|s| {
            let completers: Vec<_> = (0..4).map(|_| s.spawn(|| m.complete_session("alice"))).collect();
            let adders: Vec<_> = (0..4)
                .map(|_| s.spawn(|| m.add_swing("alice", confirmed(15.0, 1.0))))
                .collect();
            let completed = completers
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| matches!(r, Ok(Some(_))))
                .count();
            let rejected = adders
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| *r == Err(CalibrationError::NoActiveSession("alice".into())))
                .count();
            (completed, rejected)
        });
        assert_eq!(completed, 1);
        assert!(rejected_adds <= 4);
        assert!(m.active_session("alice").is_none());
        assert_eq!(
            m.add_swing("alice", confirmed(15.0, 1.0)).unwrap_err(),
            CalibrationError::NoActiveSession("alice".into())
        );
    }

    #[test]
    fn test_add_to_finished_session_handle_is_rejected() {
        let (m, _) = manager();
        start(&m, "alice");
        let handle = m.session("alice").unwrap();
        m.cancel_session("alice").unwrap();
        // a caller that fetched the handle before cancellation
        m.sessions.write().unwrap().insert("alice".into(), handle);
        assert_eq!(
            m.add_swing("alice", confirmed(15.0, 1.0)).unwrap_err(),
            CalibrationError::NoActiveSession("alice".into())
        );
    }

    #[test]
    fn test_installed_calibration_is_served_from_cache() {
        let inner = Arc::new(MemoryStore::new());
        let m = CalibrationManager::new(CalibrationConfig::default(), inner.clone());
        let c = calibrate(&m, "alice");
        let fresh = CalibrationManager::new(
            CalibrationConfig::default(),
            Arc::new(FlakyStore::new(inner, 10)),
        );
        assert!(fresh.calibration("alice").is_none());
        fresh.install(c.clone()).unwrap();
        assert_eq!(fresh.calibration("alice").unwrap().session_id, c.session_id);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        assert_eq!(percentile(vec![], 0.95), None);
        assert_eq!(percentile(vec![3.0], 0.95), Some(3.0));
        assert_eq!(percentile(vec![5.0, 1.0, 4.0, 2.0, 3.0], 0.5), Some(3.0));
    }
}
