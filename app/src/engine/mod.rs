//! The swing analysis engine: segmentation, metrics, template matching,
//! validation, and calibration behind one explicitly constructed facade.

pub mod calibration;
pub mod false_positive;
pub mod matcher;
pub mod metrics;
pub mod segmentation;
pub mod templates;
pub mod validation;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::monitor::health::{ErrorRateProbe, SensorProbe, StorageProbe};
use crate::monitor::{ErrorContext, ErrorMonitor, HealthProbe, SensorActivity};
use crate::store::KeyValueStore;
use calibration::CalibrationManager;
use segmentation::{DetectionThresholds, PhaseSegmenter};
use templates::{TemplateError, TemplateLibrary};
use validation::ValidationEngine;

use swingsense::{
    AdaptiveLearningData, CalibrationSession, CalibrationSwing, ClubType, CompletedSwing,
    DetailedSwingMetrics, DeviceSnapshot, EnvironmentSnapshot, ErrorKind, ErrorPatternAlert,
    HealthCheckResult, MotionSample, PatternMatchResult, RawMotionPayload, Subsystem,
    SwingAnalysis, SwingAnalysisError, SwingCalibration, SwingMetrics, SwingPhase,
    SwingSenseConfig, SwingTemplate, ValidationContext, ValidationResult,
};

/// Default probe set: sensor activity, store round-trip, and error-rate
/// probes for the remote services.
pub fn default_probes(
    activity: Arc<SensorActivity>,
    store: Arc<dyn KeyValueStore>,
) -> Vec<Arc<dyn HealthProbe>> {
    vec![
        Arc::new(SensorProbe { activity }),
        Arc::new(ErrorRateProbe {
            subsystem: Subsystem::AiService,
        }),
        Arc::new(StorageProbe { store }),
        Arc::new(ErrorRateProbe {
            subsystem: Subsystem::Network,
        }),
    ]
}

pub struct SwingEngine {
    user_id: Option<String>,
    segmenter: PhaseSegmenter,
    segmentation: swingsense::SegmentationConfig,
    templates: TemplateLibrary,
    validator: ValidationEngine,
    calibration: CalibrationManager,
    monitor: ErrorMonitor,
    activity: Arc<SensorActivity>,
    /// Resolved from the bound user's calibration; refreshed when it changes.
    thresholds: DetectionThresholds,
}

impl SwingEngine {
    pub fn new(config: SwingSenseConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let activity = Arc::new(SensorActivity::default());
        let probes = default_probes(activity.clone(), store.clone());
        let thresholds = DetectionThresholds::from_config(&config.segmentation);
        let mut engine = Self {
            user_id: config.user_id.clone(),
            segmenter: PhaseSegmenter::new(config.segmentation.clone()),
            segmentation: config.segmentation,
            templates: TemplateLibrary::builtin(),
            validator: ValidationEngine::new(config.validation),
            calibration: CalibrationManager::new(config.calibration, store),
            monitor: ErrorMonitor::new(config.monitor, probes),
            activity,
            thresholds,
        };
        engine.refresh_thresholds();
        engine
    }

    /// Bind live ingestion to a user's calibration.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.refresh_thresholds();
        self
    }

    pub fn thresholds(&self) -> DetectionThresholds {
        self.thresholds
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    fn refresh_thresholds(&mut self) {
        let calibration = self.user_id.as_deref().and_then(|u| self.calibration.calibration(u));
        self.thresholds = DetectionThresholds::resolve(calibration.as_ref(), &self.segmentation);
    }

    fn refresh_if_bound(&mut self, user_id: &str) {
        if self.user_id.as_deref() == Some(user_id) {
            self.refresh_thresholds();
        }
    }

    fn context(&self, operation: &str) -> ErrorContext {
        let ctx = ErrorContext::new().with("operation", operation);
        match &self.user_id {
            Some(u) => ctx.with("user", u),
            None => ctx,
        }
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Feed one sample. Returns the swing this sample completed, if any.
    /// Rejected samples are recorded by the monitor and leave segmentation
    /// state untouched.
    pub fn ingest(
        &mut self,
        sample: MotionSample,
    ) -> Result<Option<CompletedSwing>, SwingAnalysisError> {
        self.activity.touch();
        match self.segmenter.ingest(sample, self.thresholds) {
            Ok(Some(swing)) => {
                self.monitor.record_success();
                Ok(Some(swing))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let mut ctx = self.context("ingest").with("timestamp", sample.timestamp);
                if let Some(index) = e.index() {
                    ctx = ctx.with("index", index);
                }
                Err(self.monitor.handle_error(&e, ctx, None))
            }
        }
    }

    pub fn ingest_raw(
        &mut self,
        payload: RawMotionPayload,
    ) -> Result<Option<CompletedSwing>, SwingAnalysisError> {
        self.ingest(payload.into_sample())
    }

    /// Drop the in-progress swing (e.g. the stream was interrupted).
    pub fn reset_stream(&mut self) {
        self.segmenter.reset();
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    pub fn compute_detailed(&self, swing: &CompletedSwing) -> DetailedSwingMetrics {
        metrics::compute_detailed(&swing.samples, &swing.phases, &swing.metrics)
    }

    pub fn match_templates(
        &self,
        metrics: &SwingMetrics,
        phases: &[SwingPhase],
        samples: &[MotionSample],
        club_filter: Option<ClubType>,
    ) -> Vec<PatternMatchResult> {
        matcher::match_templates(&self.templates, metrics, phases, samples, club_filter)
    }

    pub fn validate(
        &self,
        swing: &CompletedSwing,
        context: &ValidationContext,
        pattern: Option<&PatternMatchResult>,
    ) -> ValidationResult {
        self.validator.validate(swing, context, pattern)
    }

    /// Full pipeline for a completed swing: detailed metrics, template
    /// matches (restricted to `club` when known), then validation against
    /// the best match.
    pub fn analyze(
        &self,
        mut swing: CompletedSwing,
        context: &ValidationContext,
        club: Option<ClubType>,
    ) -> SwingAnalysis {
        if club.is_some() {
            swing.club = club;
        }
        let detailed = self.compute_detailed(&swing);
        let matches = self.match_templates(&swing.metrics, &swing.phases, &swing.samples, swing.club);
        let validation = self.validate(&swing, context, matches.first());
        match matches.first() {
            Some(best) => info!(
                "analysis: swing {} best match {} ({:.0}), valid={} ({:.0})",
                swing.id, best.template_id, best.overall_match, validation.is_valid,
                validation.adjusted_confidence,
            ),
            None => info!(
                "analysis: swing {} no template match, valid={}",
                swing.id, validation.is_valid
            ),
        }
        SwingAnalysis {
            user_id: self.user_id.clone(),
            swing,
            detailed,
            matches,
            validation,
        }
    }

    pub fn add_template(&mut self, template: SwingTemplate) -> Result<(), SwingAnalysisError> {
        let id = template.id.clone();
        self.templates.add(template).map_err(|e: TemplateError| {
            self.monitor
                .handle_error(&e, self.context("add_template").with("template", &id), None)
        })
    }

    // -----------------------------------------------------------------------
    // Calibration
    // -----------------------------------------------------------------------

    pub fn start_calibration(
        &self,
        user_id: &str,
        environment: EnvironmentSnapshot,
        device: DeviceSnapshot,
    ) -> Result<Uuid, SwingAnalysisError> {
        self.calibration
            .start_session(user_id, environment, device)
            .map_err(|e| self.monitor.handle_error(&e, self.context("start_session"), None))
    }

    pub fn add_calibration_swing(
        &self,
        user_id: &str,
        swing: CalibrationSwing,
    ) -> Result<usize, SwingAnalysisError> {
        self.calibration
            .add_swing(user_id, swing)
            .map_err(|e| self.monitor.handle_error(&e, self.context("add_swing"), None))
    }

    pub fn complete_calibration(
        &mut self,
        user_id: &str,
    ) -> Result<Option<SwingCalibration>, SwingAnalysisError> {
        let calibration = self
            .calibration
            .complete_session(user_id)
            .map_err(|e| self.monitor.handle_error(&e, self.context("complete_session"), None))?;
        if calibration.is_some() {
            self.refresh_if_bound(user_id);
        }
        Ok(calibration)
    }

    pub fn cancel_calibration(
        &self,
        user_id: &str,
    ) -> Result<CalibrationSession, SwingAnalysisError> {
        self.calibration
            .cancel_session(user_id)
            .map_err(|e| self.monitor.handle_error(&e, self.context("cancel_session"), None))
    }

    pub fn active_calibration_session(&self, user_id: &str) -> Option<CalibrationSession> {
        self.calibration.active_session(user_id)
    }

    pub fn calibration(&self, user_id: &str) -> Option<SwingCalibration> {
        self.calibration.calibration(user_id)
    }

    /// Like `calibration`, but a missing calibration is an error the
    /// monitor records (strategy: recalibrate).
    pub fn require_calibration(&self, user_id: &str) -> Result<SwingCalibration, SwingAnalysisError> {
        self.calibration.calibration(user_id).ok_or_else(|| {
            let e = calibration::CalibrationError::NoActiveSession(user_id.to_string());
            self.monitor.handle_error(
                &e,
                self.context("require_calibration"),
                Some(ErrorKind::CalibrationRequired),
            )
        })
    }

    pub fn learning_data(&self, user_id: &str) -> AdaptiveLearningData {
        self.calibration.learning_data(user_id)
    }

    /// Fold user feedback on a detected swing into adaptive learning.
    pub fn adapt(
        &mut self,
        user_id: &str,
        metrics: &SwingMetrics,
        was_correct: bool,
    ) -> Result<Option<SwingCalibration>, SwingAnalysisError> {
        debug!("engine: feedback from '{user_id}' correct={was_correct}");
        let updated = self
            .calibration
            .adapt(user_id, metrics, was_correct)
            .map_err(|e| self.monitor.handle_error(&e, self.context("adapt"), None))?;
        if updated.is_some() {
            self.refresh_if_bound(user_id);
        }
        Ok(updated)
    }

    /// Adopt a calibration read outside the engine (a retried load) and
    /// switch detection to it when it belongs to the bound user.
    pub fn install_calibration(
        &mut self,
        calibration: SwingCalibration,
    ) -> Result<(), SwingAnalysisError> {
        let user_id = calibration.user_id.clone();
        self.calibration
            .install(calibration)
            .map_err(|e| self.monitor.handle_error(&e, self.context("install_calibration"), None))?;
        self.refresh_if_bound(&user_id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Monitoring
    // -----------------------------------------------------------------------

    pub fn handle_error(
        &self,
        err: &(dyn std::error::Error + 'static),
        context: ErrorContext,
        kind: Option<ErrorKind>,
    ) -> SwingAnalysisError {
        self.monitor.handle_error(err, context, kind)
    }

    pub fn check_error_patterns(&self) -> Option<ErrorPatternAlert> {
        self.monitor.check_error_patterns()
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        self.monitor.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutil::synthetic_swing;
    use swingsense::{HealthStatus, PhaseTag};

    fn engine() -> SwingEngine {
        SwingEngine::new(SwingSenseConfig::default(), Arc::new(MemoryStore::new()))
    }

    /// 60 samples, 33ms apart, spread over the five phases of an iron swing.
    fn iron_swing() -> CompletedSwing {
        let lib = TemplateLibrary::builtin();
        let ideal = lib.get("iron").map(|t| t.ideal).unwrap();
        let phases = vec![
            SwingPhase::new(PhaseTag::Address, 0, 400, 0.3),
            SwingPhase::new(PhaseTag::Backswing, 400, 1100, 6.0),
            SwingPhase::new(PhaseTag::Downswing, 1100, 1350, 16.0),
            SwingPhase::new(PhaseTag::Impact, 1350, 1390, 14.0),
            SwingPhase::new(PhaseTag::FollowThrough, 1390, 1990, 8.0),
        ];
        let samples = (0..60u64)
            .map(|i| {
                let t = i * 33;
                let peak = phases
                    .iter()
                    .find(|p| p.contains(t))
                    .map(|p| p.peak_acceleration)
                    .unwrap_or(0.3);
                MotionSample::new(t, [peak * 0.8, peak * 0.6, 0.0], [0.0, 0.4, 0.0])
            })
            .collect::<Vec<_>>();
        let measured = segmentation::basic_metrics(&samples, &phases, &swingsense::SegmentationConfig::default());
        assert!((measured.swing_tempo - 2.8).abs() < 1e-9, "{}", measured.swing_tempo);
        assert!((measured.max_speed - 16.0).abs() < 1e-9, "{}", measured.max_speed);
        assert_eq!(measured.impact_timing, 250.0);
        // The synthetic gyro trace is too weak for realistic rotation, plane
        // or clubhead speed, so those come from the ideal. The rest is
        // measured.
        CompletedSwing {
            id: Uuid::new_v4(),
            phases,
            samples,
            metrics: SwingMetrics {
                backswing_angle: ideal.backswing_angle,
                downswing_angle: ideal.downswing_angle,
                follow_through_angle: ideal.follow_through_angle,
                swing_plane: ideal.swing_plane,
                clubhead_speed: ideal.clubhead_speed,
                ..measured
            },
            confidence: 85.0,
            club: None,
        }
    }

    #[test]
    fn test_iron_swing_matches_iron_template() {
        let engine = engine();
        let analysis = engine.analyze(iron_swing(), &ValidationContext::default(), Some(ClubType::Iron));
        assert_eq!(analysis.swing.club, Some(ClubType::Iron));
        assert_eq!(analysis.matches.len(), 1);
        let best = analysis.best_match().unwrap();
        assert_eq!(best.template_id, "iron");
        assert!(best.overall_match > 90.0, "{}", best.overall_match);
        assert_eq!(analysis.detailed.phase_durations.get(PhaseTag::Backswing), 700);
    }

    #[test]
    fn test_unfiltered_analysis_ranks_all_templates() {
        let engine = engine();
        let analysis = engine.analyze(iron_swing(), &ValidationContext::default(), None);
        assert_eq!(analysis.matches.len(), engine.templates().len());
        assert_eq!(analysis.matches[0].template_id, "iron");
    }

    #[test]
    fn test_ingest_end_to_end() {
        let mut engine = engine().with_user("alice");
        let mut swings = Vec::new();
        for s in synthetic_swing(0) {
            if let Some(swing) = engine.ingest(s).unwrap() {
                swings.push(swing);
            }
        }
        assert_eq!(swings.len(), 1);
        let analysis = engine.analyze(swings.remove(0), &ValidationContext::default(), None);
        assert_eq!(analysis.user_id.as_deref(), Some("alice"));
        assert!(!analysis.matches.is_empty());
        assert!((0.0..=100.0).contains(&analysis.validation.adjusted_confidence));
        assert!((0.0..=100.0).contains(&analysis.validation.false_positive_risk));
    }

    #[test]
    fn test_rejected_sample_is_recorded() {
        let mut engine = engine().with_user("alice");
        engine.ingest(MotionSample::new(100, [0.1, 0.0, 0.0], [0.0; 3])).unwrap();
        let err = engine
            .ingest(MotionSample::new(90, [0.1, 0.0, 0.0], [0.0; 3]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TimestampOrder);
        assert_eq!(err.context.get("index").map(String::as_str), Some("1"));
        assert_eq!(err.context.get("user").map(String::as_str), Some("alice"));
        assert_eq!(engine.monitor().history_len(), 1);
    }

    #[test]
    fn test_calibration_errors_go_through_monitor() {
        let engine = engine();
        engine
            .start_calibration("bob", EnvironmentSnapshot::default(), DeviceSnapshot::default())
            .unwrap();
        let err = engine
            .start_calibration("bob", EnvironmentSnapshot::default(), DeviceSnapshot::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionConflict);
        let err = engine.require_calibration("carol").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CalibrationRequired);
        assert_eq!(err.recovery, swingsense::RecoveryStrategy::Recalibrate);
        assert_eq!(engine.monitor().history_len(), 2);
    }

    #[test]
    fn test_duplicate_template_is_rejected() {
        let mut engine = engine();
        let iron = engine.templates().get("iron").cloned().unwrap();
        let err = engine.add_template(iron).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternMatchingFailed);
    }

    #[tokio::test]
    async fn test_health_check_reports_four_subsystems() {
        let mut engine = engine();
        engine.ingest(MotionSample::new(0, [0.1, 0.0, 0.0], [0.0; 3])).unwrap();
        let report = engine.health_check().await;
        let subsystems: Vec<_> = report.subsystems.iter().map(|s| s.subsystem).collect();
        assert_eq!(subsystems, Subsystem::ALL.to_vec());
        assert_eq!(report.overall, HealthStatus::Healthy);
    }
}
