//! Error classification, bounded error history, pattern alerts, and health
//! checks across the engine's dependencies.

pub mod data_validation;
pub mod health;
pub mod recovery;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

pub use data_validation::{
    MotionDataError, SummaryError, SwingSummary, validate_motion_data, validate_swing_summary,
};
pub use health::{HealthProbe, ProbeError, SensorActivity};
pub use recovery::{recovery_strategy, retry_with_backoff};

use crate::engine::calibration::CalibrationError;
use crate::engine::templates::TemplateError;
use crate::engine::validation::ValidationStepError;
use crate::store::StoreError;
use swingsense::{
    ErrorCategory, ErrorKind, ErrorPatternAlert, HealthCheckResult, MonitorConfig, Severity,
    Subsystem, SwingAnalysisError,
};

/// Key/value context attached to a recorded error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext(HashMap<String, String>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }
}

/// Map any error the engine produces to its kind. Unknown types fall back
/// to `ErrorKind::Unknown`.
pub fn classify(err: &(dyn StdError + 'static)) -> ErrorKind {
    if let Some(e) = err.downcast_ref::<SwingAnalysisError>() {
        e.kind
    } else if let Some(e) = err.downcast_ref::<MotionDataError>() {
        e.kind()
    } else if let Some(e) = err.downcast_ref::<SummaryError>() {
        e.kind()
    } else if let Some(e) = err.downcast_ref::<CalibrationError>() {
        e.kind()
    } else if let Some(e) = err.downcast_ref::<StoreError>() {
        if e.is_storage_full() {
            ErrorKind::StorageFull
        } else if e.is_permission_denied() {
            ErrorKind::PermissionDenied
        } else {
            match e {
                StoreError::Corrupt { .. } => ErrorKind::DataCorrupted,
                _ => ErrorKind::StorageWriteFailed,
            }
        }
    } else if err.downcast_ref::<TemplateError>().is_some() {
        ErrorKind::PatternMatchingFailed
    } else if err.downcast_ref::<ValidationStepError>().is_some() {
        ErrorKind::ValidationPipelineFailed
    } else if let Some(e) = err.downcast_ref::<ProbeError>() {
        match e {
            ProbeError::Timeout(_) => ErrorKind::ProcessingTimeout,
            ProbeError::Storage(_) | ProbeError::Mismatch(_) => ErrorKind::StorageReadFailed,
            ProbeError::Other(_) => ErrorKind::Unknown,
        }
    } else if let Some(e) = err.downcast_ref::<std::io::Error>() {
        match e.kind() {
            std::io::ErrorKind::StorageFull => ErrorKind::StorageFull,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut => ErrorKind::NetworkTimeout,
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => {
                ErrorKind::ConnectionFailed
            }
            _ => ErrorKind::Unknown,
        }
    } else {
        ErrorKind::Unknown
    }
}

fn subsystem_categories(subsystem: Subsystem) -> &'static [ErrorCategory] {
    match subsystem {
        Subsystem::Sensors => &[ErrorCategory::Hardware],
        Subsystem::AiService => &[ErrorCategory::AiService],
        Subsystem::Storage => &[ErrorCategory::Storage],
        Subsystem::Network => &[ErrorCategory::Network],
    }
}

pub struct ErrorMonitor {
    config: MonitorConfig,
    history: Mutex<VecDeque<SwingAnalysisError>>,
    /// Recent operation outcomes (time, failed) for the error-rate estimate.
    outcomes: Mutex<VecDeque<(DateTime<Utc>, bool)>>,
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl ErrorMonitor {
    pub fn new(config: MonitorConfig, probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(config.history_cap)),
            outcomes: Mutex::new(VecDeque::new()),
            config,
            probes,
        }
    }

    /// Classify, record, and log an error. `kind` overrides classification.
    pub fn handle_error(
        &self,
        err: &(dyn StdError + 'static),
        context: ErrorContext,
        kind: Option<ErrorKind>,
    ) -> SwingAnalysisError {
        let kind = kind.unwrap_or_else(|| classify(err));
        let record = SwingAnalysisError {
            id: Uuid::new_v4(),
            kind,
            category: kind.category(),
            severity: kind.severity(),
            recoverable: kind.is_recoverable(),
            recovery: recovery_strategy(kind),
            user_message: kind.user_message().to_string(),
            technical_detail: Some(err.to_string()),
            context: context.0,
            timestamp: Utc::now(),
        };

        match record.severity {
            Severity::High | Severity::Critical => error!("monitor: {record}"),
            Severity::Medium => warn!("monitor: {record}"),
            Severity::Low => info!("monitor: {record}"),
        }

        if let Ok(mut history) = self.history.lock() {
            history.push_back(record.clone());
            while history.len() > self.config.history_cap {
                history.pop_front();
            }
        }
        self.record_outcome(true);
        record
    }

    /// Count a successful operation toward the error-rate estimate.
    pub fn record_success(&self) {
        self.record_outcome(false);
    }

    fn record_outcome(&self, failed: bool) {
        let Ok(mut outcomes) = self.outcomes.lock() else {
            return;
        };
        let now = Utc::now();
        outcomes.push_back((now, failed));
        let cutoff = now - chrono::Duration::minutes(self.config.pattern_window_minutes);
        while outcomes.front().is_some_and(|(t, _)| *t < cutoff) {
            outcomes.pop_front();
        }
    }

    pub fn history(&self) -> Vec<SwingAnalysisError> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn clear_history(&self) {
        if let Ok(mut h) = self.history.lock() {
            h.clear();
        }
    }

    /// Failure share (0-100) of operations in the trailing window.
    pub fn error_rate(&self) -> f64 {
        let Ok(outcomes) = self.outcomes.lock() else {
            return 0.0;
        };
        let cutoff = Utc::now() - chrono::Duration::minutes(self.config.pattern_window_minutes);
        let recent: Vec<bool> = outcomes
            .iter()
            .filter(|(t, _)| *t >= cutoff)
            .map(|(_, failed)| *failed)
            .collect();
        if recent.is_empty() {
            return 0.0;
        }
        100.0 * recent.iter().filter(|f| **f).count() as f64 / recent.len() as f64
    }

    /// Flag a burst of severe errors or a high failure share.
    pub fn check_error_patterns(&self) -> Option<ErrorPatternAlert> {
        let window = self.config.pattern_window_minutes;
        let cutoff = Utc::now() - chrono::Duration::minutes(window);
        let severe_errors = self
            .history
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|e| e.timestamp >= cutoff && e.severity >= Severity::High)
                    .count()
            })
            .unwrap_or(0);
        let error_rate = self.error_rate();

        let message = if severe_errors >= self.config.severe_error_limit {
            format!("{severe_errors} high/critical errors in the last {window} minutes")
        } else if error_rate > self.config.error_rate_limit {
            format!("{error_rate:.0}% of recent operations failed")
        } else {
            return None;
        };
        warn!("monitor: error pattern: {message}");
        Some(ErrorPatternAlert {
            severe_errors,
            error_rate,
            window_minutes: window,
            message,
        })
    }

    /// Errors per minute in the probe window for one subsystem.
    pub fn subsystem_error_rate(&self, subsystem: Subsystem) -> f64 {
        let minutes = self.config.probe_window_minutes.max(1);
        let cutoff = Utc::now() - chrono::Duration::minutes(minutes);
        let categories = subsystem_categories(subsystem);
        let count = self
            .history
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|e| e.timestamp >= cutoff && categories.contains(&e.category))
                    .count()
            })
            .unwrap_or(0);
        count as f64 / minutes as f64
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        health::run_probes(
            &self.probes,
            |s| self.subsystem_error_rate(s),
            Duration::from_millis(self.config.probe_timeout_ms),
        )
        .await
    }
}
