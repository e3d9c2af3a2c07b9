//! Error taxonomy and the serializable error record kept in the history.
//!
//! Classification is static: category, severity, and recoverability are
//! pure functions of the `ErrorKind`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Hardware,
    Analysis,
    AiService,
    Storage,
    Network,
    UserContext,
    Resource,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Hardware => write!(f, "hardware"),
            Self::Analysis => write!(f, "analysis"),
            Self::AiService => write!(f, "ai_service"),
            Self::Storage => write!(f, "storage"),
            Self::Network => write!(f, "network"),
            Self::UserContext => write!(f, "user_context"),
            Self::Resource => write!(f, "resource"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // validation
    InvalidMotionData,
    InsufficientData,
    CorruptedData,
    TimestampOrder,
    InvalidSwingSummary,
    ConfidenceTooLow,
    MetricOutOfRange,
    // hardware / connectivity
    SensorUnavailable,
    SensorDisconnected,
    ConnectionFailed,
    DeviceNotPaired,
    PermissionDenied,
    CalibrationRequired,
    // analysis
    SwingDetectionFailed,
    PatternMatchingFailed,
    MetricsCalculationFailed,
    ValidationPipelineFailed,
    // ai service
    AiServiceUnavailable,
    AiResponseInvalid,
    AiRateLimited,
    // storage
    StorageFull,
    StorageWriteFailed,
    StorageReadFailed,
    DataCorrupted,
    // network
    NetworkUnavailable,
    NetworkTimeout,
    ServerError,
    // user context
    NoActiveRound,
    ProfileMissing,
    SessionConflict,
    // resource
    MemoryLimitExceeded,
    ProcessingTimeout,
    Unknown,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        use ErrorKind::*;
        match self {
            InvalidMotionData | InsufficientData | CorruptedData | TimestampOrder
            | InvalidSwingSummary | ConfidenceTooLow | MetricOutOfRange => ErrorCategory::Validation,
            SensorUnavailable | SensorDisconnected | ConnectionFailed | DeviceNotPaired
            | PermissionDenied | CalibrationRequired => ErrorCategory::Hardware,
            SwingDetectionFailed | PatternMatchingFailed | MetricsCalculationFailed
            | ValidationPipelineFailed => ErrorCategory::Analysis,
            AiServiceUnavailable | AiResponseInvalid | AiRateLimited => ErrorCategory::AiService,
            StorageFull | StorageWriteFailed | StorageReadFailed | DataCorrupted => {
                ErrorCategory::Storage
            }
            NetworkUnavailable | NetworkTimeout | ServerError => ErrorCategory::Network,
            NoActiveRound | ProfileMissing | SessionConflict => ErrorCategory::UserContext,
            MemoryLimitExceeded | ProcessingTimeout | Unknown => ErrorCategory::Resource,
        }
    }

    /// critical: memory, storage, corrupted data. high: connectivity,
    /// permission, server. medium: detection, matching, AI, network.
    pub fn severity(self) -> Severity {
        use ErrorKind::*;
        match self {
            MemoryLimitExceeded | CorruptedData | DataCorrupted => Severity::Critical,
            _ if self.category() == ErrorCategory::Storage => Severity::Critical,
            SensorDisconnected | ConnectionFailed | DeviceNotPaired | PermissionDenied
            | ServerError => Severity::High,
            SwingDetectionFailed | PatternMatchingFailed | MetricsCalculationFailed
            | NetworkUnavailable | NetworkTimeout => Severity::Medium,
            _ if self.category() == ErrorCategory::AiService => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Only storage-full, permission-denied, and memory-limit need external
    /// action before the operation can succeed.
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorKind::StorageFull | ErrorKind::PermissionDenied | ErrorKind::MemoryLimitExceeded
        )
    }

    pub fn user_message(self) -> &'static str {
        use ErrorKind::*;
        match self {
            InvalidMotionData => "The motion data could not be read. Please try the swing again.",
            InsufficientData => "Not enough motion was recorded to analyze this swing.",
            CorruptedData => "The sensor reported impossible values. Check the sensor and retry.",
            TimestampOrder => "Motion data arrived out of order. Please try the swing again.",
            InvalidSwingSummary => "The swing summary is incomplete.",
            ConfidenceTooLow => "We are not confident this was a swing.",
            MetricOutOfRange => "A swing measurement is outside the expected range.",
            SensorUnavailable => "The motion sensor is unavailable.",
            SensorDisconnected => "The motion sensor disconnected. Reconnecting...",
            ConnectionFailed => "Could not connect to the motion sensor.",
            DeviceNotPaired => "Pair your sensor before recording swings.",
            PermissionDenied => "Motion access was denied. Enable it in settings.",
            CalibrationRequired => "Please run a calibration session first.",
            SwingDetectionFailed => "Swing detection failed for this motion.",
            PatternMatchingFailed => "Could not compare this swing to a reference.",
            MetricsCalculationFailed => "Could not compute swing metrics.",
            ValidationPipelineFailed => "Could not validate this swing.",
            AiServiceUnavailable => "Swing coaching is temporarily unavailable.",
            AiResponseInvalid => "Swing coaching returned an unexpected response.",
            AiRateLimited => "Too many coaching requests. Try again shortly.",
            StorageFull => "Device storage is full. Free up space to save swings.",
            StorageWriteFailed => "Could not save your swing data.",
            StorageReadFailed => "Could not load your swing data.",
            DataCorrupted => "Saved swing data is damaged and was reset.",
            NetworkUnavailable => "No network connection.",
            NetworkTimeout => "The network request timed out.",
            ServerError => "The server had a problem. Try again later.",
            NoActiveRound => "Start a round to record swings.",
            ProfileMissing => "No player profile found.",
            SessionConflict => "A calibration session is already running.",
            MemoryLimitExceeded => "The app is low on memory.",
            ProcessingTimeout => "Swing analysis took too long.",
            Unknown => "Something went wrong.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde snake_case names double as stable display names
        let v = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        f.write_str(v.as_str().unwrap_or("unknown"))
    }
}

/// How the caller should proceed after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Retry with exponential backoff, degrading to cached output when
    /// attempts are exhausted.
    Retry {
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    },
    /// Return cached / fallback output for this operation.
    Fallback,
    /// Run a calibration session.
    Recalibrate,
    /// Terminal for this operation; needs the user to act.
    UserAction,
    /// Drop the input and continue.
    Discard,
}

/// A classified error as recorded in the monitor history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingAnalysisError {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub recoverable: bool,
    pub recovery: RecoveryStrategy,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_detail: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for SwingAnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.severity, self.kind, self.user_message)?;
        if let Some(detail) = &self.technical_detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for SwingAnalysisError {}
