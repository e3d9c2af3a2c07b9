//! Health-check report types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// The four independently probed dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Sensors,
    AiService,
    Storage,
    Network,
}

impl Subsystem {
    pub const ALL: &[Subsystem] = &[
        Subsystem::Sensors,
        Subsystem::AiService,
        Subsystem::Storage,
        Subsystem::Network,
    ];
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensors => write!(f, "sensors"),
            Self::AiService => write!(f, "ai_service"),
            Self::Storage => write!(f, "storage"),
            Self::Network => write!(f, "network"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub subsystem: Subsystem,
    pub status: HealthStatus,
    /// Recent errors per minute attributed to this subsystem.
    pub error_rate: f64,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub overall: HealthStatus,
    pub subsystems: Vec<SubsystemHealth>,
    pub checked_at: DateTime<Utc>,
}

/// Raised by the periodic error-pattern check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPatternAlert {
    /// High + critical errors in the trailing window.
    pub severe_errors: usize,
    /// Estimated failure share of recent operations (0-100).
    pub error_rate: f64,
    pub window_minutes: i64,
    pub message: String,
}
