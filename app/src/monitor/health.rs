//! Subsystem health probes.
//!
//! Each probe runs concurrently under its own timeout. A probe that errors
//! or times out is reported unhealthy on its own line; the aggregate check
//! never fails.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::{BoxFuture, join_all};
use tracing::{debug, warn};

use crate::store::KeyValueStore;
use swingsense::{HealthCheckResult, HealthStatus, Subsystem, SubsystemHealth};

/// Errors per minute at which a subsystem is degraded / unhealthy.
pub const DEGRADED_ERROR_RATE: f64 = 1.0;
pub const UNHEALTHY_ERROR_RATE: f64 = 5.0;
pub const DEGRADED_LATENCY_MS: u64 = 500;
/// Sensor silence after which the sensor subsystem is degraded.
pub const SENSOR_STALE_AFTER: Duration = Duration::from_secs(30);

const HEALTH_KEY: &str = "__health__";

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {0}ms")]
    Timeout(u64),
    #[error("storage round-trip failed: {0}")]
    Storage(#[from] crate::store::StoreError),
    #[error("storage round-trip returned {0:?}")]
    Mismatch(Option<String>),
    #[error("{0}")]
    Other(String),
}

/// What the monitor hands each probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInput {
    /// Recent errors per minute attributed to this subsystem.
    pub error_rate: f64,
}

/// Raw probe verdict, before the monitor stamps the error rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReading {
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub detail: Option<String>,
}

impl ProbeReading {
    pub fn from_rate(rate: f64) -> Self {
        Self {
            status: status_for_rate(rate),
            latency_ms: None,
            detail: None,
        }
    }
}

pub fn status_for_rate(rate: f64) -> HealthStatus {
    if rate >= UNHEALTHY_ERROR_RATE {
        HealthStatus::Unhealthy
    } else if rate >= DEGRADED_ERROR_RATE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

pub trait HealthProbe: Send + Sync {
    fn subsystem(&self) -> Subsystem;
    fn probe(&self, input: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>>;
}

/// healthy iff every subsystem is healthy; degraded if any is degraded;
/// otherwise unhealthy. No subsystems at all counts as healthy.
pub fn overall_status(subsystems: &[SubsystemHealth]) -> HealthStatus {
    if subsystems.iter().all(|s| s.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else if subsystems.iter().any(|s| s.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Fan out every probe with a per-probe timeout and join.
pub async fn run_probes(
    probes: &[Arc<dyn HealthProbe>],
    error_rate: impl Fn(Subsystem) -> f64,
    timeout: Duration,
) -> HealthCheckResult {
    let checks = probes.iter().map(|probe| {
        let subsystem = probe.subsystem();
        let rate = error_rate(subsystem);
        async move {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, probe.probe(ProbeInput { error_rate: rate }))
                .await
                .unwrap_or_else(|_| Err(ProbeError::Timeout(timeout.as_millis() as u64)));
            match outcome {
                Ok(reading) => SubsystemHealth {
                    subsystem,
                    status: reading.status,
                    error_rate: rate,
                    latency_ms: reading
                        .latency_ms
                        .or(Some(started.elapsed().as_millis() as u64)),
                    detail: reading.detail,
                },
                Err(e) => {
                    warn!("health: {subsystem} probe failed: {e}");
                    SubsystemHealth {
                        subsystem,
                        status: HealthStatus::Unhealthy,
                        error_rate: rate,
                        latency_ms: None,
                        detail: Some(e.to_string()),
                    }
                }
            }
        }
    });
    let subsystems = join_all(checks).await;
    let overall = overall_status(&subsystems);
    debug!("health: overall {overall} across {} probes", subsystems.len());
    HealthCheckResult {
        overall,
        subsystems,
        checked_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Built-in probes
// ---------------------------------------------------------------------------

/// Last time a motion sample arrived. Shared between the engine (writer) and
/// the sensor probe (reader).
#[derive(Debug, Default)]
pub struct SensorActivity {
    last_sample: Mutex<Option<Instant>>,
}

impl SensorActivity {
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_sample.lock() {
            *last = Some(Instant::now());
        }
    }

    pub fn since_last_sample(&self) -> Option<Duration> {
        self.last_sample.lock().ok()?.map(|t| t.elapsed())
    }
}

pub struct SensorProbe {
    pub activity: Arc<SensorActivity>,
}

impl HealthProbe for SensorProbe {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Sensors
    }

    fn probe(&self, input: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
        Box::pin(async move {
            let mut reading = ProbeReading::from_rate(input.error_rate);
            match self.activity.since_last_sample() {
                None => {
                    reading.status = reading.status.max(HealthStatus::Degraded);
                    reading.detail = Some("no samples received yet".into());
                }
                Some(idle) if idle > SENSOR_STALE_AFTER => {
                    reading.status = reading.status.max(HealthStatus::Degraded);
                    reading.detail = Some(format!("no samples for {}s", idle.as_secs()));
                }
                Some(_) => {}
            }
            Ok(reading)
        })
    }
}

/// Round-trips a sentinel record through the store.
pub struct StorageProbe {
    pub store: Arc<dyn KeyValueStore>,
}

impl HealthProbe for StorageProbe {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Storage
    }

    fn probe(&self, input: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
        let store = Arc::clone(&self.store);
        Box::pin(async move {
            let started = Instant::now();
            let token = Utc::now().timestamp_millis().to_string();
            // Store I/O is synchronous; keep it off the async workers.
            let outcome = tokio::task::spawn_blocking(move || {
                store.put(HEALTH_KEY, &token)?;
                let read = store.get(HEALTH_KEY)?;
                store.remove(HEALTH_KEY)?;
                Ok::<_, ProbeError>((token, read))
            })
            .await
            .map_err(|e| ProbeError::Other(format!("storage check aborted: {e}")))?;
            let (token, read) = outcome?;
            if read.as_deref() != Some(token.as_str()) {
                return Err(ProbeError::Mismatch(read));
            }
            let latency = started.elapsed().as_millis() as u64;
            let mut reading = ProbeReading::from_rate(input.error_rate);
            if latency > DEGRADED_LATENCY_MS {
                reading.status = reading.status.max(HealthStatus::Degraded);
                reading.detail = Some(format!("slow storage ({latency}ms)"));
            }
            reading.latency_ms = Some(latency);
            Ok(reading)
        })
    }
}

/// Health derived purely from recent errors (AI service, network). The
/// engine has no direct handle on either.
pub struct ErrorRateProbe {
    pub subsystem: Subsystem,
}

impl HealthProbe for ErrorRateProbe {
    fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    fn probe(&self, input: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
        Box::pin(async move { Ok(ProbeReading::from_rate(input.error_rate)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Fixed(Subsystem, HealthStatus);

    impl HealthProbe for Fixed {
        fn subsystem(&self) -> Subsystem {
            self.0
        }
        fn probe(&self, _: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
            let status = self.1;
            Box::pin(async move {
                Ok(ProbeReading {
                    status,
                    latency_ms: Some(1),
                    detail: None,
                })
            })
        }
    }

    struct Failing;

    impl HealthProbe for Failing {
        fn subsystem(&self) -> Subsystem {
            Subsystem::AiService
        }
        fn probe(&self, _: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
            Box::pin(async { Err(ProbeError::Other("backend refused".into())) })
        }
    }

    struct Hanging;

    impl HealthProbe for Hanging {
        fn subsystem(&self) -> Subsystem {
            Subsystem::Network
        }
        fn probe(&self, _: ProbeInput) -> BoxFuture<'_, Result<ProbeReading, ProbeError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProbeReading::from_rate(0.0))
            })
        }
    }

    fn probes(statuses: [HealthStatus; 4]) -> Vec<Arc<dyn HealthProbe>> {
        Subsystem::ALL
            .iter()
            .zip(statuses)
            .map(|(s, st)| Arc::new(Fixed(*s, st)) as Arc<dyn HealthProbe>)
            .collect()
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_overall_healthy_iff_all_healthy() {
        use HealthStatus::*;
        let all = run_probes(&probes([Healthy; 4]), |_| 0.0, TIMEOUT).await;
        assert_eq!(all.overall, Healthy);
        assert_eq!(all.subsystems.len(), 4);

        let one_degraded = run_probes(&probes([Healthy, Degraded, Healthy, Unhealthy]), |_| 0.0, TIMEOUT).await;
        assert_eq!(one_degraded.overall, Degraded);

        let unhealthy = run_probes(&probes([Healthy, Unhealthy, Healthy, Healthy]), |_| 0.0, TIMEOUT).await;
        assert_eq!(unhealthy.overall, Unhealthy);
    }

    #[tokio::test]
    async fn test_probe_failure_is_contained() {
        let probes: Vec<Arc<dyn HealthProbe>> = vec![
            Arc::new(Fixed(Subsystem::Sensors, HealthStatus::Healthy)),
            Arc::new(Failing),
            Arc::new(Hanging),
            Arc::new(Fixed(Subsystem::Storage, HealthStatus::Healthy)),
        ];
        let result = run_probes(&probes, |_| 0.0, TIMEOUT).await;
        assert_eq!(result.subsystems.len(), 4);
        let ai = &result.subsystems[1];
        assert_eq!(ai.status, HealthStatus::Unhealthy);
        assert_eq!(ai.detail.as_deref(), Some("backend refused"));
        let net = &result.subsystems[2];
        assert_eq!(net.status, HealthStatus::Unhealthy);
        assert!(net.detail.as_deref().unwrap().contains("timed out"));
        assert_eq!(result.subsystems[0].status, HealthStatus::Healthy);
        assert_eq!(result.overall, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_storage_probe_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let probe = StorageProbe { store: store.clone() };
        let reading = probe.probe(ProbeInput { error_rate: 0.0 }).await.unwrap();
        assert_eq!(reading.status, HealthStatus::Healthy);
        assert!(reading.latency_ms.is_some());
        assert_eq!(store.get(HEALTH_KEY).unwrap(), None);
    }

    /// Memory store whose writes stall the calling thread.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> Result<Option<String>, crate::store::StoreError> {
            self.inner.get(key)
        }
        fn put(&self, key: &str, value: &str) -> Result<(), crate::store::StoreError> {
            std::thread::sleep(self.delay);
            self.inner.put(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), crate::store::StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_slow_storage_does_not_stall_the_runtime() {
        let probe = StorageProbe {
            store: Arc::new(SlowStore {
                inner: MemoryStore::new(),
                delay: Duration::from_millis(300),
            }),
        };
        let started = Instant::now();
        let ticker = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            started.elapsed()
        };
        // Single-threaded runtime: the ticker only wakes on time if the
        // round-trip runs elsewhere.
        let (reading, ticked_after) = tokio::join!(probe.probe(ProbeInput { error_rate: 0.0 }), ticker);
        assert!(ticked_after < Duration::from_millis(200), "{ticked_after:?}");
        assert_eq!(reading.unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_sensor_probe_tracks_activity() {
        let activity = Arc::new(SensorActivity::default());
        let probe = SensorProbe {
            activity: activity.clone(),
        };
        let idle = probe.probe(ProbeInput { error_rate: 0.0 }).await.unwrap();
        assert_eq!(idle.status, HealthStatus::Degraded);

        activity.touch();
        let live = probe.probe(ProbeInput { error_rate: 0.0 }).await.unwrap();
        assert_eq!(live.status, HealthStatus::Healthy);

        let noisy = probe.probe(ProbeInput { error_rate: 6.0 }).await.unwrap();
        assert_eq!(noisy.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_status_for_rate() {
        assert_eq!(status_for_rate(0.2), HealthStatus::Healthy);
        assert_eq!(status_for_rate(1.0), HealthStatus::Degraded);
        assert_eq!(status_for_rate(5.0), HealthStatus::Unhealthy);
    }
}
