//! Recovery strategy per error kind and the bounded retry helper.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use swingsense::{ErrorCategory, ErrorKind, RecoveryStrategy};

pub const RETRY_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
pub const MAX_BACKOFF_MS: u64 = 30_000;

const DEFAULT_RETRY: RecoveryStrategy = RecoveryStrategy::Retry {
    max_attempts: RETRY_ATTEMPTS,
    initial_backoff_ms: INITIAL_BACKOFF_MS,
    max_backoff_ms: MAX_BACKOFF_MS,
};

pub fn recovery_strategy(kind: ErrorKind) -> RecoveryStrategy {
    if !kind.is_recoverable() {
        return RecoveryStrategy::UserAction;
    }
    match kind {
        ErrorKind::CalibrationRequired => RecoveryStrategy::Recalibrate,
        ErrorKind::DeviceNotPaired => RecoveryStrategy::UserAction,
        ErrorKind::DataCorrupted => RecoveryStrategy::Discard,
        ErrorKind::ProcessingTimeout => RecoveryStrategy::Fallback,
        _ => match kind.category() {
            ErrorCategory::Hardware
            | ErrorCategory::AiService
            | ErrorCategory::Network
            | ErrorCategory::Storage => DEFAULT_RETRY,
            ErrorCategory::Analysis => RecoveryStrategy::Fallback,
            ErrorCategory::UserContext => RecoveryStrategy::UserAction,
            ErrorCategory::Validation | ErrorCategory::Resource => RecoveryStrategy::Discard,
        },
    }
}

/// Delay before retry number `attempt` (0-based), or None once attempts are
/// exhausted or the strategy is not a retry.
pub fn backoff_delay(strategy: &RecoveryStrategy, attempt: u32) -> Option<Duration> {
    let RecoveryStrategy::Retry {
        max_attempts,
        initial_backoff_ms,
        max_backoff_ms,
    } = *strategy
    else {
        return None;
    };
    if attempt + 1 >= max_attempts {
        return None;
    }
    let ms = initial_backoff_ms
        .saturating_mul(1u64 << attempt.min(32))
        .min(max_backoff_ms);
    Some(Duration::from_millis(ms))
}

/// Run `op` until it succeeds or the strategy gives up. Returns the last
/// error on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(
    strategy: &RecoveryStrategy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match backoff_delay(strategy, attempt) {
                Some(delay) => {
                    warn!("{label}: attempt {} failed ({e}), retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_strategies_by_kind() {
        assert_eq!(recovery_strategy(ErrorKind::NetworkTimeout), DEFAULT_RETRY);
        assert_eq!(recovery_strategy(ErrorKind::AiRateLimited), DEFAULT_RETRY);
        assert_eq!(recovery_strategy(ErrorKind::PermissionDenied), RecoveryStrategy::UserAction);
        assert_eq!(recovery_strategy(ErrorKind::MemoryLimitExceeded), RecoveryStrategy::UserAction);
        assert_eq!(recovery_strategy(ErrorKind::CalibrationRequired), RecoveryStrategy::Recalibrate);
        assert_eq!(recovery_strategy(ErrorKind::PatternMatchingFailed), RecoveryStrategy::Fallback);
        assert_eq!(recovery_strategy(ErrorKind::InsufficientData), RecoveryStrategy::Discard);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let s = RecoveryStrategy::Retry {
            max_attempts: 8,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        };
        let delays: Vec<u64> = (0..8)
            .map_while(|a| backoff_delay(&s, a))
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
        assert_eq!(backoff_delay(&RecoveryStrategy::Fallback, 0), None);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let s = RecoveryStrategy::Retry {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        let out: Result<u32, String> = retry_with_backoff(&s, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(format!("fail {n}")) } else { Ok(n) } }
        })
        .await;
        assert_eq!(out, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let s = RecoveryStrategy::Retry {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        let out: Result<(), &str> = retry_with_backoff(&s, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;
        assert_eq!(out, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let _ = retry_with_backoff(&RecoveryStrategy::Discard, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("once") }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
