//! Synthetic motion streams shared by unit tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use swingsense::MotionSample;

use crate::actors::mock::sensor::{swing_magnitude, swing_rotation};
use crate::store::{KeyValueStore, MemoryStore, StoreError};

const STEP_MS: u64 = 10;

/// `n` still readings at 100 Hz starting at `start_ms`.
pub fn quiet_samples(start_ms: u64, n: usize) -> Vec<MotionSample> {
    (0..n as u64)
        .map(|i| MotionSample::new(start_ms + i * STEP_MS, [0.1, 0.0, 0.0], [0.0, 0.0, 0.01]))
        .collect()
}

/// Acceleration magnitude of the reference swing `t` ms into the stream.
pub fn swing_profile(t: u64) -> f64 {
    swing_magnitude(t, 1.0)
}

/// One full noiseless swing, 2.6s at 100 Hz, timestamps offset by
/// `start_ms`. Accel split 0.8/0.6 across x/y keeps the magnitude exact.
pub fn synthetic_swing(start_ms: u64) -> Vec<MotionSample> {
    (0..260u64)
        .map(|i| {
            let t = i * STEP_MS;
            let mag = swing_profile(t);
            MotionSample::new(
                start_ms + t,
                [mag * 0.8, mag * 0.6, 0.0],
                swing_rotation(t, mag),
            )
        })
        .collect()
}

/// Store whose first `failing_gets` reads fail with a transient I/O error.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing_gets: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, failing_gets: usize) -> Self {
        Self {
            inner,
            failing_gets: AtomicUsize::new(failing_gets),
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let failing = self
            .failing_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::Interrupted, "disk busy"),
            });
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}
