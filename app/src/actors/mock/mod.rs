//! Synthetic producers for running the full pipeline without hardware.

pub mod round;
pub mod sensor;

/// Seed from wall-clock time.
pub(crate) fn now_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Linear congruential step; returns the high bits.
pub(crate) fn next_rand(seed: &mut u64) -> usize {
    *seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*seed >> 33) as usize
}
