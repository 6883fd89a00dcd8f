//! Randomized send delay so replies do not arrive instantly.

use rand::Rng;

/// Uniform delay in `[min_ms, max_ms]`, inclusive. An inverted window yields `min_ms`.
pub fn choose_delay(min_ms: u64, max_ms: u64) -> u64 {
    if max_ms <= min_ms {
        return min_ms;
    }
    rand::thread_rng().gen_range(min_ms..=max_ms)
}
