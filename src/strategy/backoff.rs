//! Exponential backoff
//!
//! delay(n) = base × 2^(n−1), capped at a ceiling:
//! - Non-decreasing in the attempt number
//! - Constant at the ceiling once reached
//! - Optional jitter, derived from a seed so identical inputs give identical delays

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Base delay for exponential backoff (1 second)
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Maximum delay cap (30 seconds)
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Backoff calculator
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum delay cap in milliseconds
    max_delay_ms: u64,

    /// Upper bound of jitter as a fraction of the delay (0 disables)
    jitter_ratio: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    /// Create backoff with default settings
    pub fn new() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ratio: 0.0,
        }
    }

    /// Create backoff with custom base and ceiling
    pub fn with_config(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_ratio: 0.0,
        }
    }

    /// Enable jitter of up to `ratio` × delay
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 1u64 << exponent;
        let exponential_delay = self.base_delay_ms.saturating_mul(factor);

        Duration::from_millis(exponential_delay.min(self.max_delay_ms))
    }

    /// Delay with deterministic jitter, still capped at the ceiling
    pub fn jittered_delay(&self, attempt: u32, seed: u64) -> Duration {
        let delay_ms = self.delay(attempt).as_millis() as u64;
        if self.jitter_ratio <= 0.0 {
            return Duration::from_millis(delay_ms);
        }

        let mut rng = StdRng::seed_from_u64(seed ^ u64::from(attempt));
        let jitter = (rng.gen_range(0.0..=self.jitter_ratio) * delay_ms as f64) as u64;

        Duration::from_millis(delay_ms.saturating_add(jitter).min(self.max_delay_ms))
    }
}
