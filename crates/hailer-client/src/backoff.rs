//! Reconnect delay: `min(max, base · 2^(attempt-1))`, scaled by a uniform
//! jitter factor in `[1 - jitter, 1 + jitter]`.

use std::time::Duration;

use rand::Rng;

/// Capped exponential backoff with proportional jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    /// Fraction of the nominal delay, e.g. `0.2` for ±20%.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_millis(8000),
            jitter: 0.2,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn nominal(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << doublings)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Delay before retry number `attempt`, with jitter drawn from `rng`.
    pub fn delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let nominal = self.nominal(attempt);
        if self.jitter <= 0.0 {
            return nominal;
        }
        let factor = 1.0 + rng.gen_range(-self.jitter..=self.jitter);
        nominal.mul_f64(factor.max(0.0))
    }
}
