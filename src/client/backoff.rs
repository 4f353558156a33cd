use std::time::Duration;

use crate::config::ReconnectSettings;

/// Fraction of the exponential delay added on top as random jitter.
const JITTER_FACTOR: f64 = 0.3;

/// What to do after the connection was lost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Wait this long, then try to connect again.
    Retry(Duration),
    /// The attempt ceiling was reached.
    GiveUp,
}

/// Exponential backoff with additive jitter and an optional attempt ceiling.
///
/// Attempt `n` (0-based) waits `min(base * 2^n, cap)` plus up to 30% of that
/// value. Jitter only ever lengthens the delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides the next step given how many reconnects were already scheduled
    /// since the last successful connect.
    pub fn decide(&self, attempt: u32) -> Backoff {
        if self.max_attempts > 0 && attempt >= self.max_attempts {
            return Backoff::GiveUp;
        }
        Backoff::Retry(self.delay_with_jitter(attempt, rand::random::<f64>()))
    }

    /// Delay before jitter: `min(base * 2^attempt, cap)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.cap)
    }

    /// Delay for `attempt` with a caller-supplied jitter sample in `[0, 1)`.
    pub fn delay_with_jitter(&self, attempt: u32, sample: f64) -> Duration {
        let delay = self.base_delay(attempt);
        let sample = sample.clamp(0.0, 1.0);
        delay + delay.mul_f64(JITTER_FACTOR * sample)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectSettings {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 0,
        })
    }
}

impl From<&ReconnectSettings> for ReconnectPolicy {
    fn from(settings: &ReconnectSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.max_attempts,
        )
    }
}
