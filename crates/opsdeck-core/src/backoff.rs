use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnect schedule for the change feed: exponential, capped, jittered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Fraction of each delay that may be shaved off at random, in `[0, 1]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay before reconnect attempt `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exp);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay with jitter applied; always within `[base * (1 - jitter), base]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter == 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=1.0);
        base.mul_f64(factor)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}
