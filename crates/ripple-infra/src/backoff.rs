//! Capped exponential backoff with jitter for transport reconnects.

use std::time::Duration;

use rand::Rng;
use ripple_types::config::ReconnectConfig;

/// Reconnect delay schedule.
///
/// Grows geometrically from the configured initial delay up to the cap,
/// optionally jittered within [delay/2, delay]. `reset` after a successful
/// connection restores the prompt first retry.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next reconnect attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.config.initial_delay_ms as f64
            * self.config.multiplier.powi(self.attempt.min(31) as i32);
        let capped = exp.min(self.config.max_delay_ms as f64).max(0.0);
        self.attempt = self.attempt.saturating_add(1);

        let ms = if self.config.jitter && capped > 0.0 {
            rand::thread_rng().gen_range((capped / 2.0)..=capped)
        } else {
            capped
        };
        Duration::from_millis(ms as u64)
    }

    /// Restore the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
