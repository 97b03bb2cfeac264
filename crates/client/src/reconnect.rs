use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::config::ClientConfig;

/// What the UI shows about the live channel. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting { attempt: u32 },
    Connected { channel_id: String },
    Reconnecting { attempt: u32, delay_ms: u64 },
    Disconnected { reason: String },
    Rejected,
    GaveUp,
}

/// Exponential backoff with up to 25% jitter and a retry cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_retries: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max,
            max_retries,
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once the cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }

        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << self.attempt.min(20));
        let capped_ms = exp_ms.min(max_ms);
        let jitter_ms = rand::rng().random_range(0..=capped_ms / 4);

        self.attempt += 1;
        Some(Duration::from_millis((capped_ms + jitter_ms).min(max_ms)))
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl From<&ClientConfig> for Backoff {
    fn from(config: &ClientConfig) -> Self {
        Self::new(config.backoff_base, config.backoff_max, config.max_retries)
    }
}
