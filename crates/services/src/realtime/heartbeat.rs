use std::time::{Duration, Instant};

use qrmenu_config::RealtimeSettings;

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// How often the server pings.
    pub interval: Duration,
    /// Silence longer than this closes the channel.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&RealtimeSettings> for HeartbeatConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.ping_interval_secs),
            timeout: Duration::from_secs(settings.ping_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    Alive,
    Expired { silent_for: Duration },
}

/// Liveness bookkeeping for one channel. Time is passed in so the transport
/// decides the clock.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_seen: Instant,
}

impl Heartbeat {
    pub fn new(config: HeartbeatConfig, now: Instant) -> Self {
        Self {
            config,
            last_seen: now,
        }
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Any frame from the peer counts, not only pongs.
    pub fn record(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn check(&self, now: Instant) -> HeartbeatStatus {
        let silent_for = now.saturating_duration_since(self.last_seen);
        if silent_for > self.config.timeout {
            HeartbeatStatus::Expired { silent_for }
        } else {
            HeartbeatStatus::Alive
        }
    }
}
