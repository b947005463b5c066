use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::constants::DEFAULT_DELAY_STEP_MS;
use crate::constants::DEFAULT_FREE_RETRIES;
use crate::constants::DEFAULT_MAX_DELAY_MS;
use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::constants::DEFAULT_WATCH_BUFFER;

/// Watch session tuning: channel sizing, resubscription backoff, and
/// the polling cadence used against backends without a native feed.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WatchPolicy {
    /// Notification channel capacity
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Resubscription attempts made immediately, before any delay
    #[serde(default = "default_free_retries")]
    pub free_retries: u32,

    /// Backoff increment per attempt past the free ones (unit: milliseconds)
    #[serde(default = "default_delay_step_ms")]
    pub delay_step_ms: u64,

    /// Backoff ceiling (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Point-read cadence for emulated watches (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            free_retries: default_free_retries(),
            delay_step_ms: default_delay_step_ms(),
            max_delay_ms: default_max_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchPolicy {
    /// Delay before resubscription attempt number `retries`.
    ///
    /// Zero through the first `free_retries` attempts, then grows by
    /// `delay_step_ms` per attempt up to `max_delay_ms`. Up to 10%
    /// jitter is added so recovering watchers do not stampede a
    /// degraded backend in lockstep.
    pub fn backoff(&self, retries: u32) -> Duration {
        if retries <= self.free_retries {
            return Duration::ZERO;
        }
        let excess = u64::from(retries - self.free_retries);
        let base = self
            .delay_step_ms
            .saturating_mul(excess)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=base / 10);
        Duration::from_millis(base + jitter)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_WATCH_BUFFER
}
fn default_free_retries() -> u32 {
    DEFAULT_FREE_RETRIES
}
fn default_delay_step_ms() -> u64 {
    DEFAULT_DELAY_STEP_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
