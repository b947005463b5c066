// -
// Store defaults

/// Root prefix when none is configured.
pub(crate) const DEFAULT_ROOT: &str = "/";

/// Watch notification channel capacity.
pub(crate) const DEFAULT_WATCH_BUFFER: usize = 10;

// -
// Resubscription backoff

/// Attempts that reopen the feed immediately, before any delay.
pub(crate) const DEFAULT_FREE_RETRIES: u32 = 10;

/// Per-attempt backoff increment once free retries are spent (ms).
pub(crate) const DEFAULT_DELAY_STEP_MS: u64 = 1_000;

/// Backoff ceiling (ms).
pub(crate) const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Point-read cadence for backends without a native change feed (ms).
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
