/**
 * SDK defaults, hard limits, and configuration options.
 *
 * Every numeric tracker option is validated at construction time against a
 * documented minimum. An out-of-range value is not an error: the tracker
 * logs a warning and substitutes the default, so a misconfigured application
 * still ships events.
 */
use std::time::Duration;

use log::warn;

use crate::error::OnErrorCallback;

// ---------------------------------------------------------------------------
// Wire identity
// ---------------------------------------------------------------------------

/// Default Atom collection endpoint. The bulk path is `<endpoint>bulk`.
pub const ATOM_ENDPOINT: &str = "http://track.atom-data.io/";

/// Value of the `x-ironsource-atom-sdk-type` header.
pub const SDK_TYPE: &str = "atom-rust";

/// Value of the `x-ironsource-atom-sdk-version` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Tracker defaults and limits
// ---------------------------------------------------------------------------

/// Count trigger: events per batch.
pub const BATCH_SIZE: usize = 500;

/// Upper bound accepted for `batch_size`.
pub const BATCH_SIZE_LIMIT: usize = 2000;

/// Size trigger: accumulated UTF-8 bytes per batch.
pub const BATCH_BYTES_SIZE: usize = 64 * 1024;

/// Upper bound accepted for `batch_bytes_size`.
pub const BATCH_BYTES_SIZE_LIMIT: usize = 9 * 1024 * 1024;

/// Smallest accepted `batch_bytes_size`.
pub const MIN_BATCH_BYTES_SIZE: usize = 1024;

/// Periodic flush cadence in milliseconds.
pub const FLUSH_INTERVAL_MS: u64 = 10_000;

/// Smallest accepted flush interval.
pub const MIN_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Worker threads servicing the batch pool.
pub const BATCH_WORKER_COUNT: usize = 1;

/// Capacity of the batch pool task queue.
pub const BATCH_POOL_SIZE: usize = 1;

/// Per-stream backlog capacity.
pub const BACKLOG_SIZE: usize = 500;

/// Cap on a single backoff delay, in seconds.
pub const RETRY_MAX_TIME_SECS: u64 = 1800;

/// Smallest accepted `retry_max_time`.
pub const MIN_RETRY_MAX_TIME_SECS: u64 = 120;

/// Attempts before a batch is surrendered (ignored while `retry_forever`).
pub const RETRY_MAX_COUNT: u32 = 12;

/// Base multiplier for exponential backoff, in seconds.
pub const RETRY_EXPO_BACKOFF_BASE_SECS: u64 = 3;

/// Retry server errors until shutdown rather than surrendering.
pub const RETRY_FOREVER: bool = true;

/// Backlog overflow discipline: wait for a slot rather than fail fast.
pub const BACKLOG_BLOCKING: bool = true;

/// How long a blocking `track()` waits for a backlog slot.
pub const BACKLOG_TIMEOUT: Duration = Duration::from_secs(1);

/// HTTP request timeout (connect + response).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// AtomOptions
// ---------------------------------------------------------------------------

/**
 * Options for the synchronous low-level client (`Atom`).
 */
pub struct AtomOptions {
    /// Base endpoint URL. A trailing slash is appended when missing.
    pub endpoint: String,

    /// Default HMAC auth key, used whenever a call passes an empty key.
    /// Empty means unauthenticated: the `auth` field is omitted on the wire.
    pub auth_key: String,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

impl Default for AtomOptions {
    fn default() -> Self {
        Self {
            endpoint: ATOM_ENDPOINT.to_string(),
            auth_key: String::new(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackerOptions
// ---------------------------------------------------------------------------

/**
 * Options for the asynchronous `Tracker`.
 *
 * All fields have working defaults; override the ones you need:
 * ```ignore
 * let tracker = Tracker::new(TrackerOptions {
 *     auth_key: "SECRET".into(),
 *     batch_size: 100,
 *     ..Default::default()
 * })?;
 * ```
 */
pub struct TrackerOptions {
    /// Base endpoint URL.
    pub endpoint: String,

    /// Default HMAC auth key for streams tracked without an explicit key.
    pub auth_key: String,

    /// Periodic flush cadence in milliseconds. Minimum 1000.
    pub flush_interval_ms: u64,

    /// Count trigger: emit a batch once it holds this many events.
    /// Accepted range: 1 to `BATCH_SIZE_LIMIT`.
    pub batch_size: usize,

    /// Size trigger: emit a batch once its UTF-8 payload bytes reach this.
    /// Accepted range: `MIN_BATCH_BYTES_SIZE` to `BATCH_BYTES_SIZE_LIMIT`.
    pub batch_bytes_size: usize,

    /// Per-stream backlog capacity.
    pub backlog_size: usize,

    /// Worker threads transmitting batches. Minimum 1.
    pub batch_worker_count: usize,

    /// Capacity of the batch task queue. Minimum 1.
    pub batch_pool_size: usize,

    /// Cap on a single backoff delay, in seconds. Minimum 120.
    pub retry_max_time_secs: u64,

    /// Attempts before surrendering a batch. Minimum 1.
    /// Ignored while `retry_forever` is set.
    pub retry_max_count: u32,

    /// Keep retrying server errors until shutdown.
    pub retry_forever: bool,

    /// Backlog overflow discipline. Blocking waits up to `backlog_timeout`
    /// for a slot; non-blocking reports the overflow immediately.
    pub is_blocking: bool,

    /// Slot wait bound for the blocking discipline.
    pub backlog_timeout: Duration,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Sink for asynchronous delivery failures. Defaults to a no-op.
    pub on_error: Option<OnErrorCallback>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            endpoint: ATOM_ENDPOINT.to_string(),
            auth_key: String::new(),
            flush_interval_ms: FLUSH_INTERVAL_MS,
            batch_size: BATCH_SIZE,
            batch_bytes_size: BATCH_BYTES_SIZE,
            backlog_size: BACKLOG_SIZE,
            batch_worker_count: BATCH_WORKER_COUNT,
            batch_pool_size: BATCH_POOL_SIZE,
            retry_max_time_secs: RETRY_MAX_TIME_SECS,
            retry_max_count: RETRY_MAX_COUNT,
            retry_forever: RETRY_FOREVER,
            is_blocking: BACKLOG_BLOCKING,
            backlog_timeout: BACKLOG_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            on_error: None,
        }
    }
}

impl TrackerOptions {
    /**
     * Clamps every numeric option to its documented range.
     *
     * Violations are logged at `warn` level and replaced with the default,
     * never escalated: a misconfigured tracker still runs.
     */
    pub(crate) fn validated(mut self) -> Self {
        if self.flush_interval_ms < MIN_FLUSH_INTERVAL_MS {
            warn!(
                "flush_interval must be at least {MIN_FLUSH_INTERVAL_MS} ms, \
                 using default {FLUSH_INTERVAL_MS}"
            );
            self.flush_interval_ms = FLUSH_INTERVAL_MS;
        }
        if self.batch_size < 1 || self.batch_size > BATCH_SIZE_LIMIT {
            warn!(
                "batch_size must be between 1 and {BATCH_SIZE_LIMIT}, \
                 using default {BATCH_SIZE}"
            );
            self.batch_size = BATCH_SIZE;
        }
        if self.batch_bytes_size < MIN_BATCH_BYTES_SIZE
            || self.batch_bytes_size > BATCH_BYTES_SIZE_LIMIT
        {
            warn!(
                "batch_bytes_size must be between {MIN_BATCH_BYTES_SIZE} and \
                 {BATCH_BYTES_SIZE_LIMIT} bytes, using default {BATCH_BYTES_SIZE}"
            );
            self.batch_bytes_size = BATCH_BYTES_SIZE;
        }
        if self.backlog_size < 1 {
            warn!("backlog_size must be at least 1, using default {BACKLOG_SIZE}");
            self.backlog_size = BACKLOG_SIZE;
        }
        if self.batch_worker_count < 1 {
            warn!("batch_worker_count must be at least 1, using default {BATCH_WORKER_COUNT}");
            self.batch_worker_count = BATCH_WORKER_COUNT;
        }
        if self.batch_pool_size < 1 {
            warn!("batch_pool_size must be at least 1, using default {BATCH_POOL_SIZE}");
            self.batch_pool_size = BATCH_POOL_SIZE;
        }
        if self.retry_max_time_secs < MIN_RETRY_MAX_TIME_SECS {
            warn!(
                "retry_max_time must be at least {MIN_RETRY_MAX_TIME_SECS} s, \
                 using default {RETRY_MAX_TIME_SECS}"
            );
            self.retry_max_time_secs = RETRY_MAX_TIME_SECS;
        }
        if self.retry_max_count < 1 {
            warn!("retry_max_count must be at least 1, using default {RETRY_MAX_COUNT}");
            self.retry_max_count = RETRY_MAX_COUNT;
        }
        self
    }
}
