/**
 * Error types and the asynchronous failure report.
 *
 * Two distinct surfaces:
 * - `AtomError` is returned by the synchronous low-level API (`Atom`) and by
 *   `Tracker` construction.
 * - `DeliveryFailure` is pushed through the user's `OnErrorCallback` for
 *   everything that goes wrong after `track()` has returned. The tracker
 *   never propagates transmission errors to the producer.
 */
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

// ---------------------------------------------------------------------------
// AtomError
// ---------------------------------------------------------------------------

/**
 * Errors surfaced synchronously by the SDK.
 */
#[derive(Debug, Error)]
pub enum AtomError {
    /// Input rejected before any request was attempted (empty stream name,
    /// empty batch).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payload could not be encoded as JSON.
    #[error("failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The per-stream backlog is at capacity.
    #[error("backlog for stream `{stream}` is full")]
    BacklogFull { stream: String },

    /// The tracker has been stopped and accepts no further events.
    #[error("tracker is stopped")]
    Stopped,

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// DeliveryFailure + OnErrorCallback
// ---------------------------------------------------------------------------

/**
 * A single asynchronous failure report.
 *
 * Carries everything the application needs to decide what to do with the
 * affected data: re-track it, persist it, or drop it.
 */
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    /// Unix timestamp (seconds, fractional) at which the failure was recorded.
    pub unix_time: f64,

    /// HTTP-style status: the server's status for remote failures, 400 for
    /// local ones (encoding, validation, backlog overflow).
    pub status: u16,

    /// Human-readable description of the failure.
    pub error: String,

    /// The affected payloads. One element for a failed `track()`, the whole
    /// batch for a failed delivery.
    pub data: Vec<String>,

    /// The stream the data was destined for.
    pub stream: String,
}

impl DeliveryFailure {
    pub(crate) fn new(status: u16, error: String, data: Vec<String>, stream: &str) -> Self {
        Self {
            unix_time: unix_time(),
            status,
            error,
            data,
            stream: stream.to_string(),
        }
    }
}

/**
 * User-provided sink for asynchronous delivery failures.
 *
 * Invoked from tracker and worker threads: implementations must be
 * non-blocking and thread-safe.
 */
pub type OnErrorCallback = Arc<dyn Fn(DeliveryFailure) + Send + Sync>;

/// Current wall-clock time as fractional seconds since the Unix epoch.
fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
