/*!
 * Atom Rust SDK: client library for the Atom event-collection service.
 *
 * Two API levels:
 *
 * - [`Atom`] is the synchronous low-level client. One call, one HTTP
 *   request, one [`Response`]. No buffering, no retries.
 * - [`Tracker`] is the asynchronous pipeline. `track()` enqueues and
 *   returns; background threads assemble per-stream batches (bounded by
 *   count, bytes, and time), transmit them through a worker pool, and
 *   retry server errors with full-jitter exponential backoff. Failures
 *   are reported through an error callback, never to the producer.
 *
 * # Module structure
 *
 * - `protocol/`: what we send (envelope, events, HMAC auth tag)
 * - `transport/`: how we deliver (blocking HTTP, batch worker pool)
 * - `client`: the synchronous API surface
 * - `tracker/`: backlog, handler, flusher, retry dispatch, lifecycle
 *
 * # Example
 *
 * ```ignore
 * use atom_core::{Tracker, TrackerOptions};
 *
 * let tracker = Tracker::new(TrackerOptions {
 *     auth_key: "STREAM_SECRET".into(),
 *     ..Default::default()
 * })?;
 *
 * tracker.track("analytics.clicks", r#"{"button":"signup"}"#);
 * tracker.stop();
 * ```
 */

mod client;
mod config;
mod error;
mod protocol;
mod tracker;
mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::Atom;
pub use config::{AtomOptions, TrackerOptions, ATOM_ENDPOINT, SDK_TYPE, SDK_VERSION};
pub use error::{AtomError, DeliveryFailure, OnErrorCallback};
pub use protocol::types::{Event, Method, Response};
pub use tracker::Tracker;
