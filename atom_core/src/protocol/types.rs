/**
 * Core wire and pipeline types.
 *
 * The outermost structure POSTed to the collector is `AtomRequest`:
 *
 * ```json
 * { "table": "<stream>", "data": "<payload>", "auth": "<hex-hmac>", "bulk": true }
 * ```
 *
 * `auth` and `bulk` are omitted when absent. For bulk requests `data` is the
 * JSON-encoded array of payloads: the array is stringified first, then the
 * envelope is stringified. The double encoding is a wire-compat requirement
 * of the collection service and must not be collapsed.
 */
use serde::Serialize;

use crate::error::AtomError;
use crate::protocol::auth;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/**
 * One tracked event: a destination stream and a JSON payload string.
 *
 * Immutable after construction. Produced by `track()`, consumed exactly once
 * by the tracker handler.
 */
#[derive(Debug, Clone)]
pub struct Event {
    /// Logical destination name ("table") at the collection service.
    pub stream: String,

    /// UTF-8 JSON payload, passed through verbatim.
    pub data: String,
}

impl Event {
    pub fn new(stream: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            data: data.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/**
 * HTTP method for single-event delivery. Batches always POST.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Post,
    Get,
}

// ---------------------------------------------------------------------------
// AtomRequest, the envelope
// ---------------------------------------------------------------------------

/**
 * The request envelope, borrowed from the caller's buffers.
 *
 * Field order matters: the collector's examples show `table`, `data`,
 * `auth`, `bulk`, and serde serializes in declaration order.
 */
#[derive(Debug, Serialize)]
pub struct AtomRequest<'a> {
    /// Destination stream name.
    pub table: &'a str,

    /// Payload string. For bulk requests, the stringified JSON array.
    pub data: &'a str,

    /// Lowercase-hex HMAC-SHA256 over the `data` bytes. Omitted when the
    /// effective auth key is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    /// Present (and `true`) only on the bulk path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk: Option<bool>,
}

impl<'a> AtomRequest<'a> {
    /**
     * Builds a single-event envelope. The `auth` tag is computed over
     * `data` unless `auth_key` is empty.
     */
    pub fn new(table: &'a str, data: &'a str, auth_key: &str) -> Self {
        let auth = if auth_key.is_empty() {
            None
        } else {
            Some(auth::hmac_hex(auth_key, data))
        };
        Self {
            table,
            data,
            auth,
            bulk: None,
        }
    }

    /// Marks the envelope as a bulk request.
    pub fn bulk(mut self) -> Self {
        self.bulk = Some(true);
        self
    }

    /// Serializes the envelope to the JSON string that goes on the wire.
    pub fn encode(&self) -> Result<String, AtomError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/**
 * Outcome of one HTTP exchange with the collector.
 *
 * Exactly one of `data` / `error` is populated:
 * - 2xx/3xx: `data` holds the response body.
 * - anything else: `error` holds the body, or a synthesized message when the
 *   request never reached the server.
 */
#[derive(Debug, Clone)]
pub struct Response {
    /// Error description for non-success outcomes.
    pub error: Option<String>,

    /// Response body for success outcomes.
    pub data: Option<String>,

    /// HTTP status, or a synthesized 500/400 for transport failures.
    pub status: u16,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}
