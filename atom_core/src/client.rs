/**
 * The synchronous low-level API.
 *
 * `Atom` issues one request per call and hands back the raw `Response`;
 * there is no buffering, no retries, and no background work. Applications
 * that need the asynchronous pipeline should use `Tracker`, which is built
 * on top of this client.
 */
use serde::Serialize;

use crate::config::AtomOptions;
use crate::error::AtomError;
use crate::protocol::types::{AtomRequest, Method, Response};
use crate::transport::HttpSender;

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/**
 * Synchronous client for the collection service.
 *
 * Owns the HTTP sender, the resolved endpoint, and the default auth key.
 * Cheap to share behind an `Arc`; all methods take `&self`.
 */
pub struct Atom {
    sender: HttpSender,
    endpoint: String,
    auth_key: String,
}

impl Atom {
    /**
     * Builds a client from options.
     *
     * Fails only if the HTTP client cannot be constructed (e.g. the TLS
     * backend is unavailable).
     */
    pub fn new(options: AtomOptions) -> Result<Self, AtomError> {
        let sender = HttpSender::new(options.request_timeout)?;

        /* The bulk path is formed by appending "bulk" to the endpoint, so
         * the endpoint must end with a slash. */
        let mut endpoint = options.endpoint;
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Ok(Self {
            sender,
            endpoint,
            auth_key: options.auth_key,
        })
    }

    /// The resolved base endpoint (always slash-terminated).
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The default auth key, possibly empty.
    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    /**
     * Sends a single event.
     *
     * `data` is the JSON payload string, passed through verbatim. An empty
     * `auth_key` falls back to the client default; an empty default omits
     * the `auth` field entirely.
     *
     * Transport failures do not raise: they come back as a synthesized
     * `Response` (status 500 for connection problems, 400 otherwise).
     */
    pub fn put_event(
        &self,
        stream: &str,
        data: &str,
        method: Method,
        auth_key: &str,
    ) -> Result<Response, AtomError> {
        if stream.is_empty() {
            return Err(AtomError::InvalidInput("stream name must not be empty".into()));
        }

        let key = self.resolve_key(auth_key);
        let body = AtomRequest::new(stream, data, key).encode()?;

        Ok(match method {
            Method::Post => self.sender.post(&self.endpoint, body),
            Method::Get => self.sender.get(&self.endpoint, &body),
        })
    }

    /**
     * Sends a batch of events in one request.
     *
     * The batch is JSON-encoded into a single array string which becomes the
     * envelope's `data` field (the service's double-encoding contract), and
     * the request POSTs to `<endpoint>bulk`.
     *
     * Accepts any serializable element type: the tracker passes
     * pre-stringified payloads (`String`), direct callers may pass
     * structured values.
     */
    pub fn put_events<T: Serialize>(
        &self,
        stream: &str,
        data: &[T],
        auth_key: &str,
    ) -> Result<Response, AtomError> {
        if stream.is_empty() {
            return Err(AtomError::InvalidInput("stream name must not be empty".into()));
        }
        if data.is_empty() {
            return Err(AtomError::InvalidInput(
                "batch must contain at least one event".into(),
            ));
        }

        let key = self.resolve_key(auth_key);
        let array = serde_json::to_string(data)?;
        let body = AtomRequest::new(stream, &array, key).bulk().encode()?;

        Ok(self.sender.post(&self.bulk_url(), body))
    }

    fn bulk_url(&self) -> String {
        format!("{}bulk", self.endpoint)
    }

    /// Per-call key when given, client default otherwise.
    fn resolve_key<'a>(&'a self, auth_key: &'a str) -> &'a str {
        if auth_key.is_empty() {
            &self.auth_key
        } else {
            auth_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Atom {
        Atom::new(AtomOptions {
            endpoint: "http://localhost:9".into(),
            auth_key: "default-key".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let atom = client();
        assert_eq!(atom.endpoint(), "http://localhost:9/");
        assert_eq!(atom.bulk_url(), "http://localhost:9/bulk");
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        let atom = client();
        let err = atom.put_event("", "{}", Method::Post, "").unwrap_err();
        assert!(matches!(err, AtomError::InvalidInput(_)));

        let err = atom
            .put_events("", &[r#"{"a":1}"#.to_string()], "")
            .unwrap_err();
        assert!(matches!(err, AtomError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let atom = client();
        let err = atom.put_events::<String>("s", &[], "").unwrap_err();
        assert!(matches!(err, AtomError::InvalidInput(_)));
    }

    #[test]
    fn test_default_key_fallback() {
        let atom = client();
        assert_eq!(atom.resolve_key(""), "default-key");
        assert_eq!(atom.resolve_key("explicit"), "explicit");
    }

    /**
     * Port 9 (discard) refuses connections, so the sender synthesizes a
     * status 500 response instead of raising.
     */
    #[test]
    fn test_unreachable_server_maps_to_synthetic_500() {
        let atom = client();
        let response = atom.put_event("s", "{}", Method::Post, "").unwrap();
        assert_eq!(response.status, 500);
        assert!(response.error.unwrap().contains("No connection to server"));
    }
}
