/**
 * Blocking HTTP sender.
 *
 * One request, one `Response`, no retries and no state beyond the pooled
 * connections inside `reqwest::blocking::Client`. Retry policy lives in the
 * tracker's dispatch loop, not here.
 *
 * Outcome mapping:
 * - 2xx/3xx: body becomes `Response::data`.
 * - 4xx and up: body becomes `Response::error`.
 * - connect/timeout failure: synthesized status 500, "No connection to
 *   server". The dispatch loop retries these like any server error.
 * - any other request failure: synthesized status 400, not retried.
 */
use std::time::Duration;

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::{SDK_TYPE, SDK_VERSION};
use crate::error::AtomError;
use crate::protocol::types::Response;

/**
 * Thin wrapper around `reqwest::blocking::Client`.
 *
 * Every request carries the SDK identification headers; POST bodies are the
 * pre-serialized envelope string with `Content-Type: application/json`.
 */
pub struct HttpSender {
    http: reqwest::blocking::Client,
}

impl HttpSender {
    /**
     * Builds the client with the SDK headers installed as defaults and the
     * given total request timeout.
     */
    pub fn new(request_timeout: Duration) -> Result<Self, AtomError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ironsource-atom-sdk-type",
            HeaderValue::from_static(SDK_TYPE),
        );
        headers.insert(
            "x-ironsource-atom-sdk-version",
            HeaderValue::from_static(SDK_VERSION),
        );

        let http = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http })
    }

    /// POSTs a serialized envelope to `url`.
    pub fn post(&self, url: &str, body: String) -> Response {
        let result = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send();

        into_response(result)
    }

    /**
     * Sends a serialized envelope via GET.
     *
     * The whole envelope is base64-encoded (standard alphabet, no line
     * breaks) and passed as the `data` query parameter.
     */
    pub fn get(&self, url: &str, body: &str) -> Response {
        let encoded = base64::engine::general_purpose::STANDARD.encode(body);
        let result = self
            .http
            .get(url)
            .query(&[("data", encoded.as_str())])
            .send();

        into_response(result)
    }
}

/**
 * Maps a reqwest outcome to the `Response` record.
 *
 * Never panics: an unreadable body degrades to a placeholder string.
 */
fn into_response(result: reqwest::Result<reqwest::blocking::Response>) -> Response {
    match result {
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response
                .text()
                .unwrap_or_else(|_| "<unreadable body>".into());

            if (200..400).contains(&status) {
                Response {
                    error: None,
                    data: Some(body),
                    status,
                }
            } else {
                Response {
                    error: Some(body),
                    data: None,
                    status,
                }
            }
        }
        Err(err) if err.is_connect() || err.is_timeout() => Response {
            error: Some(format!("No connection to server: {err}")),
            data: None,
            status: 500,
        },
        Err(err) => Response {
            error: Some(err.to_string()),
            data: None,
            status: 400,
        },
    }
}
