/**
 * The send-task body: one batch, delivered or surrendered.
 *
 * Status bands decide everything:
 * - 200..400: delivered.
 * - 400..500: client fault, reported via callback, never retried.
 * - 500 and up: server fault, retried with full-jitter exponential backoff
 *   until success, shutdown, or (when not retrying forever) the attempt cap.
 *
 * A local error out of `put_events` (validation, encoding) is reported with
 * status 400 and not retried.
 */
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;

use crate::client::Atom;
use crate::config::RETRY_EXPO_BACKOFF_BASE_SECS;
use crate::error::{AtomError, DeliveryFailure, OnErrorCallback};
use crate::protocol::types::Response;

/// Log an info milestone once this many events have been delivered.
const MILESTONE_EVERY: usize = 1000;

// ---------------------------------------------------------------------------
// BatchSink
// ---------------------------------------------------------------------------

/**
 * The delivery seam the retry loop drives.
 *
 * `Atom` is the production implementation; tests substitute a scripted sink.
 */
pub(crate) trait BatchSink: Send + Sync {
    fn send_batch(
        &self,
        stream: &str,
        batch: &[String],
        auth_key: &str,
    ) -> Result<Response, AtomError>;
}

impl BatchSink for Atom {
    fn send_batch(
        &self,
        stream: &str,
        batch: &[String],
        auth_key: &str,
    ) -> Result<Response, AtomError> {
        self.put_events(stream, batch, auth_key)
    }
}

// ---------------------------------------------------------------------------
// BackoffPolicy
// ---------------------------------------------------------------------------

/**
 * Full-jitter exponential backoff: `uniform(0, min(cap, base * 2^attempt))`.
 *
 * The randomness spreads retry storms across a fleet after a shared outage
 * instead of synchronizing every client's reconnect.
 */
#[derive(Debug, Clone)]
pub(crate) struct BackoffPolicy {
    /// Base multiplier for the exponential term.
    pub base: Duration,

    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(cap_secs: u64) -> Self {
        Self {
            base: Duration::from_secs(RETRY_EXPO_BACKOFF_BASE_SECS),
            cap: Duration::from_secs(cap_secs),
        }
    }

    /// The delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self.base.as_secs_f64() * f64::from(2u32).powi(attempt as i32);
        let bounded = exponential.min(self.cap.as_secs_f64());
        Duration::from_secs_f64(rand::thread_rng().gen::<f64>() * bounded)
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/**
 * Everything a send-task needs besides the batch itself. Shared across all
 * workers through an `Arc`.
 */
pub(crate) struct Dispatcher {
    pub sink: Arc<dyn BatchSink>,
    pub backoff: BackoffPolicy,
    pub retry_forever: bool,
    pub retry_max_count: u32,
    pub running: Arc<AtomicBool>,
    pub on_error: OnErrorCallback,
    /// Events accepted by `track()` since the last milestone log.
    pub tracked: Arc<AtomicUsize>,
}

impl Dispatcher {
    /**
     * Runs one batch to a terminal outcome.
     *
     * Executes on a pool worker thread; sleeps between attempts are plain
     * thread sleeps and are not interrupted by shutdown. After shutdown the
     * loop surrenders the batch on its next wake.
     */
    pub fn send_with_retry(&self, stream: &str, auth_key: &str, batch: Vec<String>) {
        let mut attempt: u32 = 1;

        loop {
            let response = match self.sink.send_batch(stream, &batch, auth_key) {
                Ok(response) => response,
                Err(err) => {
                    self.report(400, err.to_string(), batch, stream);
                    return;
                }
            };

            if attempt == 1 {
                debug!(
                    "stream {stream}: status {} for a batch of {}",
                    response.status,
                    batch.len()
                );
            }

            if response.is_success() {
                self.note_milestone(&response);
                return;
            }

            if response.is_client_error() {
                self.report(
                    response.status,
                    response.error.unwrap_or_default(),
                    batch,
                    stream,
                );
                return;
            }

            /* Server error from here on. */
            if !self.retry_forever && attempt == self.retry_max_count {
                self.report(
                    500,
                    "retry max count reached, discarding data".into(),
                    batch,
                    stream,
                );
                return;
            }
            if !self.running.load(Ordering::Relaxed) {
                self.report(
                    500,
                    "server error while on graceful shutdown".into(),
                    batch,
                    stream,
                );
                return;
            }

            let delay = self.backoff.delay(attempt);
            warn!(
                "stream {stream}: status {} ({}), retrying in {:.2} s (attempt {attempt})",
                response.status,
                response.error.as_deref().unwrap_or("server error"),
                delay.as_secs_f64(),
            );
            attempt += 1;
            thread::sleep(delay);
        }
    }

    /// Invokes the user callback and logs the failure.
    fn report(&self, status: u16, message: String, data: Vec<String>, stream: &str) {
        error!("stream {stream}: status {status}: {message}");
        (self.on_error)(DeliveryFailure::new(status, message, data, stream));
    }

    /**
     * Logs an info line every `MILESTONE_EVERY` delivered events. The
     * counter is fed by `track()` and reset here.
     */
    fn note_milestone(&self, response: &Response) {
        if self.tracked.load(Ordering::Relaxed) >= MILESTONE_EVERY {
            self.tracked.store(0, Ordering::Relaxed);
            info!(
                "delivered {MILESTONE_EVERY} events, last status {}",
                response.status
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /**
     * A scripted sink: pops the next status from a list and records every
     * batch it was asked to send.
     */
    struct ScriptedSink {
        statuses: Mutex<Vec<u16>>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedSink {
        fn new(mut statuses: Vec<u16>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl BatchSink for ScriptedSink {
        fn send_batch(
            &self,
            _stream: &str,
            batch: &[String],
            _auth_key: &str,
        ) -> Result<Response, AtomError> {
            self.calls.lock().unwrap().push(batch.to_vec());
            let status = self.statuses.lock().unwrap().pop().unwrap_or(200);
            Ok(if (200..400).contains(&status) {
                Response { error: None, data: Some("ok".into()), status }
            } else {
                Response { error: Some(format!("status {status}")), data: None, status }
            })
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        sink: Arc<ScriptedSink>,
        failures: Arc<Mutex<Vec<DeliveryFailure>>>,
    }

    fn fixture(statuses: Vec<u16>, retry_forever: bool, retry_max_count: u32) -> Fixture {
        let sink = Arc::new(ScriptedSink::new(statuses));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_in_callback = Arc::clone(&failures);

        let dispatcher = Dispatcher {
            sink: Arc::clone(&sink) as Arc<dyn BatchSink>,
            /* Millisecond-scale cap keeps retry tests fast. */
            backoff: BackoffPolicy {
                base: Duration::from_millis(1),
                cap: Duration::from_millis(5),
            },
            retry_forever,
            retry_max_count,
            running: Arc::new(AtomicBool::new(true)),
            on_error: Arc::new(move |failure| {
                failures_in_callback.lock().unwrap().push(failure);
            }),
            tracked: Arc::new(AtomicUsize::new(0)),
        };

        Fixture { dispatcher, sink, failures }
    }

    fn batch() -> Vec<String> {
        vec![r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()]
    }

    #[test]
    fn test_success_on_first_attempt() {
        let f = fixture(vec![200], true, 12);
        f.dispatcher.send_with_retry("s", "", batch());

        assert_eq!(f.sink.calls.lock().unwrap().len(), 1);
        assert!(f.failures.lock().unwrap().is_empty());
    }

    /**
     * Two 502s then a 200: the batch is delivered exactly once and the
     * observed attempt count is three.
     */
    #[test]
    fn test_server_errors_are_retried_until_success() {
        let f = fixture(vec![502, 502, 200], true, 12);
        f.dispatcher.send_with_retry("s", "", batch());

        let calls = f.sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        /* Every attempt carries the identical batch. */
        assert!(calls.iter().all(|c| *c == batch()));
        assert!(f.failures.lock().unwrap().is_empty());
    }

    #[test]
    fn test_client_error_is_reported_without_retry() {
        let f = fixture(vec![401], true, 12);
        f.dispatcher.send_with_retry("s", "", batch());

        assert_eq!(f.sink.calls.lock().unwrap().len(), 1);
        let failures = f.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status, 401);
        assert_eq!(failures[0].data, batch());
    }

    #[test]
    fn test_retry_exhaustion_surrenders_the_batch() {
        let f = fixture(vec![500; 10], false, 3);
        f.dispatcher.send_with_retry("s", "", batch());

        assert_eq!(f.sink.calls.lock().unwrap().len(), 3);
        let failures = f.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status, 500);
        assert!(failures[0].error.contains("retry max count reached"));
        assert_eq!(failures[0].data, batch());
    }

    #[test]
    fn test_shutdown_surrenders_a_retrying_batch() {
        let f = fixture(vec![500; 10], true, 12);
        f.dispatcher.running.store(false, Ordering::Relaxed);
        f.dispatcher.send_with_retry("s", "", batch());

        assert_eq!(f.sink.calls.lock().unwrap().len(), 1);
        let failures = f.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.contains("graceful shutdown"));
    }

    #[test]
    fn test_local_error_is_reported_as_400() {
        struct FailingSink;
        impl BatchSink for FailingSink {
            fn send_batch(
                &self,
                _stream: &str,
                _batch: &[String],
                _auth_key: &str,
            ) -> Result<Response, AtomError> {
                Err(AtomError::InvalidInput("bad".into()))
            }
        }

        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_in_callback = Arc::clone(&failures);
        let dispatcher = Dispatcher {
            sink: Arc::new(FailingSink),
            backoff: BackoffPolicy::new(120),
            retry_forever: true,
            retry_max_count: 12,
            running: Arc::new(AtomicBool::new(true)),
            on_error: Arc::new(move |failure| {
                failures_in_callback.lock().unwrap().push(failure);
            }),
            tracked: Arc::new(AtomicUsize::new(0)),
        };

        dispatcher.send_with_retry("s", "", batch());
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status, 400);
    }

    #[test]
    fn test_backoff_delay_is_bounded_by_cap() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(3),
            cap: Duration::from_secs(120),
        };
        for attempt in 1..12 {
            let upper = (3.0 * f64::from(2u32).powi(attempt)).min(120.0);
            for _ in 0..20 {
                let delay = policy.delay(attempt as u32).as_secs_f64();
                assert!(delay >= 0.0);
                assert!(delay <= upper);
            }
        }
    }
}
