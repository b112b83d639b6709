/**
 * The asynchronous tracker pipeline.
 *
 * `track()` never touches the network: events land in a bounded per-stream
 * backlog and return immediately. A dedicated handler thread assembles
 * batches, a timer thread forces a flush every interval, and a fixed pool
 * of workers transmits batches with retry. Every failure after `track()`
 * returns is delivered through the error callback, never to the producer.
 *
 * Lifecycle:
 * 1. `Tracker::new(options)` validates the options, builds the pipeline,
 *    and spawns the handler and flusher threads.
 * 2. Producers on any thread call `track()` / `track_value()`.
 * 3. `flush()` forces the current buffers out; `stop()` drains the pipeline
 *    (bounded by a 5 second deadline) and shuts the threads down.
 * 4. Dropping the tracker calls `stop()`.
 */
mod backlog;
mod dispatch;
mod flusher;
mod handler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Sender};
use log::{error, info, warn};
use serde::Serialize;

use crate::client::Atom;
use crate::config::{AtomOptions, TrackerOptions};
use crate::error::{AtomError, DeliveryFailure, OnErrorCallback};
use crate::protocol::types::Event;
use crate::transport::pool::BatchPool;

use backlog::Backlog;
use dispatch::{BackoffPolicy, BatchSink, Dispatcher};
use handler::{Control, Handler};

/// How long `stop()` waits for the pipeline to drain.
const DRAIN_DEADLINE_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/**
 * High-level client: buffered, batched, retried event delivery.
 *
 * All methods take `&self`; share the tracker across producer threads
 * behind an `Arc` (or by reference). There is no interior `Clone`: the
 * owner decides the lifetime, and dropping the last handle stops the
 * pipeline.
 */
pub struct Tracker {
    backlog: Arc<Backlog>,
    pool: Arc<BatchPool>,
    control: Sender<Control>,
    running: Arc<AtomicBool>,
    stopped: AtomicBool,
    stream_keys: Arc<Mutex<HashMap<String, String>>>,
    tracked: Arc<AtomicUsize>,
    on_error: OnErrorCallback,
    default_auth_key: String,
}

impl Tracker {
    /**
     * Builds the pipeline and starts its threads.
     *
     * Out-of-range numeric options are warned about and replaced with
     * defaults; the only hard failure is HTTP client construction.
     */
    pub fn new(options: TrackerOptions) -> Result<Self, AtomError> {
        let atom = Atom::new(AtomOptions {
            endpoint: options.endpoint.clone(),
            auth_key: options.auth_key.clone(),
            request_timeout: options.request_timeout,
        })?;
        Ok(Self::build(options, Arc::new(atom)))
    }

    /// Pipeline assembly behind the delivery seam; tests inject their own sink.
    fn build(options: TrackerOptions, sink: Arc<dyn BatchSink>) -> Self {
        let options = options.validated();

        let running = Arc::new(AtomicBool::new(true));
        let tracked = Arc::new(AtomicUsize::new(0));
        let stream_keys = Arc::new(Mutex::new(HashMap::new()));
        let on_error: OnErrorCallback = options.on_error.unwrap_or_else(|| Arc::new(|_| {}));

        let (control_tx, control_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let backlog = Arc::new(Backlog::new(
            options.backlog_size,
            options.is_blocking,
            options.backlog_timeout,
            ready_tx,
        ));
        let pool = Arc::new(BatchPool::new(
            options.batch_worker_count,
            options.batch_pool_size,
        ));
        let dispatcher = Arc::new(Dispatcher {
            sink,
            backoff: BackoffPolicy::new(options.retry_max_time_secs),
            retry_forever: options.retry_forever,
            retry_max_count: options.retry_max_count,
            running: Arc::clone(&running),
            on_error: Arc::clone(&on_error),
            tracked: Arc::clone(&tracked),
        });

        Handler {
            backlog: Arc::clone(&backlog),
            pool: Arc::clone(&pool),
            dispatcher,
            stream_keys: Arc::clone(&stream_keys),
            control: control_rx,
            ready: ready_rx,
            batch_size: options.batch_size,
            batch_bytes_size: options.batch_bytes_size,
            buffers: HashMap::new(),
            buffer_bytes: HashMap::new(),
            draining: false,
        }
        .spawn();

        flusher::spawn(
            Duration::from_millis(options.flush_interval_ms),
            Arc::clone(&running),
            control_tx.clone(),
        );

        Self {
            backlog,
            pool,
            control: control_tx,
            running,
            stopped: AtomicBool::new(false),
            stream_keys,
            tracked,
            on_error,
            default_auth_key: options.auth_key,
        }
    }

    /**
     * Tracks one event using the default auth key.
     *
     * `data` is a ready JSON payload string, passed through verbatim.
     * Never blocks on the network; with the blocking backlog discipline it
     * may wait up to `backlog_timeout` for a slot.
     */
    pub fn track(&self, stream: &str, data: impl Into<String>) {
        self.track_with_key(stream, data, "");
    }

    /**
     * Tracks one event with an explicit auth key.
     *
     * The first key seen for a stream becomes the key for all of that
     * stream's batches.
     */
    pub fn track_with_key(&self, stream: &str, data: impl Into<String>, auth_key: &str) {
        let data = data.into();

        if stream.is_empty() {
            self.report(400, "stream name must not be empty".into(), vec![data], "");
            return;
        }
        if self.stopped.load(Ordering::Relaxed) {
            self.report(400, AtomError::Stopped.to_string(), vec![data], stream);
            return;
        }

        let key = if auth_key.is_empty() {
            self.default_auth_key.as_str()
        } else {
            auth_key
        };
        {
            let mut keys = self.stream_keys.lock().expect("stream key map poisoned");
            keys.entry(stream.to_string())
                .or_insert_with(|| key.to_string());
        }

        if let Err(event) = self.backlog.add_event(Event::new(stream, data)) {
            let message = AtomError::BacklogFull {
                stream: event.stream,
            }
            .to_string();
            self.report(400, message, vec![event.data], stream);
            return;
        }

        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    /**
     * Serializes `value` to JSON and tracks it.
     *
     * An encoding failure is reported through the error callback with
     * status 400; it is never returned to the producer.
     */
    pub fn track_value<T: Serialize>(&self, stream: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(data) => self.track(stream, data),
            Err(err) => self.report(
                400,
                AtomError::Encoding(err).to_string(),
                Vec::new(),
                stream,
            ),
        }
    }

    /// Forces every per-stream buffer out to the pool. Returns immediately.
    pub fn flush(&self) {
        let _ = self.control.send(Control::FlushAll);
    }

    /**
     * Graceful shutdown. Idempotent.
     *
     * Switches the handler into drain mode, waits up to 5 seconds for the
     * backlog and the pool queue to empty, then stops the threads. Batches
     * still mid-retry after the deadline are surrendered through the error
     * callback on their next wake.
     */
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return;
        }
        info!("flushing all data and stopping the tracker within {DRAIN_DEADLINE_SECS} s");

        /* Hand the handler a drain order and wait for its first sweep, so
         * buffered events reach the pool before the emptiness checks. */
        let (ack_tx, ack_rx) = bounded(1);
        if self.control.send(Control::Drain(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(Duration::from_secs(1));
        }

        let mut waited = 0;
        while !(self.pool.is_empty() && self.backlog.is_empty()) {
            if waited == DRAIN_DEADLINE_SECS {
                warn!("drain deadline reached with work still pending, stopping anyway");
                break;
            }
            waited += 1;
            thread::sleep(Duration::from_secs(1));
        }

        self.running.store(false, Ordering::Relaxed);
        let _ = self.control.send(Control::Shutdown);
        self.pool.stop();
    }

    /// Invokes the user callback and logs the failure.
    fn report(&self, status: u16, message: String, data: Vec<String>, stream: &str) {
        error!("stream {stream}: status {status}: {message}");
        (self.on_error)(DeliveryFailure::new(status, message, data, stream));
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop();
    }
}
