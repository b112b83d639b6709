/**
 * The tracker handler: turns the per-stream backlog into size-, count-, and
 * time-bounded batches.
 *
 * ```text
 *  track() ──► Backlog ──┐
 *                        ├──► handler thread ──► BatchPool ──► HTTP
 *  flush()/timer ─ Control ┘
 * ```
 *
 * The thread owns the per-stream assembly buffers outright; nothing else
 * touches them, so batch emission needs no locking. Wakeups are
 * event-driven: a `select!` over the control channel and the backlog's
 * readiness nudge, never a sleep-and-poll.
 *
 * Shutdown protocol: `Drain` switches the handler into a mode where every
 * iteration ends with a full sweep, so events arriving during the drain
 * window leave as fast as they come in; `Shutdown` performs one final sweep
 * and exits.
 */
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{select, Receiver, Sender};
use log::info;

use super::backlog::Backlog;
use super::dispatch::Dispatcher;
use crate::transport::pool::BatchPool;

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/**
 * Messages that steer the handler thread.
 */
pub(crate) enum Control {
    /// Emit every non-empty per-stream buffer now.
    FlushAll,

    /// Shutdown has begun: sweep now, acknowledge, and keep sweeping after
    /// every subsequent iteration until `Shutdown` arrives.
    Drain(Sender<()>),

    /// Final sweep, then exit the thread.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub(crate) struct Handler {
    pub backlog: Arc<Backlog>,
    pub pool: Arc<BatchPool>,
    pub dispatcher: Arc<Dispatcher>,
    pub stream_keys: Arc<Mutex<HashMap<String, String>>>,
    pub control: Receiver<Control>,
    pub ready: Receiver<()>,
    pub batch_size: usize,
    pub batch_bytes_size: usize,

    /// Per-stream assembly buffers (payloads only) and their byte counts.
    pub buffers: HashMap<String, Vec<String>>,
    pub buffer_bytes: HashMap<String, usize>,
    pub draining: bool,
}

impl Handler {
    pub fn spawn(self) {
        thread::Builder::new()
            .name("atom-tracker".into())
            .spawn(move || self.run())
            .expect("failed to spawn tracker handler thread");
    }

    fn run(mut self) {
        info!("tracker handler started");

        loop {
            let msg = if self.backlog.is_empty() {
                /* Idle: park until a control message or new events arrive.
                 * The arms only pick a message; handling happens after the
                 * channel borrows are released. */
                select! {
                    recv(self.control) -> msg => Some(msg.unwrap_or(Control::Shutdown)),
                    recv(self.ready) -> msg => {
                        if msg.is_err() {
                            Some(Control::Shutdown)
                        } else {
                            None
                        }
                    },
                }
            } else {
                self.control.try_recv().ok()
            };

            if let Some(msg) = msg {
                if self.handle(msg) {
                    break;
                }
            }

            self.pass();
            if self.draining {
                self.sweep();
            }
        }

        info!("tracker handler stopped");
    }

    /// Applies one control message. Returns true when the loop must exit.
    fn handle(&mut self, msg: Control) -> bool {
        match msg {
            Control::FlushAll => {
                self.sweep();
                false
            }
            Control::Drain(ack) => {
                self.draining = true;
                self.sweep();
                let _ = ack.send(());
                false
            }
            Control::Shutdown => {
                self.sweep();
                true
            }
        }
    }

    /**
     * One scheduling pass: every known stream may contribute at most one
     * event, so no stream starves behind a busy one. Size and count
     * triggers fire as soon as an append crosses a threshold, which bounds
     * overshoot to a single event.
     */
    fn pass(&mut self) {
        for (stream, auth_key) in self.known_streams() {
            let Some(event) = self.backlog.get_event(&stream) else {
                continue;
            };

            let bytes = event.data.len();
            let buffer = self.buffers.entry(stream.clone()).or_default();
            buffer.push(event.data);
            let count = buffer.len();
            let size = {
                let size = self.buffer_bytes.entry(stream.clone()).or_insert(0);
                *size += bytes;
                *size
            };

            if size >= self.batch_bytes_size || count >= self.batch_size {
                self.emit(&stream, &auth_key);
            }
        }
    }

    /// Emits every non-empty buffer.
    fn sweep(&mut self) {
        for (stream, auth_key) in self.known_streams() {
            self.emit(&stream, &auth_key);
        }
    }

    /**
     * Moves the stream's buffer out as one batch and queues a send-task.
     * The buffer and its byte count reset together; no event can slip in
     * between because this thread is the only writer.
     */
    fn emit(&mut self, stream: &str, auth_key: &str) {
        let Some(buffer) = self.buffers.get_mut(stream) else {
            return;
        };
        if buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(buffer);
        self.buffer_bytes.insert(stream.to_string(), 0);

        let dispatcher = Arc::clone(&self.dispatcher);
        let stream = stream.to_string();
        let auth_key = auth_key.to_string();
        self.pool.submit(Box::new(move || {
            dispatcher.send_with_retry(&stream, &auth_key, batch);
        }));
    }

    /// Snapshot of the stream-key map; the lock is held only for the copy.
    fn known_streams(&self) -> Vec<(String, String)> {
        let keys = self.stream_keys.lock().expect("stream key map poisoned");
        keys.iter()
            .map(|(stream, key)| (stream.clone(), key.clone()))
            .collect()
    }
}
