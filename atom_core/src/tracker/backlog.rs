/**
 * The event backlog: bounded per-stream FIFOs between producers and the
 * tracker handler.
 *
 * All mutations are serialized by one mutex. Per-stream queues are created
 * lazily on first add and never removed, matching the stream-key map's
 * grow-only lifetime.
 *
 * A producer that hits a full queue either waits for a slot (blocking
 * discipline, bounded by `timeout`) or gives up immediately (non-blocking).
 * On overflow the event is handed back to the caller, in the style of
 * `TrySendError::Full`, so the tracker can surface the payload through the
 * error callback.
 *
 * `add_event` also nudges a capacity-1 readiness channel so the handler can
 * sleep on a blocking receive instead of polling the backlog.
 */
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::protocol::types::Event;

pub(crate) struct Backlog {
    queues: Mutex<HashMap<String, VecDeque<Event>>>,
    slot_freed: Condvar,
    capacity: usize,
    blocking: bool,
    timeout: Duration,
    ready: Sender<()>,
}

impl Backlog {
    pub fn new(capacity: usize, blocking: bool, timeout: Duration, ready: Sender<()>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            slot_freed: Condvar::new(),
            capacity,
            blocking,
            timeout,
            ready,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Event>>> {
        self.queues.lock().expect("backlog lock poisoned")
    }

    /**
     * Appends `event` to its stream's FIFO.
     *
     * Returns the event back when its queue stays at capacity for the
     * configured discipline's patience.
     */
    pub fn add_event(&self, event: Event) -> Result<(), Event> {
        let mut queues = self.lock();

        loop {
            let queue = queues.entry(event.stream.clone()).or_default();
            if queue.len() < self.capacity {
                queue.push_back(event);
                /* Wake the handler if it is parked. A full nudge channel
                 * means a wakeup is already pending. */
                let _ = self.ready.try_send(());
                return Ok(());
            }

            if !self.blocking {
                return Err(event);
            }

            let (guard, wait) = self
                .slot_freed
                .wait_timeout(queues, self.timeout)
                .expect("backlog lock poisoned");
            queues = guard;

            if wait.timed_out() {
                let still_full = queues
                    .get(&event.stream)
                    .is_some_and(|q| q.len() >= self.capacity);
                if still_full {
                    return Err(event);
                }
            }
        }
    }

    /**
     * Removes and returns the oldest event for `stream`.
     *
     * `None` when the stream's queue is empty or was never created; an
     * unknown stream is not an error.
     */
    pub fn get_event(&self, stream: &str) -> Option<Event> {
        let mut queues = self.lock();
        let event = queues.get_mut(stream)?.pop_front();
        if event.is_some() {
            self.slot_freed.notify_all();
        }
        event
    }

    /// True iff every known per-stream FIFO is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().values().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;

    fn backlog(capacity: usize, blocking: bool) -> (Backlog, crossbeam_channel::Receiver<()>) {
        let (ready_tx, ready_rx) = bounded(1);
        let backlog = Backlog::new(capacity, blocking, Duration::from_millis(50), ready_tx);
        (backlog, ready_rx)
    }

    #[test]
    fn test_fifo_order_per_stream() {
        let (backlog, _rx) = backlog(10, false);
        for i in 0..3 {
            backlog.add_event(Event::new("s", format!("{i}"))).unwrap();
        }
        backlog.add_event(Event::new("other", "x")).unwrap();

        let drained: Vec<String> = (0..3)
            .map(|_| backlog.get_event("s").unwrap().data)
            .collect();
        assert_eq!(drained, vec!["0", "1", "2"]);
        assert_eq!(backlog.get_event("other").unwrap().data, "x");
    }

    #[test]
    fn test_unknown_stream_is_not_an_error() {
        let (backlog, _rx) = backlog(10, false);
        assert!(backlog.get_event("never-seen").is_none());
    }

    #[test]
    fn test_is_empty_tracks_every_stream() {
        let (backlog, _rx) = backlog(10, false);
        assert!(backlog.is_empty());

        backlog.add_event(Event::new("a", "1")).unwrap();
        backlog.add_event(Event::new("b", "2")).unwrap();
        assert!(!backlog.is_empty());

        backlog.get_event("a");
        assert!(!backlog.is_empty());
        backlog.get_event("b");
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_non_blocking_overflow_fails_immediately() {
        let (backlog, _rx) = backlog(2, false);
        backlog.add_event(Event::new("s", "1")).unwrap();
        backlog.add_event(Event::new("s", "2")).unwrap();

        /* The rejected event comes back intact. */
        let rejected = backlog.add_event(Event::new("s", "3")).unwrap_err();
        assert_eq!(rejected.stream, "s");
        assert_eq!(rejected.data, "3");
    }

    #[test]
    fn test_blocking_overflow_times_out() {
        let (backlog, _rx) = backlog(1, true);
        backlog.add_event(Event::new("s", "1")).unwrap();

        /* Nobody consumes, so the bounded wait must end in rejection. */
        assert!(backlog.add_event(Event::new("s", "2")).is_err());
    }

    #[test]
    fn test_blocking_producer_resumes_when_a_slot_frees() {
        let (backlog, _rx) = backlog(1, true);
        let backlog = Arc::new(backlog);
        backlog.add_event(Event::new("s", "first")).unwrap();

        let producer = {
            let backlog = Arc::clone(&backlog);
            thread::spawn(move || backlog.add_event(Event::new("s", "second")))
        };

        thread::sleep(Duration::from_millis(10));
        assert_eq!(backlog.get_event("s").unwrap().data, "first");

        producer.join().unwrap().unwrap();
        assert_eq!(backlog.get_event("s").unwrap().data, "second");
    }

    #[test]
    fn test_add_event_nudges_the_handler() {
        let (backlog, ready_rx) = backlog(10, false);
        backlog.add_event(Event::new("s", "1")).unwrap();
        assert!(ready_rx.try_recv().is_ok());

        /* A second add with a pending nudge must not block or fail. */
        backlog.add_event(Event::new("s", "2")).unwrap();
    }
}
