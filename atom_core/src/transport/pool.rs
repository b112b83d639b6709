/**
 * Batch worker pool: a bounded task queue serviced by a fixed set of
 * worker threads.
 *
 * ```text
 *  ┌──────────────────┐   bounded channel   ┌──────────────┐
 *  │  Tracker handler  │ ──── PoolMsg ─────► │ atom-batch-0 │
 *  │  (single producer)│                     │ atom-batch-1 │
 *  └──────────────────┘                     │      ...      │
 *                                            └──────────────┘
 * ```
 *
 * Each task is an opaque closure over one stream, one auth key, and one
 * batch; it runs to completion (including its retry loop) before the worker
 * returns for more. `submit` blocks while the queue is full. The handler is
 * the pool's only producer and workers never submit, so the blocking send
 * cannot deadlock.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

/// One unit of delivery work, fully self-contained.
pub(crate) type SendTask = Box<dyn FnOnce() + Send + 'static>;

enum PoolMsg {
    Run(SendTask),
    Stop,
}

/**
 * Handle to the worker pool.
 *
 * Workers are detached daemon threads: they never prevent process exit.
 * `stop()` wakes them with `Stop` sentinels; tasks still queued behind the
 * running-flag flip are dropped, not executed.
 */
pub(crate) struct BatchPool {
    sender: Sender<PoolMsg>,
    running: Arc<AtomicBool>,
    worker_count: usize,
}

impl BatchPool {
    pub fn new(worker_count: usize, queue_size: usize) -> Self {
        let (sender, receiver) = bounded(queue_size);
        let running = Arc::new(AtomicBool::new(true));

        for index in 0..worker_count {
            let receiver: Receiver<PoolMsg> = receiver.clone();
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(format!("atom-batch-{index}"))
                .spawn(move || Self::run_loop(&receiver, &running))
                .expect("failed to spawn batch worker thread");
        }

        Self {
            sender,
            running,
            worker_count,
        }
    }

    /**
     * The worker loop: pull tasks FIFO until a `Stop` sentinel arrives or
     * every sender is gone.
     */
    fn run_loop(receiver: &Receiver<PoolMsg>, running: &AtomicBool) {
        while let Ok(msg) = receiver.recv() {
            match msg {
                PoolMsg::Run(task) => {
                    if running.load(Ordering::Relaxed) {
                        task();
                    } else {
                        debug!("batch pool is stopped, dropping a queued task");
                    }
                }
                PoolMsg::Stop => break,
            }
        }
    }

    /**
     * Queues a send-task, blocking while the queue is at capacity.
     *
     * A no-op after `stop()`.
     */
    pub fn submit(&self, task: SendTask) {
        if !self.running.load(Ordering::Relaxed) {
            debug!("batch pool is stopped, rejecting a new task");
            return;
        }
        if self.sender.send(PoolMsg::Run(task)).is_err() {
            debug!("batch pool queue is disconnected, dropping a new task");
        }
    }

    /**
     * Flips the running flag and wakes every worker.
     *
     * Sentinels are sent best-effort: a worker that misses one still exits
     * once the queue disconnects when the pool is dropped. Idempotent.
     */
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            for _ in 0..self.worker_count {
                let _ = self.sender.try_send(PoolMsg::Stop);
            }
        }
    }

    /// True iff the task queue holds no pending work.
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_tasks_execute() {
        let pool = BatchPool::new(2, 4);
        let (done_tx, done_rx) = bounded(4);

        for i in 0..4 {
            let done_tx = done_tx.clone();
            pool.submit(Box::new(move || {
                done_tx.send(i).unwrap();
            }));
        }

        let mut seen: Vec<i32> = (0..4)
            .map(|_| done_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_worker_preserves_fifo_order() {
        let pool = BatchPool::new(1, 8);
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = bounded(1);

        for i in 0..5 {
            let order = Arc::clone(&order);
            let done_tx = done_tx.clone();
            pool.submit(Box::new(move || {
                order.lock().unwrap().push(i);
                if i == 4 {
                    done_tx.send(()).unwrap();
                }
            }));
        }

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_is_empty_after_drain() {
        let pool = BatchPool::new(1, 2);
        let (done_tx, done_rx) = bounded(1);
        pool.submit(Box::new(move || {
            done_tx.send(()).unwrap();
        }));

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        /* The task signalled completion, so it has left the queue. */
        assert!(pool.is_empty());
    }

    #[test]
    fn test_submit_after_stop_is_a_no_op() {
        let pool = BatchPool::new(1, 2);
        pool.stop();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.submit(Box::new(move || flag.store(true, Ordering::Relaxed)));

        thread::sleep(Duration::from_millis(100));
        assert!(!ran.load(Ordering::Relaxed));
    }
}
