/**
 * Periodic flush timer.
 *
 * A dedicated thread that asks the handler to flush every stream once per
 * interval. Targets are absolute (`next_call += interval`) so scheduling
 * jitter does not accumulate across intervals; a target that has already
 * passed resets to now instead of trying to catch up.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::debug;

use super::handler::Control;

pub(super) fn spawn(interval: Duration, running: Arc<AtomicBool>, control: Sender<Control>) {
    thread::Builder::new()
        .name("atom-flusher".into())
        .spawn(move || run(interval, &running, &control))
        .expect("failed to spawn flusher thread");
}

fn run(interval: Duration, running: &AtomicBool, control: &Sender<Control>) {
    let mut next_call = Instant::now();

    while running.load(Ordering::Relaxed) {
        next_call += interval;
        match next_call.checked_duration_since(Instant::now()) {
            Some(wait) => thread::sleep(wait),
            /* Fell behind (long stall, suspend): realign on the present. */
            None => next_call = Instant::now(),
        }

        if !running.load(Ordering::Relaxed) {
            break;
        }
        debug!("periodic flush");
        if control.send(Control::FlushAll).is_err() {
            break;
        }
    }
}
