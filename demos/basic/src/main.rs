/**
 * Runnable tour of the Atom SDK.
 *
 * Exercises the synchronous client (GET, POST, bulk) and then the
 * asynchronous tracker with concurrent producers. Point it at a real
 * stream before running:
 *
 *   ATOM_STREAM=my.stream ATOM_AUTH_KEY=secret \
 *     RUST_LOG=debug cargo run -p atom_demo_basic
 */
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use atom_core::{Atom, AtomOptions, Method, Tracker, TrackerOptions};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stream = std::env::var("ATOM_STREAM").unwrap_or_else(|_| "sdk_demo".to_string());
    let auth_key = std::env::var("ATOM_AUTH_KEY").unwrap_or_default();

    low_level(&stream, &auth_key);
    tracker(&stream, &auth_key);
}

/// One request per call: GET, POST, and a bulk POST.
fn low_level(stream: &str, auth_key: &str) {
    let atom = Atom::new(AtomOptions {
        auth_key: auth_key.to_string(),
        ..Default::default()
    })
    .expect("failed to build the Atom client");

    let single = serde_json::json!({"id": 1, "event_name": "RUST_SDK_GET_EXAMPLE"}).to_string();
    let response = atom
        .put_event(stream, &single, Method::Get, "")
        .expect("put_event rejected its input");
    println!(
        "GET    status {}; data: {:?}; error: {:?}",
        response.status, response.data, response.error
    );

    let single = serde_json::json!({"id": 2, "event_name": "RUST_SDK_POST_EXAMPLE"}).to_string();
    let response = atom
        .put_event(stream, &single, Method::Post, "")
        .expect("put_event rejected its input");
    println!(
        "POST   status {}; data: {:?}; error: {:?}",
        response.status, response.data, response.error
    );

    let batch = vec![
        serde_json::json!({"id": 3, "event_name": "RUST_SDK_BATCH_EXAMPLE"}),
        serde_json::json!({"id": 4, "event_name": "RUST_SDK_BATCH_EXAMPLE"}),
    ];
    let response = atom
        .put_events(stream, &batch, "")
        .expect("put_events rejected its input");
    println!(
        "BULK   status {}; data: {:?}; error: {:?}",
        response.status, response.data, response.error
    );
}

/// Ten producer threads feeding one tracker.
fn tracker(stream: &str, auth_key: &str) {
    let tracker = Tracker::new(TrackerOptions {
        auth_key: auth_key.to_string(),
        batch_size: 20,
        flush_interval_ms: 2000,
        on_error: Some(Arc::new(|failure| {
            println!(
                "delivery failure: status {} on {}: {} ({} events affected)",
                failure.status,
                failure.stream,
                failure.error,
                failure.data.len()
            );
        })),
        ..Default::default()
    })
    .expect("failed to build the tracker");

    let tracker = Arc::new(tracker);
    let producers: Vec<_> = (0..10)
        .map(|producer| {
            let tracker = Arc::clone(&tracker);
            let stream = stream.to_string();
            thread::spawn(move || {
                for i in 0..10 {
                    let payload = serde_json::json!({
                        "id": producer * 10 + i,
                        "event_name": "RUST_SDK_TRACKER_EXAMPLE",
                    });
                    tracker.track_value(&stream, &payload);
                    thread::sleep(Duration::from_millis(25));
                }
            })
        })
        .collect();

    for producer in producers {
        let _ = producer.join();
    }

    tracker.flush();
    tracker.stop();
    println!("finished all example methods");
}
