/*!
 * Transport layer: how batches leave the process.
 *
 * - `http` issues one blocking request and maps the outcome to a `Response`.
 * - `pool` runs the bounded queue of send-tasks on a fixed set of worker
 *   threads.
 */

pub mod http;
pub(crate) mod pool;

pub use http::HttpSender;
