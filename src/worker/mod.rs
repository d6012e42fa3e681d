//! Worker lifecycle: claiming, resolving, downloading, closing.
//!
//! - [`TaskAcquirer`] - claims the next job for a worker identity
//! - [`ProgressReporter`] - turns engine progress into `percent_done` writes
//! - [`WorkerLoop`] - one worker's claim/resolve/download/close cycle
//! - [`WorkerPool`] - runs a fixed number of workers until each sees an empty queue
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use dlqueue_core::config::FetchConfig;
//! use dlqueue_core::engine::YtDlpEngine;
//! use dlqueue_core::queue::SqliteQueueStore;
//! use dlqueue_core::worker::WorkerPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteQueueStore::new(Path::new("queue.db"));
//! let pool = WorkerPool::new(4, store, YtDlpEngine::new("yt-dlp"), FetchConfig::default())?;
//! let report = pool.run().await;
//! println!("done: {}, failed: {}", report.done(), report.failed());
//! # Ok(())
//! # }
//! ```

mod acquirer;
mod pool;
mod progress;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;
mod worker_loop;

pub use acquirer::TaskAcquirer;
pub use pool::{PoolReport, WorkerPool};
pub use progress::{ProgressReporter, compute_percent};
pub use worker_loop::{WorkerExit, WorkerLoop, WorkerReport};
