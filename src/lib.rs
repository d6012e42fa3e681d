//! Download queue worker library.
//!
//! A fleet of workers drains a durable `download_queue` table. Each job is
//! claimed by exactly one worker through a transactional row lock, resolved to
//! an output filename, downloaded with progress written back to its row, and
//! closed as done or error.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`queue`] - Queue table access and the claim protocol
//! - [`engine`] - Transfer engine seam and the `yt-dlp` adapter
//! - [`worker`] - Worker state machine, progress reporting, and the pool
//! - [`config`] - Store, engine, and pool configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod queue;
pub mod worker;

// Re-export commonly used types
pub use config::{ConfigError, FetchConfig, PoolConfig, StoreConfig};
pub use engine::{
    EngineError, FetchOptions, ProgressSink, ProgressUpdate, TransferEngine, TransferPhase,
    YtDlpEngine,
};
pub use queue::{
    AnyQueueStore, JobHandle, JobRecord, JobStatus, PgQueueStore, QueueError, QueueStore,
    SqliteQueueStore, WorkerId,
};
pub use worker::{
    PoolReport, ProgressReporter, TaskAcquirer, WorkerExit, WorkerLoop, WorkerPool, WorkerReport,
    compute_percent,
};
