//! Durable job queue backed by the `download_queue` table.
//!
//! The table is the only thing workers share. Every operation opens its own
//! connection, runs inside its own transaction, and closes the connection before
//! returning, so a crashed worker never leaves a session or lock behind.
//!
//! # Overview
//!
//! - [`QueueStore`] - the data-access seam the worker loop depends on
//! - [`PgQueueStore`] - `PostgreSQL` backend, claims with `SELECT ... FOR UPDATE`
//! - [`SqliteQueueStore`] - `SQLite` backend for single-host runs and tests
//! - [`AnyQueueStore`] - whichever of the two the configuration selects
//! - [`JobHandle`] / [`JobRecord`] / [`JobStatus`] - row types
//! - [`QueueError`] - operation error types
//!
//! Provisioning the table is not done here; the DDL ships in `migrations/`.
//!
//! # Example
//!
//! ```no_run
//! use dlqueue_core::queue::{JobStatus, QueueStore, SqliteQueueStore, WorkerId};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteQueueStore::new(Path::new("queue.db"));
//! if let Some(job) = store.claim_next(&WorkerId::for_slot(0)).await? {
//!     // ... resolve and download job.url() into job.path() ...
//!     store.close_job(job.id(), JobStatus::Done).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod any;
mod error;
mod job;
mod postgres;
mod sqlite;

pub use any::AnyQueueStore;
pub use error::{QueueDbErrorKind, QueueError};
pub use job::{JobHandle, JobRecord, JobStatus, WorkerId};
pub use postgres::PgQueueStore;
pub use sqlite::SqliteQueueStore;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Data-access contract for the download queue.
///
/// Failures are logged by the implementation and returned as [`QueueError`];
/// callers must treat an error as "no effect occurred".
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Claims the lowest-id pending job for `worker`.
    ///
    /// Locks the row, sets `status = in_progress` and `worker_id = worker`, and
    /// commits before returning the handle. Returns `Ok(None)` when no pending
    /// row exists.
    async fn claim_next(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError>;

    /// Writes `status` for a job. No check is made against the current status.
    async fn close_job(&self, id: i64, status: JobStatus) -> Result<(), QueueError>;

    /// Records the resolved output filename.
    async fn set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError>;

    /// Records the completion percentage.
    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError>;

    /// Reads one row.
    async fn get(&self, id: i64) -> Result<Option<JobRecord>, QueueError>;

    /// Reads every row ordered by id.
    async fn list_all(&self) -> Result<Vec<JobRecord>, QueueError>;
}

/// Returns `Ok(())` if at least one row was affected; otherwise [`QueueError::JobNotFound`].
fn check_affected(id: i64, rows_affected: u64) -> Result<(), QueueError> {
    if rows_affected == 0 {
        Err(QueueError::JobNotFound(id))
    } else {
        Ok(())
    }
}

/// Logs a failed store operation at the operation boundary.
fn log_failure<T>(
    operation: &'static str,
    result: Result<T, QueueError>,
) -> Result<T, QueueError> {
    if let Err(error) = &result {
        warn!(
            operation,
            kind = ?error.database_kind(),
            error = %error,
            "queue store operation failed"
        );
    }
    result
}

/// Closes a per-operation connection; a failed close only matters for diagnostics.
async fn close_quietly<C: sqlx::Connection>(conn: C) {
    if let Err(error) = conn.close().await {
        debug!(error = %error, "closing queue connection failed");
    }
}
