//! Per-worker state machine.
//!
//! ```text
//! Idle --claim--> Resolving --ok--> Downloading --ok--> Closed(Done) --> Idle
//!   |                 |                  |
//!   | none            | err              | err
//!   v                 v                  v
//! exit         Closed(Error), exit   Closed(Error) --> Idle
//! ```
//!
//! A resolution failure ends the worker; a transfer failure does not.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use super::{ProgressReporter, TaskAcquirer};
use crate::config::FetchConfig;
use crate::engine::TransferEngine;
use crate::queue::{JobHandle, JobStatus, QueueStore, WorkerId};

/// Why a worker stopped claiming jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A claim returned no job.
    QueueDrained,
    /// Metadata resolution failed for `job_id`; the worker stopped after closing it.
    ResolveFailed { job_id: i64 },
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueDrained => f.write_str("queue drained"),
            Self::ResolveFailed { job_id } => write!(f, "resolve failed for job {job_id}"),
        }
    }
}

/// What one worker did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: WorkerId,
    /// Jobs closed as done.
    pub done: usize,
    /// Jobs closed as error.
    pub failed: usize,
    pub exit: WorkerExit,
}

impl WorkerReport {
    /// Number of jobs this worker claimed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.done + self.failed
    }
}

/// Result of driving one claimed job through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Done,
    TransferFailed,
    ResolveFailed,
}

/// One worker: claims jobs until the queue looks empty to it.
///
/// The loop owns its store handle and engine; nothing is shared with other
/// workers except the rows in the store.
#[derive(Debug)]
pub struct WorkerLoop<S, E> {
    worker: WorkerId,
    store: S,
    engine: E,
    fetch: FetchConfig,
}

impl<S: QueueStore, E: TransferEngine> WorkerLoop<S, E> {
    #[must_use]
    pub fn new(worker: WorkerId, store: S, engine: E, fetch: FetchConfig) -> Self {
        Self {
            worker,
            store,
            engine,
            fetch,
        }
    }

    /// Runs until a claim yields nothing or a resolution fails.
    #[instrument(skip(self), fields(worker = %self.worker))]
    pub async fn run(self) -> WorkerReport {
        let acquirer = TaskAcquirer::new(&self.store);
        let mut done = 0;
        let mut failed = 0;

        info!("worker started");

        let exit = loop {
            let Some(job) = acquirer.claim(&self.worker).await else {
                break WorkerExit::QueueDrained;
            };

            match self.process(&job).await {
                JobOutcome::Done => done += 1,
                JobOutcome::TransferFailed => failed += 1,
                JobOutcome::ResolveFailed => {
                    failed += 1;
                    break WorkerExit::ResolveFailed { job_id: job.id() };
                }
            }
        };

        info!(done, failed, exit = %exit, "worker finished");

        WorkerReport {
            worker: self.worker,
            done,
            failed,
            exit,
        }
    }

    #[instrument(skip(self, job), fields(job_id = job.id(), url = %job.url()))]
    async fn process(&self, job: &JobHandle) -> JobOutcome {
        let options = self.fetch.options_for(job);

        // Resolving
        let filename = match self.engine.resolve(job.url(), &options).await {
            Ok(filename) => filename,
            Err(error) => {
                warn!(error = %error, "resolution failed, worker stopping");
                self.close(job, JobStatus::Error).await;
                return JobOutcome::ResolveFailed;
            }
        };

        debug!(filename = %filename, "resolved");
        if let Err(error) = self.store.set_filename(job.id(), &filename).await {
            warn!(error = %error, "failed to record filename");
        }

        // Downloading
        let reporter = ProgressReporter::new(&self.store, job.id());
        match self.engine.download(job.url(), &options, &reporter).await {
            Ok(()) => {
                info!(filename = %filename, "download completed");
                self.close(job, JobStatus::Done).await;
                JobOutcome::Done
            }
            Err(error) => {
                warn!(error = %error, "download failed");
                self.close(job, JobStatus::Error).await;
                JobOutcome::TransferFailed
            }
        }
    }

    /// Best-effort terminal status write.
    async fn close(&self, job: &JobHandle, status: JobStatus) {
        if let Err(error) = self.store.close_job(job.id(), status).await {
            warn!(job_id = job.id(), status = %status, error = %error, "failed to close job");
        }
    }
}
