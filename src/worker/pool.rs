//! Fixed-size pool of independent workers.

use tracing::{info, warn};

use super::{WorkerExit, WorkerLoop, WorkerReport};
use crate::config::{ConfigError, FetchConfig, MAX_WORKERS, MIN_WORKERS};
use crate::engine::TransferEngine;
use crate::queue::{QueueStore, WorkerId};

/// Totals across every worker of a finished pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// One entry per worker that returned normally, in slot order.
    pub workers: Vec<WorkerReport>,
    /// Workers whose task panicked.
    pub panicked: usize,
}

impl PoolReport {
    #[must_use]
    pub fn done(&self) -> usize {
        self.workers.iter().map(|w| w.done).sum()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.workers.iter().map(|w| w.failed).sum()
    }

    /// Workers that stopped early because a resolution failed.
    #[must_use]
    pub fn resolve_failures(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| matches!(w.exit, WorkerExit::ResolveFailed { .. }))
            .count()
    }
}

/// Starts `workers` independent [`WorkerLoop`]s and waits for all of them.
///
/// Each worker gets its own clone of the store handle and the engine. The store
/// is the only coordination point; there is no in-memory queue and no work
/// stealing. A worker that finds the queue empty exits for good.
#[derive(Debug)]
pub struct WorkerPool<S, E> {
    workers: usize,
    store: S,
    engine: E,
    fetch: FetchConfig,
}

impl<S, E> WorkerPool<S, E>
where
    S: QueueStore + Clone + 'static,
    E: TransferEngine + Clone + 'static,
{
    /// Creates a pool of `workers` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWorkers`] if `workers` is outside
    /// [`MIN_WORKERS`]..=[`MAX_WORKERS`].
    pub fn new(
        workers: usize,
        store: S,
        engine: E,
        fetch: FetchConfig,
    ) -> Result<Self, ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(ConfigError::InvalidWorkers { value: workers });
        }
        Ok(Self {
            workers,
            store,
            engine,
            fetch,
        })
    }

    /// Runs every worker to completion.
    pub async fn run(self) -> PoolReport {
        info!(workers = self.workers, "starting worker pool");

        let handles: Vec<_> = (0..self.workers)
            .map(|slot| {
                let worker = WorkerLoop::new(
                    WorkerId::for_slot(slot),
                    self.store.clone(),
                    self.engine.clone(),
                    self.fetch.clone(),
                );
                (slot, tokio::spawn(worker.run()))
            })
            .collect();

        let mut report = PoolReport::default();
        for (slot, handle) in handles {
            match handle.await {
                Ok(worker_report) => report.workers.push(worker_report),
                Err(e) => {
                    warn!(slot, error = %e, "worker task panicked");
                    report.panicked += 1;
                }
            }
        }

        info!(
            done = report.done(),
            failed = report.failed(),
            resolve_failures = report.resolve_failures(),
            panicked = report.panicked,
            "worker pool finished"
        );

        report
    }
}
