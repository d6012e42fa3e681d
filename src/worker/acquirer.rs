//! Claim protocol as seen by a worker.

use tracing::{debug, info, warn};

use crate::queue::{JobHandle, QueueStore, WorkerId};

/// Claims jobs on behalf of a worker.
///
/// A store failure during the claim is reported the same way as an empty queue:
/// the worker sees `None` and stops. The two cases differ only in the logs.
#[derive(Debug)]
pub struct TaskAcquirer<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: QueueStore + ?Sized> TaskAcquirer<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Claims the oldest pending job for `worker`.
    ///
    /// The returned handle exists only if the ownership update committed.
    pub async fn claim(&self, worker: &WorkerId) -> Option<JobHandle> {
        match self.store.claim_next(worker).await {
            Ok(Some(job)) => {
                info!(worker = %worker, job_id = job.id(), url = %job.url(), "claimed job");
                Some(job)
            }
            Ok(None) => {
                debug!(worker = %worker, "no pending jobs");
                None
            }
            Err(error) => {
                warn!(worker = %worker, error = %error, "claim failed, treating queue as empty");
                None
            }
        }
    }
}
