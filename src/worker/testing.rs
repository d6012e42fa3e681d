//! In-memory doubles for worker tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::{
    EngineError, FetchOptions, ProgressSink, ProgressUpdate, TransferEngine, TransferPhase,
};
use crate::queue::{
    JobHandle, JobRecord, JobStatus, QueueDbErrorKind, QueueError, QueueStore, WorkerId,
};

#[derive(Debug, Clone)]
pub(crate) struct MemRow {
    pub url: String,
    pub status: JobStatus,
    pub worker_id: Option<String>,
    pub filename: Option<String>,
    pub percent_done: Option<f64>,
}

/// Queue store over a mutex-guarded map; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<i64, MemRow>>>,
}

impl MemoryStore {
    pub fn with_jobs(ids: &[i64]) -> Self {
        let jobs: Vec<(i64, String)> = ids
            .iter()
            .map(|id| (*id, format!("https://example.com/{id}")))
            .collect();
        Self::with_urls(&jobs)
    }

    pub fn with_urls(jobs: &[(i64, String)]) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for (id, url) in jobs {
                rows.insert(
                    *id,
                    MemRow {
                        url: url.clone(),
                        status: JobStatus::Pending,
                        worker_id: None,
                        filename: None,
                        percent_done: None,
                    },
                );
            }
        }
        store
    }

    pub fn row(&self, id: i64) -> MemRow {
        self.rows.lock().unwrap()[&id].clone()
    }

    fn update(&self, id: i64, apply: impl FnOnce(&mut MemRow)) -> Result<(), QueueError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or(QueueError::JobNotFound(id))?;
        apply(row);
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn claim_next(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        let mut rows = self.rows.lock().unwrap();
        let next = rows
            .iter_mut()
            .find(|(_, row)| row.status == JobStatus::Pending);
        Ok(next.map(|(id, row)| {
            row.status = JobStatus::InProgress;
            row.worker_id = Some(worker.to_string());
            JobHandle::claimed(*id, row.url.clone(), "/tmp/out".to_string())
        }))
    }

    async fn close_job(&self, id: i64, status: JobStatus) -> Result<(), QueueError> {
        self.update(id, |row| row.status = status)
    }

    async fn set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError> {
        self.update(id, |row| row.filename = Some(filename.to_string()))
    }

    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError> {
        self.update(id, |row| row.percent_done = Some(percent))
    }

    async fn get(&self, id: i64) -> Result<Option<JobRecord>, QueueError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&id).map(|row| JobRecord {
            id,
            url: row.url.clone(),
            path: "/tmp/out".to_string(),
            status_code: row.status.code(),
            worker_id: row.worker_id.clone(),
            filename: row.filename.clone(),
            percent_done: row.percent_done,
        }))
    }

    async fn list_all(&self) -> Result<Vec<JobRecord>, QueueError> {
        let ids: Vec<i64> = self.rows.lock().unwrap().keys().copied().collect();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.extend(self.get(id).await?);
        }
        Ok(records)
    }
}

/// Store whose every operation fails with a connection error.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, QueueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Database {
            kind: QueueDbErrorKind::Connection,
            message: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl QueueStore for FailingStore {
    async fn claim_next(&self, _worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        self.fail()
    }

    async fn close_job(&self, _id: i64, _status: JobStatus) -> Result<(), QueueError> {
        self.fail()
    }

    async fn set_filename(&self, _id: i64, _filename: &str) -> Result<(), QueueError> {
        self.fail()
    }

    async fn set_percent(&self, _id: i64, _percent: f64) -> Result<(), QueueError> {
        self.fail()
    }

    async fn get(&self, _id: i64) -> Result<Option<JobRecord>, QueueError> {
        self.fail()
    }

    async fn list_all(&self) -> Result<Vec<JobRecord>, QueueError> {
        self.fail()
    }
}

/// Engine stub keyed on the URL.
///
/// URLs containing `bad-resolve` fail resolution; URLs containing
/// `bad-download` report 40% and then fail; anything else reports 100% and
/// succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StubEngine;

#[async_trait]
impl TransferEngine for StubEngine {
    async fn resolve(&self, url: &str, options: &FetchOptions) -> Result<String, EngineError> {
        if url.contains("bad-resolve") {
            return Err(EngineError::resolve(url, "unsupported url"));
        }
        Ok(options.output_template.replace("%(title)s.%(ext)s", "video.mp4"))
    }

    async fn download(
        &self,
        url: &str,
        _options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let failing = url.contains("bad-download");
        let downloaded = if failing { 400 } else { 1000 };
        progress
            .on_progress(ProgressUpdate {
                downloaded_bytes: downloaded,
                total_bytes: Some(1000),
                phase: TransferPhase::Downloading,
            })
            .await;
        if failing {
            return Err(EngineError::transfer(url, "connection reset"));
        }
        Ok(())
    }
}
