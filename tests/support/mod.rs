//! Shared helpers for integration tests.
//!
//! Creates a migrated `SQLite` queue in a temp dir, seeds jobs with explicit
//! ids, and provides a scripted transfer engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dlqueue_core::engine::{
    EngineError, FetchOptions, ProgressSink, ProgressUpdate, TransferEngine, TransferPhase,
};
use dlqueue_core::queue::{JobRecord, JobStatus, QueueStore, SqliteQueueStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

/// Creates an empty, migrated queue database.
pub async fn sqlite_queue() -> (SqliteQueueStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("queue.db");

    let mut conn = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .connect()
        .await
        .expect("Failed to create database");
    sqlx::migrate!("./migrations/sqlite")
        .run(&mut conn)
        .await
        .expect("Failed to run migrations");
    conn.close().await.expect("Failed to close setup connection");

    (SqliteQueueStore::new(&db_path), temp_dir)
}

async fn raw_connection(db_path: &Path) -> SqliteConnection {
    SqliteConnectOptions::new()
        .filename(db_path)
        .connect()
        .await
        .expect("Failed to open database")
}

/// Inserts pending jobs with the given ids and URLs.
pub async fn seed(store: &SqliteQueueStore, jobs: &[(i64, &str)]) {
    let mut conn = raw_connection(store.path()).await;
    for (id, url) in jobs {
        sqlx::query("INSERT INTO download_queue (id, url, path) VALUES (?, ?, ?)")
            .bind(id)
            .bind(url)
            .bind("/srv/media")
            .execute(&mut conn)
            .await
            .expect("Failed to seed job");
    }
    conn.close().await.expect("Failed to close seed connection");
}

/// Inserts `count` pending jobs with ids `1..=count`.
pub async fn seed_many(store: &SqliteQueueStore, count: i64) {
    let urls: Vec<String> = (1..=count)
        .map(|id| format!("https://example.com/watch?v={id}"))
        .collect();
    let jobs: Vec<(i64, &str)> = urls
        .iter()
        .zip(1..)
        .map(|(url, id)| (id, url.as_str()))
        .collect();
    seed(store, &jobs).await;
}

/// Reads one row, panicking if it is missing.
pub async fn row(store: &impl QueueStore, id: i64) -> JobRecord {
    store
        .get(id)
        .await
        .expect("Failed to read job")
        .expect("Job row missing")
}

/// Reads one row's status.
pub async fn status_of(store: &impl QueueStore, id: i64) -> JobStatus {
    row(store, id)
        .await
        .status()
        .expect("Unknown status code")
}

/// Scripted behaviour for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Report 100% and succeed.
    Succeed,
    /// Fail metadata resolution.
    FailResolve,
    /// Report `downloaded` of `total` bytes, then fail the transfer.
    FailDownloadAfter { downloaded: u64, total: u64 },
}

/// Engine stub whose behaviour is looked up by URL; unknown URLs succeed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    scripts: Arc<HashMap<String, Script>>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .iter()
                    .map(|(url, script)| ((*url).to_string(), *script))
                    .collect(),
            ),
            delay: Duration::ZERO,
        }
    }

    /// Sleeps this long inside each download, so workers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn script(&self, url: &str) -> Script {
        self.scripts.get(url).copied().unwrap_or(Script::Succeed)
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    async fn resolve(&self, url: &str, options: &FetchOptions) -> Result<String, EngineError> {
        if self.script(url) == Script::FailResolve {
            return Err(EngineError::resolve(url, "ERROR: Unsupported URL"));
        }
        Ok(options
            .output_template
            .replace("%(title)s", "video")
            .replace("%(ext)s", "mp4"))
    }

    async fn download(
        &self,
        url: &str,
        _options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script(url) {
            Script::FailDownloadAfter { downloaded, total } => {
                progress
                    .on_progress(ProgressUpdate {
                        downloaded_bytes: downloaded,
                        total_bytes: Some(total),
                        phase: TransferPhase::Downloading,
                    })
                    .await;
                Err(EngineError::transfer(url, "connection reset by peer"))
            }
            Script::Succeed | Script::FailResolve => {
                progress
                    .on_progress(ProgressUpdate {
                        downloaded_bytes: 2048,
                        total_bytes: Some(2048),
                        phase: TransferPhase::Finished,
                    })
                    .await;
                Ok(())
            }
        }
    }
}
