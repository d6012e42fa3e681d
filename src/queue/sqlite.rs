//! `SQLite` queue store.
//!
//! `SQLite` has no row locks; a writer holds the database write lock for the
//! duration of its statement. The claim is therefore one `UPDATE ... RETURNING`
//! statement whose sub-select picks the lowest pending id, which makes the
//! select-and-mark step atomic with respect to every other connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, instrument};

use super::{
    JobHandle, JobRecord, JobStatus, QueueError, QueueStore, WorkerId, check_affected,
    close_quietly, log_failure,
};

/// `SQLite` busy timeout in milliseconds.
/// Connections will wait this long for the write lock before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Queue store over a `SQLite` database file.
///
/// Holds only connect options; cloning it shares no connection or state.
#[derive(Debug, Clone)]
pub struct SqliteQueueStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteQueueStore {
    /// Creates a store for an existing database file.
    ///
    /// The file must already contain the `download_queue` table.
    #[must_use]
    pub fn new(db_path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .disable_statement_logging();

        Self {
            path: db_path.to_path_buf(),
            options,
        }
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<SqliteConnection, QueueError> {
        Ok(SqliteConnection::connect_with(&self.options).await?)
    }

    async fn try_claim(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        let mut conn = self.connect().await?;
        let row: Result<Option<(i64, String, String)>, sqlx::Error> =
            sqlx::query_as(
                r"UPDATE download_queue
                  SET status = ?, worker_id = ?
                  WHERE id = (
                      SELECT id FROM download_queue
                      WHERE status = ?
                      ORDER BY id
                      LIMIT 1
                  )
                  RETURNING id, url, path",
            )
            .bind(JobStatus::InProgress.code())
            .bind(worker.as_str())
            .bind(JobStatus::Pending.code())
            .fetch_optional(&mut conn)
            .await;
        close_quietly(conn).await;

        Ok(row?.map(|(id, url, path)| JobHandle::claimed(id, url, path)))
    }

    async fn try_close(&self, id: i64, status: JobStatus) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET status = ? WHERE id = ?")
            .bind(status.code())
            .bind(id)
            .execute(&mut conn)
            .await;
        close_quietly(conn).await;

        check_affected(id, outcome?.rows_affected())
    }

    async fn try_set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET filename = ? WHERE id = ?")
            .bind(filename)
            .bind(id)
            .execute(&mut conn)
            .await;
        close_quietly(conn).await;

        check_affected(id, outcome?.rows_affected())
    }

    async fn try_set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET percent_done = ? WHERE id = ?")
            .bind(percent)
            .bind(id)
            .execute(&mut conn)
            .await;
        close_quietly(conn).await;

        check_affected(id, outcome?.rows_affected())
    }

    async fn try_get(&self, id: i64) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.connect().await?;
        let row = sqlx::query_as::<_, JobRecord>(
            r"SELECT id, url, path, status, worker_id, filename, percent_done
              FROM download_queue WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut conn)
        .await;
        close_quietly(conn).await;

        Ok(row?)
    }

    async fn try_list_all(&self) -> Result<Vec<JobRecord>, QueueError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query_as::<_, JobRecord>(
            r"SELECT id, url, path, status, worker_id, filename, percent_done
              FROM download_queue ORDER BY id",
        )
        .fetch_all(&mut conn)
        .await;
        close_quietly(conn).await;

        Ok(rows?)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    #[instrument(skip(self), fields(worker = %worker))]
    async fn claim_next(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        let claimed = log_failure("claim_next", self.try_claim(worker).await)?;
        if let Some(job) = &claimed {
            debug!(job_id = job.id(), "claimed job");
        }
        Ok(claimed)
    }

    #[instrument(skip(self))]
    async fn close_job(&self, id: i64, status: JobStatus) -> Result<(), QueueError> {
        log_failure("close_job", self.try_close(id, status).await)
    }

    #[instrument(skip(self))]
    async fn set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError> {
        log_failure("set_filename", self.try_set_filename(id, filename).await)
    }

    #[instrument(level = "trace", skip(self))]
    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError> {
        log_failure("set_percent", self.try_set_percent(id, percent).await)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<JobRecord>, QueueError> {
        log_failure("get", self.try_get(id).await)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<JobRecord>, QueueError> {
        log_failure("list_all", self.try_list_all().await)
    }
}
