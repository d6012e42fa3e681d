//! `PostgreSQL` queue store.
//!
//! The claim runs `SELECT ... ORDER BY id LIMIT 1 FOR UPDATE` and the ownership
//! `UPDATE` inside one transaction. A concurrent claimer that selects the same row
//! blocks on the row lock until the first transaction commits; Postgres then
//! re-checks `status = 0` against the committed row and drops it from the result,
//! so the second claimer may see an empty result even while later rows are still
//! pending. Workers treat that as a drained queue.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, instrument};

use super::{
    JobHandle, JobRecord, JobStatus, QueueError, QueueStore, WorkerId, check_affected,
    close_quietly, log_failure,
};

const SELECT_NEXT_PENDING: &str = r"
SELECT id, url, path
FROM download_queue
WHERE status = $1
ORDER BY id
LIMIT 1
FOR UPDATE";

const MARK_CLAIMED: &str = r"
UPDATE download_queue
SET status = $1, worker_id = $2
WHERE id = $3";

/// Queue store over a `PostgreSQL` database.
///
/// Holds only connect options; cloning it shares no connection or state.
#[derive(Debug, Clone)]
pub struct PgQueueStore {
    options: PgConnectOptions,
}

impl PgQueueStore {
    /// Creates a store from connect options.
    #[must_use]
    pub fn new(options: PgConnectOptions) -> Self {
        Self {
            options: options.disable_statement_logging(),
        }
    }

    /// Creates a store from a `postgres://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`](super::QueueError::Database) if the URL
    /// cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self, QueueError> {
        let options: PgConnectOptions = url.parse()?;
        Ok(Self::new(options))
    }

    async fn connect(&self) -> Result<PgConnection, QueueError> {
        Ok(PgConnection::connect_with(&self.options).await?)
    }

    async fn try_claim(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        let mut conn = self.connect().await?;
        let claimed = claim_in_transaction(&mut conn, worker).await;
        close_quietly(conn).await;
        claimed
    }

    async fn try_close(&self, id: i64, status: JobStatus) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET status = $1 WHERE id = $2")
            .bind(status.code())
            .bind(id)
            .execute(&mut conn)
            .await;
        close_quietly(conn).await;

        check_affected(id, outcome?.rows_affected())
    }

    async fn try_set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET filename = $1 WHERE id = $2")
            .bind(filename)
            .bind(id)
            .execute(&mut conn)
            .await;
        close_quietly(conn).await;

        check_affected(id, outcome?.rows_affected())
    }

    async fn try_set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(r"UPDATE download_queue SET percent_done = $1 WHERE id = $2")
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
              FROM download_queue WHERE id = $1",
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

/// Locks the next pending row, marks it owned by `worker`, and commits.
///
/// An error drops the transaction before commit, which rolls it back.
async fn claim_in_transaction(
    conn: &mut PgConnection,
    worker: &WorkerId,
) -> Result<Option<JobHandle>, QueueError> {
    let mut tx = conn.begin().await?;

    let row: Option<(i64, String, String)> = sqlx::query_as(SELECT_NEXT_PENDING)
        .bind(JobStatus::Pending.code())
        .fetch_optional(&mut *tx)
        .await?;

    let Some((id, url, path)) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(MARK_CLAIMED)
        .bind(JobStatus::InProgress.code())
        .bind(worker.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(JobHandle::claimed(id, url, path)))
}

#[async_trait]
impl QueueStore for PgQueueStore {
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
