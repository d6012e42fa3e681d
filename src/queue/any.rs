//! Runtime-selected queue backend.

use async_trait::async_trait;

use super::{
    JobHandle, JobRecord, JobStatus, PgQueueStore, QueueError, QueueStore, SqliteQueueStore,
    WorkerId,
};

/// Either backend, chosen from configuration at startup.
#[derive(Debug, Clone)]
pub enum AnyQueueStore {
    Postgres(PgQueueStore),
    Sqlite(SqliteQueueStore),
}

impl AnyQueueStore {
    /// Backend name for logs.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl From<PgQueueStore> for AnyQueueStore {
    fn from(store: PgQueueStore) -> Self {
        Self::Postgres(store)
    }
}

impl From<SqliteQueueStore> for AnyQueueStore {
    fn from(store: SqliteQueueStore) -> Self {
        Self::Sqlite(store)
    }
}

#[async_trait]
impl QueueStore for AnyQueueStore {
    async fn claim_next(&self, worker: &WorkerId) -> Result<Option<JobHandle>, QueueError> {
        match self {
            Self::Postgres(store) => store.claim_next(worker).await,
            Self::Sqlite(store) => store.claim_next(worker).await,
        }
    }

    async fn close_job(&self, id: i64, status: JobStatus) -> Result<(), QueueError> {
        match self {
            Self::Postgres(store) => store.close_job(id, status).await,
            Self::Sqlite(store) => store.close_job(id, status).await,
        }
    }

    async fn set_filename(&self, id: i64, filename: &str) -> Result<(), QueueError> {
        match self {
            Self::Postgres(store) => store.set_filename(id, filename).await,
            Self::Sqlite(store) => store.set_filename(id, filename).await,
        }
    }

    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), QueueError> {
        match self {
            Self::Postgres(store) => store.set_percent(id, percent).await,
            Self::Sqlite(store) => store.set_percent(id, percent).await,
        }
    }

    async fn get(&self, id: i64) -> Result<Option<JobRecord>, QueueError> {
        match self {
            Self::Postgres(store) => store.get(id).await,
            Self::Sqlite(store) => store.get(id).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<JobRecord>, QueueError> {
        match self {
            Self::Postgres(store) => store.list_all().await,
            Self::Sqlite(store) => store.list_all().await,
        }
    }
}
