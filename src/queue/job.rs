//! Job row types, status codes, and worker identity.

use std::fmt;
use std::path::Path;

use sqlx::FromRow;

/// Lifecycle status of a queued job.
///
/// Stored as an integer column: `0` pending, `1` in progress, `2` done, `-1` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// Downloaded successfully. Terminal.
    Done,
    /// Resolution or transfer failed. Terminal.
    Error,
}

impl JobStatus {
    /// Returns the integer stored in the `status` column.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Done => 2,
            Self::Error => -1,
        }
    }

    /// Maps a `status` column value back to a status.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Done),
            -1 => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns the stable string label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity a worker writes into `worker_id` when it claims a job.
///
/// Pool workers use `<pid>-<slot>`. [`WorkerId::unknown`] (`"0"`) exists for
/// diagnostics only and carries no uniqueness guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    /// Creates an identity from an arbitrary token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Identity for pool slot `slot` in the current process.
    #[must_use]
    pub fn for_slot(slot: usize) -> Self {
        Self(format!("{}-{slot}", std::process::id()))
    }

    /// The "unknown worker" identity.
    #[must_use]
    pub fn unknown() -> Self {
        Self("0".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to work on a claimed job.
///
/// Only a [`QueueStore`](super::QueueStore) implementation can create one, and
/// only after the ownership update has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: i64,
    url: String,
    path: String,
}

impl JobHandle {
    pub(crate) fn claimed(id: i64, url: String, path: String) -> Self {
        Self { id, url, path }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Source locator.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Destination directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} ({} -> {})", self.id, self.url, self.path)
    }
}

/// A full `download_queue` row.
#[derive(Debug, Clone, FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub url: String,
    pub path: String,
    /// Raw `status` column, parsed via [`JobRecord::status`].
    #[sqlx(rename = "status")]
    pub status_code: i32,
    /// Last worker that claimed the job.
    pub worker_id: Option<String>,
    /// Resolved output file path, set after metadata resolution.
    pub filename: Option<String>,
    /// Last persisted completion percentage.
    pub percent_done: Option<f64>,
}

impl JobRecord {
    /// Returns the parsed status, or `None` for a code outside the known set.
    #[must_use]
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_code(self.status_code)
    }
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status()
            .map_or_else(|| self.status_code.to_string(), |s| s.to_string());
        write!(
            f,
            "JobRecord {{ id: {}, url: {}, status: {} }}",
            self.id, self.url, status
        )
    }
}
