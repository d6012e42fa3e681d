//! Error types for queue store operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for queue/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Postgres could not obtain a row or table lock in time.
    LockTimeout,
    /// Postgres serialization failure or detected deadlock.
    Serialization,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Could not reach or authenticate against the store.
    Connection,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl QueueDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Tls(_) | sqlx::Error::Configuration(_) => Self::Connection,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for QueueDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::LockTimeout => "lock_timeout",
            Self::Serialization => "serialization",
            Self::ConstraintViolation => "constraint_violation",
            Self::Connection => "connection",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> QueueDbErrorKind {
    let code = database_error.code();
    match code.as_deref() {
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6") => {
            return QueueDbErrorKind::BusyOrLocked;
        }
        // lock_not_available, query_canceled (statement/lock timeout)
        Some("55P03" | "57014") => return QueueDbErrorKind::LockTimeout,
        // serialization_failure, deadlock_detected
        Some("40001" | "40P01") => return QueueDbErrorKind::Serialization,
        // invalid_authorization_specification, invalid_password, connection class
        Some(c) if c.starts_with("08") || c == "28000" || c == "28P01" => {
            return QueueDbErrorKind::Connection;
        }
        _ => {}
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT") || value.starts_with("23"))
    {
        return QueueDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return QueueDbErrorKind::BusyOrLocked;
    }

    QueueDbErrorKind::Other
}

/// Errors that can occur during queue store operations.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Database operation failed; the transaction was rolled back.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for logging.
        kind: QueueDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// No row exists for the given job id.
    #[error("job not found: id {0}")]
    JobNotFound(i64),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: QueueDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl QueueError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<QueueDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::JobNotFound(_) => None,
        }
    }
}
