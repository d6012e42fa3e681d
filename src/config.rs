//! Runtime configuration for the worker pool.
//!
//! Everything a worker needs is passed in through [`PoolConfig`]; nothing is read
//! from process-wide globals. The binary builds a `PoolConfig` from its CLI
//! arguments and optional config file.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

use crate::engine::FetchOptions;
use crate::queue::{AnyQueueStore, JobHandle, PgQueueStore, SqliteQueueStore};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 256;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 12;

/// Default store host.
pub const DEFAULT_DB_HOST: &str = "127.0.0.1";

/// Default store port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default store user.
pub const DEFAULT_DB_USER: &str = "dlqueue";

/// Default store database name.
pub const DEFAULT_DB_NAME: &str = "dlqueue";

/// Default format selector: 720p progressive MP4 variants, in order of preference.
pub const DEFAULT_FORMAT: &str = "22[height=720]/17[height=720]/18[height=720]";

/// Default output filename template, relative to the job's destination directory.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Default transfer engine executable.
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Worker count outside the accepted range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// A required text field was empty.
    #[error("`{field}` must not be empty")]
    Empty {
        /// Name of the empty field.
        field: &'static str,
    },

    /// Store port was zero.
    #[error("invalid store port 0")]
    InvalidPort,
}

/// Where the queue table lives.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// A `PostgreSQL` server.
    Postgres {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
    },
    /// A local `SQLite` file.
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Postgres {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: None,
            database: DEFAULT_DB_NAME.to_string(),
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres {
                host,
                port,
                user,
                password,
                database,
            } => f
                .debug_struct("Postgres")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .field("database", database)
                .finish(),
            Self::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
        }
    }
}

impl StoreConfig {
    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty host/user/database/path or a zero port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Postgres {
                host,
                port,
                user,
                database,
                ..
            } => {
                require_non_empty("db_host", host)?;
                require_non_empty("db_user", user)?;
                require_non_empty("db_name", database)?;
                if *port == 0 {
                    return Err(ConfigError::InvalidPort);
                }
                Ok(())
            }
            Self::Sqlite { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Empty { field: "sqlite" });
                }
                Ok(())
            }
        }
    }

    /// Short human-readable location for logs (no credentials).
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Postgres {
                host,
                port,
                user,
                database,
                ..
            } => format!("postgres://{user}@{host}:{port}/{database}"),
            Self::Sqlite { path } => format!("sqlite:{}", path.display()),
        }
    }

    /// Builds the store this configuration points at.
    #[must_use]
    pub fn open(&self) -> AnyQueueStore {
        match self {
            Self::Postgres {
                host,
                port,
                user,
                password,
                database,
            } => PgQueueStore::new(pg_connect_options(
                host,
                *port,
                user,
                password.as_deref(),
                database,
            ))
            .into(),
            Self::Sqlite { path } => SqliteQueueStore::new(path).into(),
        }
    }
}

fn pg_connect_options(
    host: &str,
    port: u16,
    user: &str,
    password: Option<&str>,
    database: &str,
) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .database(database);
    match password {
        Some(password) => options.password(password),
        None => options,
    }
}

/// Transfer engine settings shared by every job.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    /// Engine executable.
    pub program: PathBuf,
    /// Media quality/format selector.
    pub format: String,
    /// Output filename template, joined onto each job's destination directory.
    pub filename_template: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            format: DEFAULT_FORMAT.to_string(),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
        }
    }
}

impl FetchConfig {
    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Empty`] for an empty program, format, or template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.as_os_str().is_empty() {
            return Err(ConfigError::Empty { field: "program" });
        }
        require_non_empty("format", &self.format)?;
        require_non_empty("filename_template", &self.filename_template)
    }

    /// Engine options for one job: the template is placed under the job's directory.
    #[must_use]
    pub fn options_for(&self, job: &JobHandle) -> FetchOptions {
        FetchOptions {
            format: self.format.clone(),
            output_template: job
                .path()
                .join(&self.filename_template)
                .to_string_lossy()
                .into_owned(),
            no_playlist: true,
        }
    }
}

/// Everything needed to start a worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Queue store location.
    pub store: StoreConfig,
    /// Transfer engine settings.
    pub fetch: FetchConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            store: StoreConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::InvalidWorkers {
                value: self.workers,
            });
        }
        self.store.validate()?;
        self.fetch.validate()
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty { field })
    } else {
        Ok(())
    }
}
