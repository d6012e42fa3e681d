//! Error types for transfer engine operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a [`TransferEngine`](super::TransferEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be started.
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        /// Executable that was invoked.
        program: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Metadata resolution failed.
    #[error("could not resolve {url}: {detail}")]
    Resolve {
        /// The URL being resolved.
        url: String,
        /// Exit status and the tail of the engine's error output.
        detail: String,
    },

    /// Resolution succeeded but named no output file.
    #[error("engine produced no filename for {url}")]
    MissingOutput {
        /// The URL being resolved.
        url: String,
    },

    /// The transfer failed part-way or the engine exited unsuccessfully.
    #[error("transfer of {url} failed: {detail}")]
    Transfer {
        /// The URL being downloaded.
        url: String,
        /// Exit status and the tail of the engine's error output.
        detail: String,
    },
}

impl EngineError {
    /// Creates a resolve error.
    pub fn resolve(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Resolve {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates a transfer error.
    pub fn transfer(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transfer {
            url: url.into(),
            detail: detail.into(),
        }
    }
}
