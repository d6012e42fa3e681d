//! Transfer engine seam.
//!
//! The worker loop never talks to a downloader directly. It depends on
//! [`TransferEngine`], which exposes exactly two capabilities: resolving the output
//! filename without transferring content, and downloading while reporting typed
//! [`ProgressUpdate`]s to a [`ProgressSink`].
//!
//! [`YtDlpEngine`] is the shipped implementation; it drives the `yt-dlp`
//! executable as a subprocess.
//!
//! # Example
//!
//! ```no_run
//! use dlqueue_core::engine::{FetchOptions, TransferEngine, YtDlpEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = YtDlpEngine::new("yt-dlp");
//! let options = FetchOptions {
//!     format: "18".to_string(),
//!     output_template: "/srv/media/%(title)s.%(ext)s".to_string(),
//!     no_playlist: true,
//! };
//! let filename = engine.resolve("https://example.com/watch?v=abc", &options).await?;
//! println!("would write {filename}");
//! # Ok(())
//! # }
//! ```

mod error;
mod ytdlp;

pub use error::EngineError;
pub use ytdlp::YtDlpEngine;

use std::fmt;

use async_trait::async_trait;

/// Per-job engine options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Media quality/format selector.
    pub format: String,
    /// Output path template, already placed under the job's destination directory.
    pub output_template: String,
    /// Download only the single item a URL points at, never a playlist around it.
    pub no_playlist: bool,
}

/// Stage of a transfer as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Downloading,
    Finished,
    /// A label the engine emitted that this crate does not model.
    Unknown,
}

impl TransferPhase {
    /// Maps an engine status label to a phase.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "downloading" => Self::Downloading,
            "finished" => Self::Finished,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Downloading => "downloading",
            Self::Finished => "finished",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes written so far for the current file.
    pub downloaded_bytes: u64,
    /// Expected file size; `None` while the engine does not know it.
    pub total_bytes: Option<u64>,
    pub phase: TransferPhase,
}

/// Receiver for progress notifications during [`TransferEngine::download`].
///
/// Implementations must not fail the transfer: anything that goes wrong while
/// handling an update is theirs to log.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, update: ProgressUpdate);
}

/// Content resolution and transfer for a single URL.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Returns the filename a download with `options` would produce.
    ///
    /// Must not transfer any content.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the URL cannot be resolved.
    async fn resolve(&self, url: &str, options: &FetchOptions) -> Result<String, EngineError>;

    /// Downloads `url`, calling `progress` at engine-determined intervals.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the transfer fails at any point.
    async fn download(
        &self,
        url: &str,
        options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_phase_from_label() {
        assert_eq!(TransferPhase::from_label("downloading"), TransferPhase::Downloading);
        assert_eq!(TransferPhase::from_label("finished"), TransferPhase::Finished);
        assert_eq!(TransferPhase::from_label("error"), TransferPhase::Unknown);
    }

    #[test]
    fn test_transfer_phase_display() {
        assert_eq!(TransferPhase::Finished.to_string(), "finished");
    }
}
