//! `yt-dlp` subprocess engine.
//!
//! Resolution runs the executable in simulate mode and reads the predicted
//! filename from stdout. Downloads run it with a custom progress template so every
//! progress line can be parsed without scraping the human-readable bar.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument, trace};

use super::{
    EngineError, FetchOptions, ProgressSink, ProgressUpdate, TransferEngine, TransferPhase,
};

/// Marker that starts every progress line this engine asks for.
const PROGRESS_MARKER: &str = "[dlqueue]";

/// `--progress-template` value: marker, status, downloaded bytes, total bytes.
const PROGRESS_TEMPLATE: &str = "download:[dlqueue] %(progress.status)s \
     %(progress.downloaded_bytes)s %(progress.total_bytes)s";

/// How much engine error output is kept in an error message.
const STDERR_TAIL_CHARS: usize = 400;

/// Transfer engine backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl YtDlpEngine {
    /// Creates an engine that invokes `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, options: &FetchOptions) -> Command {
        let mut command = Command::new(&self.program);
        if options.no_playlist {
            command.arg("--no-playlist");
        }
        command
            .arg("-f")
            .arg(&options.format)
            .arg("-o")
            .arg(&options.output_template)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl TransferEngine for YtDlpEngine {
    #[instrument(skip(self, options), fields(format = %options.format))]
    async fn resolve(&self, url: &str, options: &FetchOptions) -> Result<String, EngineError> {
        let output = self
            .command(options)
            .args(["--simulate", "--no-warnings", "--print", "filename", "--"])
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::resolve(
                url,
                exit_detail(output.status, &output.stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let filename = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| EngineError::MissingOutput {
                url: url.to_string(),
            })?;

        debug!(filename, "resolved output filename");
        Ok(filename.to_string())
    }

    #[instrument(skip(self, options, progress), fields(format = %options.format))]
    async fn download(
        &self,
        url: &str,
        options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let mut child = self
            .command(options)
            .args(["--newline", "--progress-template", PROGRESS_TEMPLATE, "--"])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::transfer(url, "stdout was not captured"))?;

        // Drained concurrently so a chatty engine never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!(error = %e, "reading engine stderr failed");
                }
                buf
            })
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(EngineError::transfer(url, format!("reading output: {e}"))),
            };
            if let Some(update) = parse_progress_line(&line) {
                progress.on_progress(update).await;
            } else {
                trace!(line = %line, "engine output");
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::transfer(url, format!("waiting for engine: {e}")))?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::transfer(url, exit_detail(status, &stderr)))
        }
    }
}

/// Parses one line produced by [`PROGRESS_TEMPLATE`].
///
/// Returns `None` for any other line, and for progress lines whose downloaded
/// byte count is unknown. A total of `NA` becomes `total_bytes: None`.
fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let mut fields = line.trim().strip_prefix(PROGRESS_MARKER)?.split_whitespace();

    let phase = TransferPhase::from_label(fields.next()?);
    let downloaded_bytes = parse_byte_count(fields.next()?)?;
    let total_bytes = fields.next().and_then(parse_byte_count);

    Some(ProgressUpdate {
        downloaded_bytes,
        total_bytes,
        phase,
    })
}

fn parse_byte_count(field: &str) -> Option<u64> {
    match field {
        "NA" | "None" => None,
        value => value.parse().ok(),
    }
}

fn exit_detail(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let tail = stderr_tail(&stderr);
    if tail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {tail}")
    }
}

/// Last non-empty line of engine error output, capped at [`STDERR_TAIL_CHARS`].
fn stderr_tail(stderr: &str) -> String {
    let line = stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default();
    line.chars().take(STDERR_TAIL_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line_with_known_total() {
        let update = parse_progress_line("[dlqueue] downloading 1024 4096").unwrap();
        assert_eq!(update.downloaded_bytes, 1024);
        assert_eq!(update.total_bytes, Some(4096));
        assert_eq!(update.phase, TransferPhase::Downloading);
    }

    #[test]
    fn test_parse_progress_line_unknown_total() {
        let update = parse_progress_line("[dlqueue] downloading 1024 NA").unwrap();
        assert_eq!(update.total_bytes, None);
    }

    #[test]
    fn test_parse_progress_line_finished() {
        let update = parse_progress_line("  [dlqueue] finished 4096 4096\n").unwrap();
        assert_eq!(update.phase, TransferPhase::Finished);
        assert_eq!(update.downloaded_bytes, 4096);
    }

    #[test]
    fn test_parse_progress_line_unknown_downloaded_is_skipped() {
        assert!(parse_progress_line("[dlqueue] downloading NA 4096").is_none());
    }

    #[test]
    fn test_parse_progress_line_ignores_other_output() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("").is_none());
        assert!(parse_progress_line("[dlqueue]").is_none());
    }

    #[test]
    fn test_progress_template_matches_parser() {
        let rendered = PROGRESS_TEMPLATE
            .trim_start_matches("download:")
            .replace("%(progress.status)s", "downloading")
            .replace("%(progress.downloaded_bytes)s", "10")
            .replace("%(progress.total_bytes)s", "20");
        let update = parse_progress_line(&rendered).unwrap();
        assert_eq!(update.downloaded_bytes, 10);
        assert_eq!(update.total_bytes, Some(20));
    }

    #[test]
    fn test_stderr_tail_keeps_last_line() {
        let stderr = "WARNING: something\nERROR: Unsupported URL: https://x\n\n";
        assert_eq!(stderr_tail(stderr), "ERROR: Unsupported URL: https://x");
        assert_eq!(stderr_tail(""), "");
    }

    #[test]
    fn test_stderr_tail_is_capped() {
        let long = "e".repeat(STDERR_TAIL_CHARS * 2);
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_CHARS);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let engine = YtDlpEngine::new("/nonexistent/dlqueue-test/yt-dlp");
        let options = FetchOptions {
            format: "18".to_string(),
            output_template: "/tmp/%(title)s.%(ext)s".to_string(),
            no_playlist: true,
        };

        let result = engine.resolve("https://example.com/v", &options).await;
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
    }
}
