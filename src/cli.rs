//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;

/// Drain a shared download queue with a pool of workers.
///
/// Every worker claims the oldest pending job, resolves its output filename,
/// downloads it with yt-dlp, and records the outcome. The process exits once
/// every worker has found the queue empty.
#[derive(Parser)]
#[command(name = "dlqueue")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of concurrent workers (1-256) [default: 12]
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub workers: Option<u16>,

    /// PostgreSQL host [default: 127.0.0.1]
    #[arg(long, value_name = "HOST")]
    pub db_host: Option<String>,

    /// PostgreSQL port [default: 5432]
    #[arg(long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub db_port: Option<u16>,

    /// PostgreSQL user [default: dlqueue]
    #[arg(long, value_name = "USER")]
    pub db_user: Option<String>,

    /// PostgreSQL password
    #[arg(long, value_name = "PASSWORD", env = "DLQUEUE_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// PostgreSQL database name [default: dlqueue]
    #[arg(long, value_name = "NAME")]
    pub db_name: Option<String>,

    /// Use a local SQLite queue file instead of PostgreSQL
    #[arg(long, value_name = "PATH")]
    pub sqlite: Option<PathBuf>,

    /// Media format selector passed to yt-dlp
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Output filename template, relative to each job's directory [default: %(title)s.%(ext)s]
    #[arg(short = 'o', long, value_name = "TEMPLATE")]
    pub output_template: Option<String>,

    /// Path to the yt-dlp executable [default: yt-dlp]
    #[arg(long, value_name = "PATH")]
    pub ytdlp: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/dlqueue/config.toml)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Ignore the default config file
    #[arg(long, conflicts_with = "config")]
    pub no_config: bool,
}

impl Args {
    /// Default tracing filter for the verbosity flags.
    ///
    /// Priority: quiet flag > verbose flag > default (info). `RUST_LOG` overrides
    /// all of them at subscriber setup.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .field("workers", &self.workers)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_user", &self.db_user)
            .field("db_password", &self.db_password.as_ref().map(|_| "<redacted>"))
            .field("db_name", &self.db_name)
            .field("sqlite", &self.sqlite)
            .field("format", &self.format)
            .field("output_template", &self.output_template)
            .field("ytdlp", &self.ytdlp)
            .field("config", &self.config)
            .field("no_config", &self.no_config)
            .finish()
    }
}
