//! Config file loading and CLI precedence.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dlqueue_core::config::{
    DEFAULT_DB_HOST, DEFAULT_DB_NAME, DEFAULT_DB_PORT, DEFAULT_DB_USER, DEFAULT_WORKERS,
    MAX_WORKERS, MIN_WORKERS,
};
use dlqueue_core::{FetchConfig, PoolConfig, StoreConfig};
use serde::Deserialize;

use crate::cli::Args;

/// TOML-backed file configuration; every key mirrors a CLI flag.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub workers: Option<usize>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    /// Local `SQLite` queue file; selects the `SQLite` backend when set.
    pub sqlite: Option<PathBuf>,
    pub format: Option<String>,
    pub output_template: Option<String>,
    pub ytdlp: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(MIN_WORKERS..=MAX_WORKERS).contains(&workers)
        {
            bail!(
                "Invalid config value for `workers`: {workers}. Expected range: {MIN_WORKERS}..={MAX_WORKERS}"
            );
        }
        if self.db_port == Some(0) {
            bail!("Invalid config value for `db_port`: 0. Expected range: 1..=65535");
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path the config was read from, or would have been.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dlqueue/config.toml`
/// 2. `$HOME/.config/dlqueue/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_path_from(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

fn default_config_path_from(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("dlqueue")
                .join("config.toml"),
        );
    }

    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dlqueue")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file for this run.
///
/// An explicit path must exist. The default path is read only if present, and
/// `skip_default` ignores it entirely.
pub fn load_config(explicit: Option<&Path>, skip_default: bool) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    if skip_default {
        return Ok(LoadedConfig::default());
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path) if path.exists() => Some(load_file_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Merges CLI arguments over file values over built-in defaults.
pub fn build_pool_config(args: &Args, file: Option<&FileConfig>) -> Result<PoolConfig> {
    let file = file.cloned().unwrap_or_default();

    let store = match args.sqlite.clone().or(file.sqlite) {
        Some(path) => StoreConfig::Sqlite { path },
        None => StoreConfig::Postgres {
            host: args
                .db_host
                .clone()
                .or(file.db_host)
                .unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: args.db_port.or(file.db_port).unwrap_or(DEFAULT_DB_PORT),
            user: args
                .db_user
                .clone()
                .or(file.db_user)
                .unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: args.db_password.clone().or(file.db_password),
            database: args
                .db_name
                .clone()
                .or(file.db_name)
                .unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
        },
    };

    let defaults = FetchConfig::default();
    let fetch = FetchConfig {
        program: args.ytdlp.clone().or(file.ytdlp).unwrap_or(defaults.program),
        format: args.format.clone().or(file.format).unwrap_or(defaults.format),
        filename_template: args
            .output_template
            .clone()
            .or(file.output_template)
            .unwrap_or(defaults.filename_template),
    };

    let config = PoolConfig {
        workers: args
            .workers
            .map(usize::from)
            .or(file.workers)
            .unwrap_or(DEFAULT_WORKERS),
        store,
        fetch,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
