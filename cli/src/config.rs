//! Settings layering
//!
//! Settings come from an optional TOML file, then `SQL_EXPORT_*` environment
//! variables, then command-line flags. Later layers win.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sql_export_core::domain::SchedulingStrategy;

/// Settings file looked up in the working directory when `--settings` is absent
pub const DEFAULT_SETTINGS_FILE: &str = "sql-export.toml";

/// Prefix of environment variables carrying settings
pub const ENV_PREFIX: &str = "SQL_EXPORT";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings shared by every layer. `None` leaves the value to a lower layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// ADO.NET style connection string
    pub connection: Option<String>,
    pub output: Option<PathBuf>,
    /// Database inclusion list file
    pub databases: Option<PathBuf>,
    /// Object inclusion list file
    pub objects: Option<PathBuf>,
    pub strategy: Option<SchedulingStrategy>,
    pub parallel: Option<usize>,
    pub keep_partial: Option<bool>,
    pub log_format: Option<LogFormat>,
    pub verbosity: Option<String>,
}

impl Settings {
    /// Load the file and environment layers. An explicit `path` must exist;
    /// the default settings file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path.to_path_buf()).required(true),
            None => ::config::File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        ::config::Config::builder()
            .add_source(file)
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Layer `overrides` on top of `self`
    pub fn overlay(self, overrides: Settings) -> Settings {
        Settings {
            connection: overrides.connection.or(self.connection),
            output: overrides.output.or(self.output),
            databases: overrides.databases.or(self.databases),
            objects: overrides.objects.or(self.objects),
            strategy: overrides.strategy.or(self.strategy),
            parallel: overrides.parallel.or(self.parallel),
            keep_partial: overrides.keep_partial.or(self.keep_partial),
            log_format: overrides.log_format.or(self.log_format),
            verbosity: overrides.verbosity.or(self.verbosity),
        }
    }
}

/// Rewrite the legacy single-dash `-db=<name>` / `-db <name>` spelling into
/// `--db`, which clap would otherwise read as `-d b`
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            if arg == "-db" {
                "--db".to_string()
            } else if let Some(name) = arg.strip_prefix("-db=") {
                format!("--db={}", name)
            } else {
                arg
            }
        })
        .collect()
}
