//! Configuration file loading for supersast.
//!
//! Discovers and loads `supersast.toml` from the config directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use supersast_core::settings::{
    ConflictPolicy, DEFAULT_TIMEOUT_SECS, DEFAULT_TRANSCRIPT, DEFAULT_VALIDATOR_POM,
    DEFAULT_VALIDATOR_REPO,
};
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "supersast.toml";

/// Top-level configuration from supersast.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupersastConfig {
    pub runner: RunnerConfig,
    pub maven: MavenConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Per-tool time budget in seconds.
    pub timeout_secs: Option<u64>,

    /// Where the combined log is written.
    pub transcript: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MavenConfig {
    /// Catalog of validator plugins merged into the project descriptor.
    pub validator_pom: Option<Utf8PathBuf>,

    /// Bundled Maven repository copied to `$M2_HOME/.m2`.
    pub validator_repo: Option<Utf8PathBuf>,

    /// Fail a Maven tool instead of warning when plugin versions conflict.
    pub fail_on_conflict: Option<bool>,
}

/// Discover the supersast.toml config file.
///
/// Returns `None` if no config file is found.
pub fn discover_config(config_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a supersast.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<SupersastConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<SupersastConfig> {
    let config: SupersastConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the config dir, or return default if not found.
pub fn load_or_default(config_dir: &Utf8Path) -> anyhow::Result<SupersastConfig> {
    match discover_config(config_dir) {
        Some(path) => load_config(&path),
        None => Ok(SupersastConfig::default()),
    }
}

/// Values given on the command line; `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub timeout_secs: Option<u64>,
    pub transcript: Option<Utf8PathBuf>,
    pub no_transcript: bool,
    pub validator_pom: Option<Utf8PathBuf>,
    pub validator_repo: Option<Utf8PathBuf>,
    pub fail_on_conflict: bool,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub timeout_secs: u64,
    /// `None` when the transcript is disabled.
    pub transcript: Option<Utf8PathBuf>,
    pub validator_pom: Utf8PathBuf,
    pub validator_repo: Utf8PathBuf,
    pub conflict_policy: ConflictPolicy,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: SupersastConfig,
}

impl ConfigMerger {
    pub fn new(config: SupersastConfig) -> Self {
        Self { config }
    }

    /// CLI beats the file, the file beats the built-in defaults.
    pub fn merge(self, cli: &CliOverrides) -> MergedConfig {
        let SupersastConfig { runner, maven } = self.config;

        let transcript = if cli.no_transcript {
            None
        } else {
            Some(
                cli.transcript
                    .clone()
                    .or(runner.transcript)
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_TRANSCRIPT)),
            )
        };

        let fail_on_conflict = cli.fail_on_conflict || maven.fail_on_conflict.unwrap_or(false);

        MergedConfig {
            timeout_secs: cli
                .timeout_secs
                .or(runner.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            transcript,
            validator_pom: cli
                .validator_pom
                .clone()
                .or(maven.validator_pom)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_VALIDATOR_POM)),
            validator_repo: cli
                .validator_repo
                .clone()
                .or(maven.validator_repo)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_VALIDATOR_REPO)),
            conflict_policy: if fail_on_conflict {
                ConflictPolicy::Fail
            } else {
                ConflictPolicy::Warn
            },
        }
    }
}
