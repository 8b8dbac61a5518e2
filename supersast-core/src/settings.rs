//! Clap-free settings for a scan run.

use camino::Utf8PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "/app/config";
pub const DEFAULT_VALIDATOR_POM: &str = "/app/java-validators/pom.xml";
pub const DEFAULT_VALIDATOR_REPO: &str = "/app/java-validators/.m2";
pub const DEFAULT_TRANSCRIPT: &str = "super-sast.log";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Build descriptor looked up in the project root.
pub const PROJECT_DESCRIPTOR: &str = "pom.xml";

/// What to do when a validator plugin is already declared with another version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Log the conflict and run Maven with the partial merge.
    #[default]
    Warn,
    /// Record the tool as failed without running it.
    Fail,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub project_root: Utf8PathBuf,
    /// Absolute; default config files are resolved against it.
    pub config_dir: Utf8PathBuf,
    /// Catalog whose plugins are merged into the project descriptor.
    pub validator_pom: Utf8PathBuf,
    /// Pre-populated Maven repository copied into `$M2_HOME/.m2`.
    pub validator_repo: Utf8PathBuf,
    pub timeout: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            project_root: Utf8PathBuf::from("."),
            config_dir: Utf8PathBuf::from(DEFAULT_CONFIG_DIR),
            validator_pom: Utf8PathBuf::from(DEFAULT_VALIDATOR_POM),
            validator_repo: Utf8PathBuf::from(DEFAULT_VALIDATOR_REPO),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}
