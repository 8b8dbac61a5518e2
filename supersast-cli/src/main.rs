mod config;
mod environs;
mod logging;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use config::{CliOverrides, ConfigMerger, MergedConfig};
use logging::Output;
use std::process::ExitCode;
use std::time::Duration;
use supersast_core::adapters::{
    FsWritePort, SystemProcessRunner, maven_repository_dir, prime_maven_repository,
};
use supersast_core::diagnostics::{ProcessContext, error_chain};
use supersast_core::pipeline::{CoordinatorError, run_all, write_run_artifacts};
use supersast_core::settings::{DEFAULT_CONFIG_DIR, RunSettings};
use supersast_domain::{Environment, ToolRegistry};
use supersast_types::report::ToolInfo;
use tracing::{debug, error, info};

/// Exit status for `--environs` and `--dump-config`.
const EXIT_INFO_ONLY: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "supersast",
    version,
    about = "Run the bundled SAST and dependency scanners against a project checkout."
)]
struct Cli {
    /// Directory containing tool config files and supersast.toml.
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: Utf8PathBuf,

    /// Print the environment variables each tool reads and exit.
    #[arg(long, default_value_t = false)]
    environs: bool,

    /// Print the effective per-tool configuration and exit.
    #[arg(long, default_value_t = false)]
    dump_config: bool,

    /// Project checkout to scan (default: current directory).
    #[arg(long, default_value = ".")]
    project_root: Utf8PathBuf,

    /// Combined log of orchestrator lines and tool output (default: super-sast.log).
    #[arg(long)]
    transcript: Option<Utf8PathBuf>,

    /// Do not write a transcript file.
    #[arg(long, default_value_t = false, conflicts_with = "transcript")]
    no_transcript: bool,

    /// Per-tool time budget in seconds (default: 600).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Catalog of validator plugins merged into the project's pom.xml.
    #[arg(long)]
    validator_pom: Option<Utf8PathBuf>,

    /// Bundled Maven repository copied to $M2_HOME/.m2 before scanning.
    #[arg(long)]
    validator_repo: Option<Utf8PathBuf>,

    /// Do not run a Maven tool when a validator plugin version conflicts.
    #[arg(long, default_value_t = false)]
    fail_on_conflict: bool,

    /// Write the run report as JSON.
    #[arg(long)]
    report: Option<Utf8PathBuf>,

    /// Write a markdown summary of the run.
    #[arg(long)]
    summary: Option<Utf8PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            timeout_secs: self.timeout_secs,
            transcript: self.transcript.clone(),
            no_transcript: self.no_transcript,
            validator_pom: self.validator_pom.clone(),
            validator_repo: self.validator_repo.clone(),
            fail_on_conflict: self.fail_on_conflict,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = Environment::from_process();
    let registry = ToolRegistry::builtin();

    let config_dir = match absolute(&cli.config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            Output::default().init_tracing();
            error!("{:?}", e);
            return ExitCode::from(1);
        }
    };

    if cli.environs || cli.dump_config {
        let text = if cli.dump_config {
            environs::dump_config_text(&registry, &env, &config_dir)
        } else {
            environs::environs_text(&registry, &env, &config_dir)
        };
        print!("{}", text);
        return ExitCode::from(EXIT_INFO_ONLY);
    }

    let merged = match config::load_or_default(&config_dir)
        .context("load supersast.toml config")
        .map(|file| ConfigMerger::new(file).merge(&cli.overrides()))
    {
        Ok(merged) => merged,
        Err(e) => {
            Output::default().init_tracing();
            error!("{:?}", e);
            return ExitCode::from(1);
        }
    };

    let output = match Output::open(merged.transcript.as_deref()) {
        Ok(output) => output,
        Err(e) => {
            Output::default().init_tracing();
            report_abort(&e);
            return ExitCode::from(1);
        }
    };
    output.init_tracing();
    debug!(?merged, "merged config");

    match real_main(&cli, &merged, config_dir, &env, &registry, &output) {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            report_abort(&e);
            ExitCode::from(1)
        }
    }
}

fn real_main(
    cli: &Cli,
    merged: &MergedConfig,
    config_dir: Utf8PathBuf,
    env: &Environment,
    registry: &ToolRegistry,
    output: &Output,
) -> anyhow::Result<bool> {
    let settings = RunSettings {
        project_root: absolute(&cli.project_root)?,
        config_dir,
        validator_pom: merged.validator_pom.clone(),
        validator_repo: merged.validator_repo.clone(),
        timeout: Duration::from_secs(merged.timeout_secs),
        conflict_policy: merged.conflict_policy,
    };

    prime_maven_repository(&settings.validator_repo, &maven_repository_dir(env));

    let tool = ToolInfo {
        name: "supersast".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };
    let mut sink = output.sink();
    let report = run_all(
        &settings,
        env,
        registry,
        &SystemProcessRunner,
        &mut sink,
        tool,
    )
    .map_err(|err| match err {
        CoordinatorError::Internal(inner) => inner,
        other => anyhow::Error::from(other),
    })?;

    write_run_artifacts(
        &report,
        cli.report.as_deref(),
        cli.summary.as_deref(),
        &FsWritePort,
    )?;

    let counts = &report.verdict.counts;
    if report.passed() {
        info!(
            "scan passed: {} passed, {} skipped",
            counts.passed, counts.skipped
        );
    } else {
        error!(
            "scan failed: {} passed, {} failed, {} skipped",
            counts.passed, counts.failed, counts.skipped
        );
    }
    Ok(report.passed())
}

fn absolute(path: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
    let abs = std::path::absolute(path).with_context(|| format!("resolve {}", path))?;
    Utf8PathBuf::from_path_buf(abs)
        .map_err(|p| anyhow::anyhow!("path is not valid UTF-8: {}", p.display()))
}

fn report_abort(err: &anyhow::Error) {
    error!(
        "An exception occurred while running SAST, context information below\n{}\n - Error:\n{}",
        ProcessContext::capture(),
        error_chain(err)
    );
}
