//! The run coordinator: plan each tool, prepare Maven descriptors, execute,
//! aggregate.
//!
//! Execution and file output go through the port traits, so the whole run can
//! be driven with fakes.

use crate::ports::{Invocation, ProcessError, ProcessExit, ProcessRunner, WritePort};
use crate::settings::{ConflictPolicy, PROJECT_DESCRIPTOR, RunSettings};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use supersast_domain::{
    Environment, FsProjectView, PlanContext, Planner, ResolvedCommand, ToolPlan, ToolRegistry,
};
use supersast_pom::{BuildDescriptor, DescriptorError, MergeReport, merge_plugins_from};
use supersast_render::render_summary_md;
use supersast_types::report::{
    MergeSummary, REJECTED_STATUS, RunReport, SkipReason, TIMEOUT_STATUS, ToolInfo, ToolOutcome,
};
use supersast_types::tool::ToolSpec;
use tracing::{error, info};
use uuid::Uuid;

/// Errors that abort the whole run. Per-tool problems are recorded in the
/// report instead.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("{tool}: {source}")]
    Process {
        tool: String,
        #[source]
        source: ProcessError,
    },
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Prefix of the merged descriptor written next to the project's `pom.xml`.
pub const MERGED_DESCRIPTOR_PREFIX: &str = ".pom.xml.";

/// Run every registered tool in order and collect their outcomes.
///
/// A failing tool never stops the ones after it.
pub fn run_all(
    settings: &RunSettings,
    env: &Environment,
    registry: &ToolRegistry,
    runner: &dyn ProcessRunner,
    sink: &mut dyn Write,
    tool: ToolInfo,
) -> Result<RunReport, CoordinatorError> {
    let mut report = RunReport::new(tool);

    for spec in registry.tools() {
        let outcome = run_tool(settings, env, spec, runner, sink)?;
        report.record(spec.name.clone(), outcome);
    }

    info!("All tools finished");
    let statuses = report
        .results
        .iter()
        .map(|r| match r.outcome.status() {
            Some(status) => format!("{}={}", r.tool, status),
            None => format!("{}={}", r.tool, r.outcome.label()),
        })
        .collect::<Vec<_>>()
        .join(" ");
    info!("{}", statuses);

    Ok(report.finish())
}

/// Plan, prepare and execute a single tool.
pub fn run_tool(
    settings: &RunSettings,
    env: &Environment,
    spec: &ToolSpec,
    runner: &dyn ProcessRunner,
    sink: &mut dyn Write,
) -> Result<ToolOutcome, CoordinatorError> {
    info!("Preparing {}", spec.name);

    let ctx = PlanContext {
        config_dir: settings.config_dir.clone(),
    };
    let project = FsProjectView::new(settings.project_root.clone());
    let command = match Planner::new(&ctx, env, &project).plan(spec) {
        Ok(ToolPlan::Skip(reason)) => return Ok(ToolOutcome::Skipped { reason }),
        Ok(ToolPlan::Run(command)) => command,
        Err(err) => {
            error!("{} cannot be planned: {}", spec.name, err);
            return Ok(ToolOutcome::Fatal {
                error: err.to_string(),
            });
        }
    };

    let mut argv = command.argv.clone();
    let mut merged_descriptor = None;
    let mut merge = None;

    if command.is_maven() {
        match prepare_maven(settings, &command)? {
            MavenStep::Execute {
                argv: rewritten,
                descriptor,
                summary,
            } => {
                argv = rewritten;
                merged_descriptor = Some(descriptor);
                merge = Some(summary);
            }
            MavenStep::Finished(outcome) => return Ok(outcome),
        }
    }

    info!("Running {}", shell_join(&argv));
    let invocation = Invocation {
        argv,
        cwd: settings.project_root.clone(),
        env: env.clone(),
        timeout: settings.timeout,
    };

    match runner.run(&invocation, sink) {
        Ok(ProcessExit::Exited(code)) => {
            if code != 0 {
                error!("{} failed with status {}", spec.name, code);
            }
            Ok(ToolOutcome::Exited {
                code,
                merged_descriptor,
                merge,
            })
        }
        Ok(ProcessExit::TimedOut) => {
            let after_secs = settings.timeout.as_secs();
            error!("{} timed out after {}s", spec.name, after_secs);
            Ok(ToolOutcome::TimedOut {
                after_secs,
                status: TIMEOUT_STATUS,
            })
        }
        Err(err) if err.is_spawn_failure() => {
            error!("{} could not be started: {}", spec.name, err);
            Ok(ToolOutcome::Fatal {
                error: format!("{:#}", anyhow::Error::from(err)),
            })
        }
        Err(source) => Err(CoordinatorError::Process {
            tool: spec.name.clone(),
            source,
        }),
    }
}

enum MavenStep {
    Execute {
        argv: Vec<String>,
        descriptor: Utf8PathBuf,
        summary: MergeSummary,
    },
    Finished(ToolOutcome),
}

/// Short Maven options that start with `-f` but take no descriptor.
const FAIL_MODE_FLAGS: [&str; 3] = ["-fae", "-ff", "-fn"];

/// Arguments that point Maven at a descriptor other than the project's.
///
/// Covers `-f x`, the attached form `-fx`, `--file x` and `--file=x`.
pub fn uses_custom_descriptor(argv: &[String]) -> bool {
    argv.iter().skip(1).any(|arg| {
        (arg.starts_with("-f") && !FAIL_MODE_FLAGS.contains(&arg.as_str()))
            || arg == "--file"
            || arg.starts_with("--file=")
    })
}

fn prepare_maven(
    settings: &RunSettings,
    command: &ResolvedCommand,
) -> Result<MavenStep, CoordinatorError> {
    if uses_custom_descriptor(&command.argv) {
        error!(
            "Skipping {} because it uses a custom pom.xml: {}",
            command.tool, command.command_line
        );
        return Ok(MavenStep::Finished(ToolOutcome::Rejected {
            status: REJECTED_STATUS,
            reason: format!("custom build descriptor in `{}`", command.command_line),
        }));
    }

    let project_descriptor = settings.project_root.join(PROJECT_DESCRIPTOR);
    if !project_descriptor.is_file() {
        info!("Skipping maven command because pom.xml is missing");
        return Ok(MavenStep::Finished(ToolOutcome::Skipped {
            reason: SkipReason::NoBuildDescriptor,
        }));
    }

    let merged = merge_validators(&project_descriptor, &settings.validator_pom);
    let (descriptor, report) = match merged {
        Ok(merged) => merged,
        Err(err) => return document_failure(&command.tool, err),
    };

    if report.has_conflicts() && settings.conflict_policy == ConflictPolicy::Fail {
        let conflicts: Vec<String> = report.conflicts.iter().map(ToString::to_string).collect();
        error!(
            "Not running {}: {} plugin version conflict(s)",
            command.tool,
            conflicts.len()
        );
        return Ok(MavenStep::Finished(ToolOutcome::Fatal {
            error: conflicts.join("; "),
        }));
    }

    let file_name = format!("{}{}", MERGED_DESCRIPTOR_PREFIX, Uuid::new_v4());
    let path = settings.project_root.join(&file_name);
    info!("Creating runtime pom.xml in {}", file_name);
    if let Err(err) = descriptor.serialize(&path) {
        return document_failure(&command.tool, err);
    }

    let mut argv = Vec::with_capacity(command.argv.len() + 2);
    argv.push(command.argv[0].clone());
    argv.push("-f".to_string());
    argv.push(file_name);
    argv.extend(command.argv.iter().skip(1).cloned());

    Ok(MavenStep::Execute {
        argv,
        descriptor: path,
        summary: summarize(&report),
    })
}

fn merge_validators(
    project_descriptor: &Utf8Path,
    catalog: &Utf8Path,
) -> Result<(BuildDescriptor, MergeReport), DescriptorError> {
    let mut descriptor = BuildDescriptor::load(project_descriptor)?;
    let report = merge_plugins_from(&mut descriptor, catalog)?;
    Ok((descriptor, report))
}

/// Broken documents fail only this tool; I/O problems abort the run.
fn document_failure(tool: &str, err: DescriptorError) -> Result<MavenStep, CoordinatorError> {
    match err {
        DescriptorError::MalformedDocument { .. } | DescriptorError::Serialize { .. } => {
            error!("{}: {}", tool, err);
            Ok(MavenStep::Finished(ToolOutcome::Fatal {
                error: err.to_string(),
            }))
        }
        io => Err(anyhow::Error::from(io)
            .context(format!("prepare build descriptor for {}", tool))
            .into()),
    }
}

fn summarize(report: &MergeReport) -> MergeSummary {
    MergeSummary {
        inserted: report.inserted_count() as u64,
        already_present: report.already_present_count() as u64,
        conflicts: report.conflicts.iter().map(ToString::to_string).collect(),
    }
}

fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{}'", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write the JSON report and the markdown summary where requested.
pub fn write_run_artifacts(
    report: &RunReport,
    report_path: Option<&Utf8Path>,
    summary_path: Option<&Utf8Path>,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(report).context("serialize report")?;
        writer.write_file(path, json.as_bytes())?;
    }
    if let Some(path) = summary_path {
        writer.write_file(path, render_summary_md(report).as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn custom_descriptor_flags_are_detected() {
        assert!(uses_custom_descriptor(&argv(&["mvn", "-f", "x.xml", "verify"])));
        assert!(uses_custom_descriptor(&argv(&["mvn", "--file", "x.xml"])));
        assert!(uses_custom_descriptor(&argv(&["mvn", "--file=x.xml"])));
        assert!(!uses_custom_descriptor(&argv(&["mvn", "-B", "verify"])));
        assert!(uses_custom_descriptor(&argv(&["mvn", "-fcustom.xml", "verify"])));
        assert!(uses_custom_descriptor(&argv(&["mvn", "-f=custom.xml"])));
        assert!(!uses_custom_descriptor(&argv(&["mvn", "-fae"])));
        assert!(!uses_custom_descriptor(&argv(&["mvn", "-ff", "verify"])));
        assert!(!uses_custom_descriptor(&argv(&["mvn", "-fn"])));
    }

    #[test]
    fn shell_join_quotes_spaces() {
        assert_eq!(shell_join(&argv(&["a", "b c", ""])), "a 'b c' ''");
    }
}
