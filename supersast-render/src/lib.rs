//! Rendering helpers (markdown) for human-readable output.

use supersast_domain::{GlobalVar, ToolEnvironment};
use supersast_types::report::{RunReport, ToolOutcome, VerdictStatus};

pub fn render_summary_md(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("# supersast summary\n\n");
    out.push_str(&format!(
        "- Verdict: `{}`\n",
        verdict_label(report.verdict.status)
    ));
    out.push_str(&format!(
        "- Tools: {} passed, {} failed, {} skipped\n",
        report.verdict.counts.passed, report.verdict.counts.failed, report.verdict.counts.skipped
    ));
    out.push_str(&format!("- Started: {}\n", report.started_at.to_rfc3339()));
    if let Some(ended) = report.ended_at {
        out.push_str(&format!("- Ended: {}\n", ended.to_rfc3339()));
    }
    out.push('\n');

    out.push_str("## Tools\n\n");
    if report.results.is_empty() {
        out.push_str("_No tools registered._\n");
        return out;
    }

    out.push_str("|Tool|Result|Status|Details|\n");
    out.push_str("|----|------|------|-------|\n");
    for result in &report.results {
        let status = result
            .outcome
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "|{}|{}|{}|{}|\n",
            result.tool,
            result.outcome.label(),
            status,
            details(&result.outcome)
        ));
    }

    let conflicts: Vec<(&str, &String)> = report
        .results
        .iter()
        .filter_map(|r| match &r.outcome {
            ToolOutcome::Exited {
                merge: Some(merge), ..
            } => Some((r.tool.as_str(), &merge.conflicts)),
            _ => None,
        })
        .flat_map(|(tool, conflicts)| conflicts.iter().map(move |c| (tool, c)))
        .collect();
    if !conflicts.is_empty() {
        out.push_str("\n## Plugin version conflicts\n\n");
        for (tool, conflict) in conflicts {
            out.push_str(&format!("- `{}`: {}\n", tool, conflict));
        }
    }

    if !report.errors.is_empty() {
        out.push_str("\n## Errors\n\n");
        for err in &report.errors {
            out.push_str(&format!("- {}\n", err));
        }
    }

    out
}

/// The variables each tool reads, with their defaults, as a markdown table.
pub fn render_environs_table(tools: &[ToolEnvironment]) -> String {
    let mut out = String::new();
    out.push_str("Environment variables:\n");
    out.push_str("|Variable|Default|Tool|\n");
    out.push_str("|--------|-------|----|\n");
    out.push_str(&format!(
        "|{}|{}|Run all tools|\n",
        GlobalVar::RunAllTools,
        GlobalVar::RunAllTools.default_value()
    ));
    out.push_str(&format!(
        "|{}|{}|Log maven progress|\n",
        GlobalVar::LogMavenProgress,
        GlobalVar::LogMavenProgress.default_value()
    ));
    for tool in tools {
        out.push_str(&format!(
            "|{}|{}|{}|\n",
            tool.enabled_var, tool.enabled, tool.tool
        ));
        if !tool.default_args.is_empty() {
            out.push_str(&format!(
                "|{}|{}|{}|\n",
                tool.args_var, tool.default_args, tool.tool
            ));
        }
        if !tool.default_config_file.is_empty() {
            out.push_str(&format!(
                "|{}|{}|{}|\n",
                tool.config_file_var, tool.default_config_file, tool.tool
            ));
        }
    }
    out
}

/// Effective per-tool settings, one block per tool, with defaults as comments.
pub fn render_config_dump(tools: &[ToolEnvironment]) -> String {
    let mut out = String::new();
    for tool in tools {
        out.push_str(&format!("# {}\n", tool.tool));
        out.push_str(&format!("{}={}\n", tool.enabled_var, tool.enabled));
        out.push_str(&format!(
            "{}={}  # {}\n",
            tool.args_var, tool.args, tool.default_args
        ));
        out.push_str(&format!(
            "{}=\"{}\"  # {}\n\n",
            tool.config_file_var, tool.config_file, tool.default_config_file
        ));
    }
    out
}

fn details(outcome: &ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Skipped { reason } => reason.describe().to_string(),
        ToolOutcome::Rejected { reason, .. } => reason.clone(),
        ToolOutcome::Exited {
            merge: Some(merge), ..
        } => format!(
            "merged {} plugin(s), {} already declared, {} conflict(s)",
            merge.inserted,
            merge.already_present,
            merge.conflicts.len()
        ),
        ToolOutcome::Exited { .. } => String::new(),
        ToolOutcome::TimedOut { after_secs, .. } => format!("killed after {}s", after_secs),
        ToolOutcome::Fatal { error } => error.replace('|', "\\|"),
    }
}

fn verdict_label(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Pass => "pass",
        VerdictStatus::Fail => "fail",
    }
}
