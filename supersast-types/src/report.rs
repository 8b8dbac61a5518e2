use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status returned for a Maven tool whose arguments point at a custom descriptor.
pub const REJECTED_STATUS: i32 = 2;

/// Status recorded for a tool killed at the timeout.
pub const TIMEOUT_STATUS: i32 = 124;

/// Outcome of one orchestrator run. Built once, never mutated after `finish`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Per-tool results in registry order.
    #[serde(default)]
    pub results: Vec<ToolResult>,

    pub verdict: Verdict,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn new(tool: ToolInfo) -> Self {
        Self {
            schema: crate::schema::SUPERSAST_REPORT_V1.to_string(),
            tool,
            started_at: Utc::now(),
            ended_at: None,
            results: vec![],
            verdict: Verdict::default(),
            errors: vec![],
        }
    }

    pub fn record(&mut self, tool: impl Into<String>, outcome: ToolOutcome) {
        let tool = tool.into();
        if let ToolOutcome::Fatal { error } = &outcome {
            self.errors.push(format!("{}: {}", tool, error));
        }
        self.results.push(ToolResult { tool, outcome });
    }

    /// Seal the report: compute the verdict and stamp the end time.
    pub fn finish(mut self) -> Self {
        let mut counts = Counts::default();
        for result in &self.results {
            match &result.outcome {
                ToolOutcome::Skipped { .. } => counts.skipped += 1,
                outcome if outcome.is_failure() => counts.failed += 1,
                _ => counts.passed += 1,
            }
        }
        let status = if counts.failed > 0 {
            VerdictStatus::Fail
        } else {
            VerdictStatus::Pass
        };
        self.verdict = Verdict { status, counts };
        self.ended_at = Some(Utc::now());
        self
    }

    pub fn get(&self, tool: &str) -> Option<&ToolOutcome> {
        self.results
            .iter()
            .find(|r| r.tool == tool)
            .map(|r| &r.outcome)
    }

    pub fn passed(&self) -> bool {
        self.verdict.status == VerdictStatus::Pass
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Nothing was executed.
    Skipped { reason: SkipReason },

    /// Refused before execution (custom build descriptor).
    Rejected { status: i32, reason: String },

    /// The process ran to completion.
    Exited {
        code: i32,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        merged_descriptor: Option<Utf8PathBuf>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge: Option<MergeSummary>,
    },

    /// Killed at the time budget. `status` is [`TIMEOUT_STATUS`].
    TimedOut { after_secs: u64, status: i32 },

    /// The tool could not be prepared or spawned.
    Fatal { error: String },
}

impl ToolOutcome {
    /// Numeric status; `None` when the tool was skipped without a status
    /// or never produced one.
    pub fn status(&self) -> Option<i32> {
        match self {
            ToolOutcome::Skipped { reason } => reason.status(),
            ToolOutcome::Rejected { status, .. } => Some(*status),
            ToolOutcome::Exited { code, .. } => Some(*code),
            ToolOutcome::TimedOut { status, .. } => Some(*status),
            ToolOutcome::Fatal { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            ToolOutcome::Skipped { .. } => false,
            ToolOutcome::Fatal { .. } => true,
            other => other.status() != Some(0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolOutcome::Skipped { .. } => "skipped",
            ToolOutcome::Rejected { .. } => "rejected",
            ToolOutcome::Exited { code: 0, .. } => "passed",
            ToolOutcome::Exited { .. } => "failed",
            ToolOutcome::TimedOut { .. } => "timed out",
            ToolOutcome::Fatal { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `RUN_<TOOL>` (or `RUN_ALL_TOOLS`) turned the tool off.
    Disabled,
    /// None of the tool's project marker files exist.
    MissingProjectFiles,
    /// Maven tool without a `pom.xml` in the project root.
    NoBuildDescriptor,
}

impl SkipReason {
    pub fn status(&self) -> Option<i32> {
        match self {
            SkipReason::NoBuildDescriptor => Some(0),
            SkipReason::Disabled | SkipReason::MissingProjectFiles => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::MissingProjectFiles => "no matching project files",
            SkipReason::NoBuildDescriptor => "pom.xml is missing",
        }
    }
}

/// What the build-descriptor merge did before a Maven tool ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub inserted: u64,
    pub already_present: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub counts: Counts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    #[default]
    Pass,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}
