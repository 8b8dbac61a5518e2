use crate::env::{Environment, GlobalVar, ToolVar, is_true, tool_var_name};
use crate::error::PlanError;
use crate::ports::ProjectView;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use supersast_types::report::SkipReason;
use supersast_types::tool::{ConfigFileRef, ToolSpec};

/// Flag Maven uses to silence artifact download progress.
pub const NO_TRANSFER_PROGRESS: &str = "--no-transfer-progress";

#[derive(Debug, Clone)]
pub struct PlanContext {
    /// Absolute directory that relative default config files are resolved against.
    pub config_dir: Utf8PathBuf,
}

/// What the planner decided for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPlan {
    Skip(SkipReason),
    Run(ResolvedCommand),
}

/// A fully substituted, tokenized command for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub tool: String,
    pub command_line: String,
    pub argv: Vec<String>,
    pub args: String,
    pub config_file: String,
    pub maven_args: String,
}

impl ResolvedCommand {
    /// True when the program is Maven (`mvn`, possibly given by path).
    pub fn is_maven(&self) -> bool {
        self.argv
            .first()
            .and_then(|program| Utf8Path::new(program).file_name())
            == Some("mvn")
    }
}

pub struct Planner<'a> {
    ctx: &'a PlanContext,
    env: &'a Environment,
    project: &'a dyn ProjectView,
}

impl<'a> Planner<'a> {
    pub fn new(ctx: &'a PlanContext, env: &'a Environment, project: &'a dyn ProjectView) -> Self {
        Self { ctx, env, project }
    }

    pub fn plan(&self, spec: &ToolSpec) -> Result<ToolPlan, PlanError> {
        if !is_enabled(spec, self.env) {
            tracing::info!(tool = %spec.name, "Skipping {}", spec.name);
            return Ok(ToolPlan::Skip(SkipReason::Disabled));
        }

        if !spec.requires_any_of.is_empty()
            && !spec
                .requires_any_of
                .iter()
                .any(|marker| self.project.exists(Utf8Path::new(marker)))
        {
            tracing::info!(
                tool = %spec.name,
                "Skipping {} because none of {} exist in {}",
                spec.name,
                spec.requires_any_of.join(", "),
                self.project.root()
            );
            return Ok(ToolPlan::Skip(SkipReason::MissingProjectFiles));
        }

        let args = self
            .env
            .non_empty(&tool_var_name(&spec.name, ToolVar::Args))
            .map(str::to_string)
            .or_else(|| spec.args.clone())
            .unwrap_or_default();
        let config_file = self
            .env
            .non_empty(&tool_var_name(&spec.name, ToolVar::ConfigFile))
            .map(str::to_string)
            .unwrap_or_else(|| localize(spec.config_file.as_ref(), &self.ctx.config_dir));
        let maven_args = maven_args(self.env);

        let command_line = render_template(
            &spec.cmdline,
            &[
                ("args", args.as_str()),
                ("config_file", config_file.as_str()),
                ("maven_args", maven_args.as_str()),
            ],
        )?;
        let argv = tokenize(&command_line)?;
        if argv.is_empty() {
            return Err(PlanError::EmptyCommand {
                tool: spec.name.clone(),
            });
        }

        Ok(ToolPlan::Run(ResolvedCommand {
            tool: spec.name.clone(),
            command_line,
            argv,
            args,
            config_file,
            maven_args,
        }))
    }
}

/// `RUN_<T>` when set, otherwise `RUN_ALL_TOOLS`.
pub fn is_enabled(spec: &ToolSpec, env: &Environment) -> bool {
    match env.tool(&spec.name, ToolVar::Enabled) {
        Some(value) => is_true(value),
        None => env.run_all_tools(),
    }
}

/// Turn a default config reference into the value passed to the tool.
pub fn localize(reference: Option<&ConfigFileRef>, config_dir: &Utf8Path) -> String {
    match reference {
        None => String::new(),
        Some(ConfigFileRef::Inline(value)) => value.clone(),
        Some(ConfigFileRef::Path(path)) if path.as_str().is_empty() => String::new(),
        Some(ConfigFileRef::Path(path)) => config_dir.join(path).into_string(),
    }
}

/// `MAVEN_ARGS`, with the transfer-progress flag appended unless
/// `LOG_MAVEN_PROGRESS` is true or the flag is already there.
pub fn maven_args(env: &Environment) -> String {
    let mut args = env.global(GlobalVar::MavenArgs).unwrap_or_default().to_string();
    let log_progress = env.global(GlobalVar::LogMavenProgress).is_some_and(is_true);
    if !log_progress && !args.contains(NO_TRANSFER_PROGRESS) {
        args.push(' ');
        args.push_str(NO_TRANSFER_PROGRESS);
        args.push(' ');
    }
    args
}

/// Substitute `{name}` placeholders. `{{` and `}}` stand for literal braces.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> Result<String, PlanError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template.char_indices().peekable();

    while let Some((position, c)) = rest.next() {
        match c {
            '{' if rest.peek().map(|(_, next)| *next) == Some('{') => {
                rest.next();
                out.push('{');
            }
            '{' => {
                let start = position + 1;
                let end = template[start..]
                    .find('}')
                    .map(|offset| start + offset)
                    .ok_or_else(|| PlanError::UnbalancedBrace {
                        position,
                        template: template.to_string(),
                    })?;
                let name = &template[start..end];
                let value = values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| PlanError::UnknownPlaceholder {
                        name: name.to_string(),
                        template: template.to_string(),
                    })?;
                out.push_str(value);
                while rest.peek().is_some_and(|(i, _)| *i <= end) {
                    rest.next();
                }
            }
            '}' if rest.peek().map(|(_, next)| *next) == Some('}') => {
                rest.next();
                out.push('}');
            }
            '}' => {
                return Err(PlanError::UnbalancedBrace {
                    position,
                    template: template.to_string(),
                });
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Split a command line with POSIX shell quoting rules. No shell is involved.
pub fn tokenize(command_line: &str) -> Result<Vec<String>, PlanError> {
    shell_words::split(command_line).map_err(|err| PlanError::Tokenize {
        command_line: command_line.to_string(),
        message: err.to_string(),
    })
}

/// Variable names, effective values and defaults for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolEnvironment {
    pub tool: String,
    pub enabled_var: String,
    pub enabled: String,
    pub args_var: String,
    pub args: String,
    pub default_args: String,
    pub config_file_var: String,
    pub config_file: String,
    pub default_config_file: String,
}

pub fn describe_tool(spec: &ToolSpec, env: &Environment, config_dir: &Utf8Path) -> ToolEnvironment {
    let enabled_var = tool_var_name(&spec.name, ToolVar::Enabled);
    let args_var = tool_var_name(&spec.name, ToolVar::Args);
    let config_file_var = tool_var_name(&spec.name, ToolVar::ConfigFile);

    let enabled = match env.get(&enabled_var) {
        Some(value) => value.to_string(),
        None => env.run_all_tools().to_string(),
    };
    let default_args = spec.args.clone().unwrap_or_default();
    let default_config_file = localize(spec.config_file.as_ref(), config_dir);
    let args = env
        .non_empty(&args_var)
        .map(str::to_string)
        .unwrap_or_else(|| default_args.clone());
    let config_file = env
        .non_empty(&config_file_var)
        .map(str::to_string)
        .unwrap_or_else(|| default_config_file.clone());

    ToolEnvironment {
        tool: spec.name.clone(),
        enabled_var,
        enabled,
        args_var,
        args,
        default_args,
        config_file_var,
        config_file,
        default_config_file,
    }
}
