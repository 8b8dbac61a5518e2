//! Environment snapshot and the typed names of the variables read from it.

use std::collections::BTreeMap;
use std::fmt;

/// Immutable copy of the environment taken once at startup.
///
/// The same snapshot drives planning and becomes the environment of every
/// tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment. Variables that are not valid
    /// Unicode are dropped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// The value, treating an empty string as unset.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn global(&self, var: GlobalVar) -> Option<&str> {
        self.get(var.name())
    }

    pub fn tool(&self, tool: &str, var: ToolVar) -> Option<&str> {
        self.get(&tool_var_name(tool, var))
    }

    /// `RUN_ALL_TOOLS`, defaulting to true when unset.
    pub fn run_all_tools(&self) -> bool {
        self.global(GlobalVar::RunAllTools).is_none_or(is_true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `true`, ignoring case. Anything else (including empty) is false.
pub fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Per-tool variable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolVar {
    Enabled,
    Args,
    ConfigFile,
}

/// Variable name for `tool`: `RUN_<T>`, `<T>_ARGS` or `<T>_CONFIG_FILE`.
pub fn tool_var_name(tool: &str, var: ToolVar) -> String {
    let upper = tool.to_uppercase();
    match var {
        ToolVar::Enabled => format!("RUN_{}", upper),
        ToolVar::Args => format!("{}_ARGS", upper),
        ToolVar::ConfigFile => format!("{}_CONFIG_FILE", upper),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalVar {
    RunAllTools,
    MavenArgs,
    LogMavenProgress,
    M2Home,
}

impl GlobalVar {
    pub fn name(self) -> &'static str {
        match self {
            GlobalVar::RunAllTools => "RUN_ALL_TOOLS",
            GlobalVar::MavenArgs => "MAVEN_ARGS",
            GlobalVar::LogMavenProgress => "LOG_MAVEN_PROGRESS",
            GlobalVar::M2Home => "M2_HOME",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            GlobalVar::RunAllTools => "true",
            GlobalVar::MavenArgs => "",
            GlobalVar::LogMavenProgress => "false",
            GlobalVar::M2Home => "/tmp",
        }
    }
}

impl fmt::Display for GlobalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_variable_names_are_upper_cased() {
        assert_eq!(tool_var_name("trivy_config", ToolVar::Enabled), "RUN_TRIVY_CONFIG");
        assert_eq!(tool_var_name("bandit", ToolVar::Args), "BANDIT_ARGS");
        assert_eq!(
            tool_var_name("semgrep", ToolVar::ConfigFile),
            "SEMGREP_CONFIG_FILE"
        );
    }

    #[test]
    fn run_all_tools_defaults_to_true() {
        assert!(Environment::default().run_all_tools());
        assert!(Environment::from_pairs([("RUN_ALL_TOOLS", "TRUE")]).run_all_tools());
        assert!(!Environment::from_pairs([("RUN_ALL_TOOLS", "false")]).run_all_tools());
        assert!(!Environment::from_pairs([("RUN_ALL_TOOLS", "")]).run_all_tools());
        assert!(!Environment::from_pairs([("RUN_ALL_TOOLS", "1")]).run_all_tools());
    }

    #[test]
    fn non_empty_treats_blank_as_unset() {
        let env = Environment::from_pairs([("BANDIT_ARGS", ""), ("SAFETY_ARGS", "-r x")]);
        assert_eq!(env.non_empty("BANDIT_ARGS"), None);
        assert_eq!(env.non_empty("SAFETY_ARGS"), Some("-r x"));
        assert_eq!(env.tool("bandit", ToolVar::Args), Some(""));
    }
}
