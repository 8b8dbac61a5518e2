use crate::error::RegistryError;
use supersast_types::tool::ToolSpec;

/// Project marker files that make the Python dependency scanner applicable.
pub const PYTHON_PROJECT_MARKERS: [&str; 5] = [
    "setup.py",
    "tox.ini",
    "pyproject.toml",
    "requirements.txt",
    "requirements-dev.txt",
];

/// Ordered, immutable set of tools. Names are unique.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolSpec>) -> Result<Self, RegistryError> {
        for (i, tool) in tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(RegistryError::EmptyName { index: i });
            }
            if tools[..i].iter().any(|earlier| earlier.name == tool.name) {
                return Err(RegistryError::DuplicateTool {
                    name: tool.name.clone(),
                });
            }
        }
        Ok(Self { tools })
    }

    /// The tools shipped with the scanner image, in execution order.
    pub fn builtin() -> Self {
        Self {
            tools: builtin_tools(),
        }
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("trivy_config", "trivy --config {config_file} config .")
            .with_config_file("trivy.yaml"),
        ToolSpec::new("trivy_filesystem", "trivy --config {config_file} filesystem .")
            .with_config_file("trivy.yaml"),
        ToolSpec::new("bandit", "bandit --config {config_file} {args} -r .")
            .with_config_file("bandit.yaml"),
        ToolSpec::new("safety", "safety check {args}")
            .with_args("-r requirements.txt")
            .requiring_any_of(PYTHON_PROJECT_MARKERS),
        ToolSpec::new("kubescape", "kubescape {args} scan .").with_args("--cache-dir /tmp"),
        ToolSpec::new(
            "checkov",
            "checkov --config-file {config_file} {args} --directory .",
        )
        .with_config_file(".checkov.yaml"),
        ToolSpec::new("semgrep", "semgrep --config {config_file} {args} .")
            .with_config_file("string://auto"),
        ToolSpec::new(
            "spotbugs",
            "mvn {maven_args} com.github.spotbugs:spotbugs-maven-plugin:check",
        ),
        ToolSpec::new(
            "owasp_dependency_check",
            "mvn {maven_args} org.owasp:dependency-check-maven:check",
        ),
        ToolSpec::new(
            "spotless_check",
            "mvn {maven_args} com.diffplug.spotless:spotless-maven-plugin:check",
        ),
        ToolSpec::new(
            "spotless_apply",
            "mvn {maven_args} com.diffplug.spotless:spotless-maven-plugin:apply",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_order_is_stable() {
        let registry = ToolRegistry::builtin();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec![
                "trivy_config",
                "trivy_filesystem",
                "bandit",
                "safety",
                "kubescape",
                "checkov",
                "semgrep",
                "spotbugs",
                "owasp_dependency_check",
                "spotless_check",
                "spotless_apply",
            ]
        );
    }

    #[test]
    fn builtin_names_are_unique() {
        let registry = ToolRegistry::builtin();
        assert!(ToolRegistry::new(registry.tools().to_vec()).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolRegistry::new(vec![
            ToolSpec::new("a", "echo"),
            ToolSpec::new("a", "echo again"),
        ])
        .expect_err("duplicate");
        assert_eq!(err.to_string(), "duplicate tool name `a`");
    }

    #[test]
    fn only_safety_requires_project_files() {
        let registry = ToolRegistry::builtin();
        let gated: Vec<&str> = registry
            .tools()
            .iter()
            .filter(|t| !t.requires_any_of.is_empty())
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(gated, vec!["safety"]);
    }
}
