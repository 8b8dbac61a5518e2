//! `--environs` and `--dump-config`: show what each tool would read.

use camino::Utf8Path;
use supersast_domain::{Environment, ToolEnvironment, ToolRegistry, describe_tool};
use supersast_render::{render_config_dump, render_environs_table};

pub fn describe_all(
    registry: &ToolRegistry,
    env: &Environment,
    config_dir: &Utf8Path,
) -> Vec<ToolEnvironment> {
    registry
        .tools()
        .iter()
        .map(|spec| describe_tool(spec, env, config_dir))
        .collect()
}

pub fn environs_text(registry: &ToolRegistry, env: &Environment, config_dir: &Utf8Path) -> String {
    render_environs_table(&describe_all(registry, env, config_dir))
}

pub fn dump_config_text(
    registry: &ToolRegistry,
    env: &Environment,
    config_dir: &Utf8Path,
) -> String {
    render_config_dump(&describe_all(registry, env, config_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environs_list_every_builtin_tool() {
        let text = environs_text(
            &ToolRegistry::builtin(),
            &Environment::default(),
            Utf8Path::new("/cfg"),
        );
        for name in ToolRegistry::builtin().names() {
            assert!(text.contains(&format!("|{}|", name)), "{name} missing");
        }
        assert!(text.contains("|TRIVY_CONFIG_CONFIG_FILE|/cfg/trivy.yaml|trivy_config|"));
        assert!(text.contains("|SEMGREP_CONFIG_FILE|auto|semgrep|"));
        assert!(text.contains("|SAFETY_ARGS|-r requirements.txt|safety|"));
    }

    #[test]
    fn dump_reflects_overrides() {
        let env =
            Environment::from_pairs([("SEMGREP_CONFIG_FILE", "p/ci"), ("RUN_CHECKOV", "false")]);
        let text = dump_config_text(&ToolRegistry::builtin(), &env, Utf8Path::new("/cfg"));
        assert!(text.contains("SEMGREP_CONFIG_FILE=\"p/ci\"  # auto"));
        assert!(text.contains("RUN_CHECKOV=false"));
        assert!(text.contains("# spotless_apply"));
    }
}
