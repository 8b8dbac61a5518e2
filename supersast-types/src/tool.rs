use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking an inline config value instead of a file in the config directory.
pub const INLINE_CONFIG_PREFIX: &str = "string://";

/// Registry entry describing how to invoke one external tool.
///
/// `cmdline` is a template; `{args}`, `{config_file}` and `{maven_args}` are
/// substituted by the planner before tokenization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub cmdline: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<ConfigFileRef>,

    /// Project marker files; when non-empty, at least one must exist in the
    /// project root or the tool is skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_any_of: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, cmdline: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmdline: cmdline.into(),
            args: None,
            config_file: None,
            requires_any_of: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_config_file(mut self, reference: impl AsRef<str>) -> Self {
        self.config_file = Some(ConfigFileRef::parse(reference.as_ref()));
        self
    }

    pub fn requiring_any_of<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_any_of = markers.into_iter().map(Into::into).collect();
        self
    }
}

/// Default config-file reference of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConfigFileRef {
    /// A file, localized against the config directory.
    Path(Utf8PathBuf),
    /// A literal passed verbatim (written as `string://<value>`).
    Inline(String),
}

impl ConfigFileRef {
    pub fn parse(reference: &str) -> Self {
        match reference.strip_prefix(INLINE_CONFIG_PREFIX) {
            Some(inline) => ConfigFileRef::Inline(inline.to_string()),
            None => ConfigFileRef::Path(Utf8PathBuf::from(reference)),
        }
    }
}

impl fmt::Display for ConfigFileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileRef::Path(path) => write!(f, "{}", path),
            ConfigFileRef::Inline(value) => write!(f, "{}{}", INLINE_CONFIG_PREFIX, value),
        }
    }
}
