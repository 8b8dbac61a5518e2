use thiserror::Error;

/// Why a tool's command line could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown placeholder `{{{name}}}` in command template `{template}`")]
    UnknownPlaceholder { name: String, template: String },

    #[error("unbalanced brace at byte {position} in command template `{template}`")]
    UnbalancedBrace { position: usize, template: String },

    #[error("cannot split command line `{command_line}`: {message}")]
    Tokenize {
        command_line: String,
        message: String,
    },

    #[error("command line for {tool} is empty")]
    EmptyCommand { tool: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate tool name `{name}`")]
    DuplicateTool { name: String },

    #[error("tool at position {index} has an empty name")]
    EmptyName { index: usize },
}
