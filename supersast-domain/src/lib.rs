//! Domain logic: turn the tool registry and an environment snapshot into
//! concrete command lines.
//!
//! This crate owns *which* tools run and *how* they are invoked. It does not
//! execute anything; that's the `supersast-core` crate.

mod env;
mod error;
mod planner;
mod ports;
mod registry;

pub use env::{Environment, GlobalVar, ToolVar, is_true, tool_var_name};
pub use error::{PlanError, RegistryError};
pub use planner::{
    NO_TRANSFER_PROGRESS, PlanContext, Planner, ResolvedCommand, ToolEnvironment, ToolPlan,
    describe_tool, is_enabled, localize, maven_args, render_template, tokenize,
};
pub use ports::{FsProjectView, ProjectView};
pub use registry::{PYTHON_PROJECT_MARKERS, ToolRegistry};
