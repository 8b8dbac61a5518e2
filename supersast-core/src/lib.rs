//! Embeddable core library for supersast.
//!
//! Provides a clap-free entry point that runs the tool battery against one
//! project checkout.
//!
//! # Port traits
//!
//! Process execution and file output are abstracted behind port traits in [`ports`]:
//! - [`ProcessRunner`](ports::ProcessRunner): run one command with a timeout
//! - [`WritePort`](ports::WritePort): write report files
//!
//! The [`adapters`] module provides the default process and filesystem implementations.
//!
//! # Entry points
//!
//! - [`run_all`](pipeline::run_all): run every registered tool and build a report
//! - [`run_tool`](pipeline::run_tool): run one tool

pub mod adapters;
pub mod diagnostics;
pub mod pipeline;
pub mod ports;
pub mod settings;

// Re-export the domain types callers need to drive a run.
pub use supersast_domain::{Environment, ToolRegistry};
