//! Port traits abstracting process execution and file output away from the coordinator.

use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use std::time::Duration;
use supersast_domain::Environment;

/// One external command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program followed by its arguments. Never passed through a shell.
    pub argv: Vec<String>,
    pub cwd: Utf8PathBuf,
    /// The complete environment of the child; nothing is inherited.
    pub env: Environment,
    pub timeout: Duration,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exit code; `-1` when the process was terminated by a signal.
    Exited(i32),
    /// Killed after exceeding the timeout.
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyArgv,

    #[error("spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wait for {program}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write tool output")]
    Sink(#[source] std::io::Error),

    #[error("start process runtime")]
    Runtime(#[source] std::io::Error),
}

impl ProcessError {
    /// The program could not be started; nothing ran.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ProcessError::Spawn { .. } | ProcessError::EmptyArgv)
    }
}

/// Runs a command to completion, copying its combined output into `sink`.
///
/// A non-zero exit is a normal result, not an error.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation, sink: &mut dyn Write)
    -> Result<ProcessExit, ProcessError>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
