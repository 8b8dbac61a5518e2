//! Default process and filesystem-backed port implementations.

use crate::diagnostics::{PathContext, ProcessContext, error_chain};
use crate::ports::{Invocation, ProcessError, ProcessExit, ProcessRunner, WritePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use supersast_domain::{Environment, GlobalVar};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time;
use tracing::{debug, error, info, warn};

/// How long to keep reading after the child exits while its pipes stay open
/// and silent (a background grandchild may still hold them).
const OUTPUT_IDLE: Duration = Duration::from_millis(200);

/// Spawns commands directly (no shell) and streams stdout and stderr, in the
/// order chunks arrive, into the sink.
///
/// Completion is the child's own exit, not the end of its output.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        invocation: &Invocation,
        sink: &mut dyn Write,
    ) -> Result<ProcessExit, ProcessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ProcessError::Runtime)?;
        runtime.block_on(run_to_exit(invocation, sink))
    }
}

async fn run_to_exit(
    invocation: &Invocation,
    sink: &mut dyn Write,
) -> Result<ProcessExit, ProcessError> {
    let (program, args) = invocation
        .argv
        .split_first()
        .ok_or(ProcessError::EmptyArgv)?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(&invocation.cwd)
        .env_clear()
        .envs(invocation.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;
    debug!(program = %program, pid = ?child.id(), "spawned");

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward(stderr, tx.clone()));
    }
    drop(tx);

    let deadline = time::sleep(invocation.timeout);
    tokio::pin!(deadline);

    let exited = loop {
        tokio::select! {
            Some(chunk) = rx.recv() => {
                sink.write_all(&chunk).map_err(ProcessError::Sink)?;
            }
            status = child.wait() => {
                break Some(status.map_err(|source| ProcessError::Wait {
                    program: program.clone(),
                    source,
                })?);
            }
            _ = &mut deadline => break None,
        }
    };

    let Some(status) = exited else {
        if let Err(err) = child.kill().await {
            warn!(program = %program, error = %err, "failed to kill timed-out process");
        }
        // Whatever already arrived still belongs in the transcript.
        while let Ok(chunk) = rx.try_recv() {
            sink.write_all(&chunk).map_err(ProcessError::Sink)?;
        }
        sink.flush().map_err(ProcessError::Sink)?;
        return Ok(ProcessExit::TimedOut);
    };

    while !deadline.is_elapsed() {
        match time::timeout(OUTPUT_IDLE, rx.recv()).await {
            Ok(Some(chunk)) => sink.write_all(&chunk).map_err(ProcessError::Sink)?,
            Ok(None) | Err(_) => break,
        }
    }
    sink.flush().map_err(ProcessError::Sink)?;

    Ok(ProcessExit::Exited(status.code().unwrap_or(-1)))
}

async fn forward(
    mut pipe: impl AsyncRead + Unpin + Send + 'static,
    tx: UnboundedSender<Vec<u8>>,
) {
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// `$M2_HOME/.m2`, with `M2_HOME` defaulting to `/tmp`.
pub fn maven_repository_dir(env: &Environment) -> Utf8PathBuf {
    let home = env
        .non_empty(GlobalVar::M2Home.name())
        .unwrap_or(GlobalVar::M2Home.default_value());
    Utf8Path::new(home).join(".m2")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeOutcome {
    Copied { files: u64 },
    DestinationExists,
    SourceMissing,
    Failed,
}

/// Seed the Maven repository with the bundled validator artifacts.
///
/// Never fails the run: problems are logged with enough context to debug
/// container permissions.
pub fn prime_maven_repository(source: &Utf8Path, destination: &Utf8Path) -> PrimeOutcome {
    if destination.exists() {
        warn!("Directory {} already exists. Skipping copy.", destination);
        return PrimeOutcome::DestinationExists;
    }
    if !source.is_dir() {
        debug!(source = %source, "no bundled validator repository");
        return PrimeOutcome::SourceMissing;
    }

    info!("Copying java validators to {}", destination);
    match copy_tree(source, destination) {
        Ok(files) => {
            debug!(files, "copied java validators");
            PrimeOutcome::Copied { files }
        }
        Err(err) => {
            error!(
                "An exception occurred while copying java validators, context information below\n{}\n - Extra info about the error:\n{}\n - Error:\n{}",
                ProcessContext::capture(),
                PathContext::of(destination),
                error_chain(&err)
            );
            PrimeOutcome::Failed
        }
    }
}

fn copy_tree(source: &Utf8Path, destination: &Utf8Path) -> anyhow::Result<u64> {
    fs::create_dir_all(destination).with_context(|| format!("create {}", destination))?;
    let mut files = 0;
    for entry in fs::read_dir(source).with_context(|| format!("list {}", source))? {
        let entry = entry.with_context(|| format!("list {}", source))?;
        let name = entry.file_name();
        let name = name
            .to_str()
            .with_context(|| format!("non UTF-8 file name in {}", source))?;
        let from = source.join(name);
        let to = destination.join(name);
        let file_type = entry
            .file_type()
            .with_context(|| format!("inspect {}", from))?;
        if file_type.is_dir() {
            files += copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).with_context(|| format!("copy {} to {}", from, to))?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path")
    }

    fn invocation(argv: &[&str], cwd: &Utf8Path, timeout: Duration) -> Invocation {
        Invocation {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.to_path_buf(),
            env: Environment::from_pairs([("PATH", "/usr/bin:/bin"), ("MARKER", "seen")]),
            timeout,
        }
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let dir = TempDir::new().expect("temp dir");
        let mut sink = Vec::new();
        let exit = SystemProcessRunner
            .run(
                &invocation(
                    &["sh", "-c", "echo out; echo err >&2; echo $MARKER; exit 3"],
                    &utf8(&dir),
                    Duration::from_secs(30),
                ),
                &mut sink,
            )
            .expect("run");
        assert_eq!(exit, ProcessExit::Exited(3));
        let text = String::from_utf8(sink).expect("utf8 output");
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        assert!(text.contains("seen"));
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_requested_directory() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("here.txt"), "").expect("write");
        let mut sink = Vec::new();
        let exit = SystemProcessRunner
            .run(
                &invocation(&["ls"], &utf8(&dir), Duration::from_secs(30)),
                &mut sink,
            )
            .expect("run");
        assert_eq!(exit, ProcessExit::Exited(0));
        assert!(String::from_utf8_lossy(&sink).contains("here.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn kills_at_timeout() {
        let dir = TempDir::new().expect("temp dir");
        let mut sink = Vec::new();
        let started = Instant::now();
        let exit = SystemProcessRunner
            .run(
                &invocation(&["sleep", "30"], &utf8(&dir), Duration::from_millis(200)),
                &mut sink,
            )
            .expect("run");
        assert_eq!(exit, ProcessExit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn exit_is_not_delayed_by_background_children() {
        let dir = TempDir::new().expect("temp dir");
        let mut sink = Vec::new();
        let started = Instant::now();
        let exit = SystemProcessRunner
            .run(
                &invocation(
                    &["sh", "-c", "echo started; sleep 6 & exit 0"],
                    &utf8(&dir),
                    Duration::from_secs(2),
                ),
                &mut sink,
            )
            .expect("run");
        assert_eq!(exit, ProcessExit::Exited(0));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(String::from_utf8_lossy(&sink).contains("started"));
    }

    #[cfg(unix)]
    #[test]
    fn output_written_before_timeout_is_kept() {
        let dir = TempDir::new().expect("temp dir");
        let mut sink = Vec::new();
        let exit = SystemProcessRunner
            .run(
                &invocation(
                    &["sh", "-c", "echo partial; exec sleep 30"],
                    &utf8(&dir),
                    Duration::from_millis(500),
                ),
                &mut sink,
            )
            .expect("run");
        assert_eq!(exit, ProcessExit::TimedOut);
        assert!(String::from_utf8_lossy(&sink).contains("partial"));
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let dir = TempDir::new().expect("temp dir");
        let err = SystemProcessRunner
            .run(
                &invocation(
                    &["supersast-no-such-program"],
                    &utf8(&dir),
                    Duration::from_secs(5),
                ),
                &mut Vec::new(),
            )
            .expect_err("spawn should fail");
        assert!(err.is_spawn_failure());
    }

    #[test]
    fn empty_argv_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let err = SystemProcessRunner
            .run(
                &invocation(&[], &utf8(&dir), Duration::from_secs(5)),
                &mut Vec::new(),
            )
            .expect_err("empty argv");
        assert!(matches!(err, ProcessError::EmptyArgv));
    }

    #[test]
    fn maven_repository_defaults_to_tmp() {
        assert_eq!(
            maven_repository_dir(&Environment::default()),
            Utf8PathBuf::from("/tmp/.m2")
        );
        assert_eq!(
            maven_repository_dir(&Environment::from_pairs([("M2_HOME", "/home/ci")])),
            Utf8PathBuf::from("/home/ci/.m2")
        );
    }

    #[test]
    fn prime_copies_nested_tree() {
        let src = TempDir::new().expect("temp dir");
        let dst = TempDir::new().expect("temp dir");
        let nested = src.path().join("repository/org/example");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(nested.join("plugin.jar"), b"jar").expect("write");
        std::fs::write(src.path().join("settings.xml"), b"<settings/>").expect("write");

        let target = utf8(&dst).join(".m2");
        let outcome = prime_maven_repository(&utf8(&src), &target);

        assert_eq!(outcome, PrimeOutcome::Copied { files: 2 });
        assert!(target.join("repository/org/example/plugin.jar").is_file());
    }

    #[test]
    fn prime_skips_existing_destination() {
        let src = TempDir::new().expect("temp dir");
        let dst = TempDir::new().expect("temp dir");
        assert_eq!(
            prime_maven_repository(&utf8(&src), &utf8(&dst)),
            PrimeOutcome::DestinationExists
        );
    }

    #[test]
    fn prime_skips_missing_source() {
        let dst = TempDir::new().expect("temp dir");
        assert_eq!(
            prime_maven_repository(Utf8Path::new("/no/such/validators"), &utf8(&dst).join(".m2")),
            PrimeOutcome::SourceMissing
        );
    }

    #[test]
    fn fs_write_port_creates_parents() {
        let dir = TempDir::new().expect("temp dir");
        let path = utf8(&dir).join("out/nested/report.json");
        FsWritePort.write_file(&path, b"{}").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "{}");
    }
}
