//! Context gathered when something fails in a way that usually means a
//! container permission problem.

use camino::Utf8Path;
use std::fmt;

/// Who and where the orchestrator is running as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessContext {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub user: Option<String>,
    pub cwd: Option<String>,
}

impl ProcessContext {
    pub fn capture() -> Self {
        let (uid, gid) = owner_of(Utf8Path::new("/proc/self"));
        Self {
            uid,
            gid,
            user: std::env::var("USER").ok().filter(|user| !user.is_empty()),
            cwd: std::env::current_dir()
                .ok()
                .map(|dir| dir.display().to_string()),
        }
    }
}

impl fmt::Display for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " - UID: {}", show(self.uid))?;
        writeln!(f, " - GID: {}", show(self.gid))?;
        if let Some(user) = &self.user {
            writeln!(f, " - User: {}", user)?;
        }
        write!(f, " - CWD: {}", self.cwd.as_deref().unwrap_or("?"))
    }
}

/// Mode and ownership of a path, as far as they can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    pub path: String,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl PathContext {
    pub fn of(path: &Utf8Path) -> Self {
        let (uid, gid) = owner_of(path);
        Self {
            path: std::path::absolute(path)
                .map(|abs| abs.display().to_string())
                .unwrap_or_else(|_| path.to_string()),
            mode: mode_of(path),
            uid,
            gid,
        }
    }
}

impl fmt::Display for PathContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  - Path: {}", self.path)?;
        match self.mode {
            Some(mode) => writeln!(f, "  - Permissions: {:o}", mode)?,
            None => writeln!(f, "  - Permissions: ?")?,
        }
        writeln!(f, "  - Owner (user): {}", show(self.uid))?;
        write!(f, "  - Owner (group): {}", show(self.gid))
    }
}

/// Every cause of an error, outermost first, one per line.
pub fn error_chain(err: &anyhow::Error) -> String {
    err.chain()
        .map(|cause| format!("  - {}", cause))
        .collect::<Vec<_>>()
        .join("\n")
}

fn show(id: Option<u32>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
}

#[cfg(unix)]
fn owner_of(path: &Utf8Path) -> (Option<u32>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    match std::fs::metadata(path) {
        Ok(meta) => (Some(meta.uid()), Some(meta.gid())),
        Err(_) => (None, None),
    }
}

#[cfg(not(unix))]
fn owner_of(_path: &Utf8Path) -> (Option<u32>, Option<u32>) {
    (None, None)
}

#[cfg(unix)]
fn mode_of(path: &Utf8Path) -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|meta| meta.mode())
}

#[cfg(not(unix))]
fn mode_of(_path: &Utf8Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_lists_every_cause() {
        let err = anyhow::anyhow!("permission denied").context("copy validators");
        assert_eq!(
            error_chain(&err),
            "  - copy validators\n  - permission denied"
        );
    }

    #[test]
    fn missing_path_has_unknown_fields() {
        let ctx = PathContext::of(Utf8Path::new("/definitely/not/here"));
        assert_eq!(ctx.mode, None);
        assert!(ctx.to_string().contains("Permissions: ?"));
    }

    #[cfg(unix)]
    #[test]
    fn capture_reads_process_owner() {
        let ctx = ProcessContext::capture();
        assert!(ctx.uid.is_some());
        assert!(ctx.to_string().starts_with(" - UID: "));
    }
}
