use camino::{Utf8Path, Utf8PathBuf};

/// Read-only view of the project checkout being scanned.
///
/// The planner only asks whether marker files exist, so tests can use an
/// in-memory implementation.
pub trait ProjectView {
    fn root(&self) -> &Utf8Path;

    fn exists(&self, rel: &Utf8Path) -> bool;
}

/// File-system backed `ProjectView`.
#[derive(Debug, Clone)]
pub struct FsProjectView {
    root: Utf8PathBuf,
}

impl FsProjectView {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }
}

impl ProjectView for FsProjectView {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn exists(&self, rel: &Utf8Path) -> bool {
        if rel.is_absolute() {
            rel.exists()
        } else {
            self.root.join(rel).exists()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn exists_is_relative_to_root() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("tox.ini"), "").expect("write");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        let view = FsProjectView::new(root);
        assert!(view.exists(Utf8Path::new("tox.ini")));
        assert!(!view.exists(Utf8Path::new("setup.py")));
    }
}
