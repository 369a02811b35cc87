use crate::config::WorkspacePaths;
use std::{fs, io, path::Path};

const LOG_TARGET: &str = "workspace";

#[derive(thiserror::Error, Debug)]
pub enum WorkspaceError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Scratch directories owned by one analyzer: staged audio, grid output, table output.
#[derive(Clone, Debug)]
pub struct TemporaryWorkspace {
    paths: WorkspacePaths,
}

impl TemporaryWorkspace {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    /// Creates the scratch dirs; they are purged again when the guard drops.
    pub fn acquire(&self) -> Result<WorkspaceGuard<'_>, WorkspaceError> {
        let guard = WorkspaceGuard { workspace: self };
        for dir in self.paths.all() {
            fs::create_dir_all(dir).map_err(|source| WorkspaceError::Create {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(guard)
    }

    /// Removes all three dirs. Missing dirs are fine; other errors are logged and skipped.
    pub fn purge(&self) {
        for dir in self.paths.all() {
            remove_dir_if_present(dir);
        }
    }
}

/// Purges the workspace on every exit path of the scope holding it.
#[must_use = "the workspace is purged as soon as the guard is dropped"]
pub struct WorkspaceGuard<'a> {
    workspace: &'a TemporaryWorkspace,
}

impl WorkspaceGuard<'_> {
    pub fn paths(&self) -> &WorkspacePaths {
        self.workspace.paths()
    }
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        self.workspace.purge();
    }
}

fn remove_dir_if_present(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => tracing::trace!(target: LOG_TARGET, dir = %dir.display(), "purged"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(target: LOG_TARGET, dir = %dir.display(), error = %e, "purge failed")
        }
    }
}

/// Deletes files in `dir` whose extension matches `ext` (case-insensitive).
pub(crate) fn remove_files_with_extension(dir: &Path, ext: &str) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if matches && path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::debug!(target: LOG_TARGET, path = %path.display(), error = %e, "stale file not removed")
                }
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_in(root: &Path) -> TemporaryWorkspace {
        TemporaryWorkspace::new(WorkspacePaths::under(root))
    }

    #[test]
    fn guard_creates_then_purges_all_dirs() {
        let root = tempfile::tempdir().expect("tempdir");
        let ws = workspace_in(root.path());
        {
            let guard = ws.acquire().expect("acquire");
            for dir in guard.paths().all() {
                assert!(dir.is_dir());
                fs::write(dir.join("leftover.tmp"), b"x").expect("write");
            }
        }
        for dir in ws.paths().all() {
            assert!(!dir.exists(), "{} survived", dir.display());
        }
    }

    #[test]
    fn purge_is_idempotent_and_tolerates_missing_dirs() {
        let root = tempfile::tempdir().expect("tempdir");
        let ws = workspace_in(root.path());
        ws.purge();
        ws.purge();
        let _guard = ws.acquire().expect("acquire");
        ws.purge();
        ws.purge();
        assert!(!ws.paths().grids.exists());
    }

    #[test]
    fn guard_purges_when_scope_unwinds_early() {
        fn failing_step(ws: &TemporaryWorkspace) -> Result<(), String> {
            let guard = ws.acquire().map_err(|e| e.to_string())?;
            fs::write(guard.paths().audio.join("proc_a.wav"), b"RIFF").map_err(|e| e.to_string())?;
            Err("engine exploded".to_owned())
        }

        let root = tempfile::tempdir().expect("tempdir");
        let ws = workspace_in(root.path());
        assert!(failing_step(&ws).is_err());
        assert!(!ws.paths().audio.exists());
    }

    #[test]
    fn remove_files_with_extension_only_touches_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.TextGrid"), b"").expect("write");
        fs::write(dir.path().join("b.textgrid"), b"").expect("write");
        fs::write(dir.path().join("keep.csv"), b"").expect("write");

        let removed = remove_files_with_extension(dir.path(), "TextGrid").expect("scan");
        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.csv").exists());
    }

    #[test]
    fn remove_files_with_extension_on_missing_dir_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert_eq!(remove_files_with_extension(&missing, "TextGrid").expect("noop"), 0);
    }
}
