//! Fix agent port and the file grant agents work through.
//!
//! An agent never touches the source tree directly. The scheduler hands it a
//! [`FileGrant`] covering exactly the files the lock manager granted, and
//! every read or write goes through that grant. Touching a file outside it is
//! a contract violation ([`DomainError::UngrantedFile`]) and the dispatch is
//! reported as failed.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ErrorRecord, FixReport, StopSignal};
use crate::infrastructure::fs::write_atomic;

/// Resolve `path` against `root` and normalise `.`/`..` lexically.
///
/// Lock keys and grant checks both go through this function, so the same
/// file printed as `src/./A.cs` and `/ws/src/A.cs` maps to one key.
pub fn resolve_in(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// FileGrant
// ---------------------------------------------------------------------------

/// The set of files one agent may read and write during one iteration.
#[derive(Debug, Clone)]
pub struct FileGrant {
    agent: String,
    root: PathBuf,
    files: BTreeSet<PathBuf>,
    stop: StopSignal,
}

impl FileGrant {
    /// `files` must already be resolved with [`resolve_in`].
    pub fn new(
        agent: impl Into<String>,
        root: impl Into<PathBuf>,
        files: impl IntoIterator<Item = PathBuf>,
        stop: StopSignal,
    ) -> Self {
        Self {
            agent: agent.into(),
            root: root.into(),
            files: files.into_iter().collect(),
            stop,
        }
    }

    /// Name of the agent holding the grant.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Workspace root relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Granted files, resolved and sorted.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Number of granted files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the grant covers no file.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve `path` against the grant's root without checking it.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_in(&self.root, path)
    }

    /// Whether `path` is covered by this grant.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(&self.resolve(path))
    }

    /// Resolve `path` and check it is covered by this grant.
    pub fn authorize(&self, path: &Path) -> DomainResult<PathBuf> {
        let resolved = self.resolve(path);
        if self.files.contains(&resolved) {
            Ok(resolved)
        } else {
            Err(DomainError::UngrantedFile {
                agent: self.agent.clone(),
                path: resolved,
            })
        }
    }

    /// Read a granted file.
    pub async fn read(&self, path: &Path) -> DomainResult<String> {
        let target = self.authorize(path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| DomainError::io(target, e))
    }

    /// Replace the file's contents atomically.
    pub async fn write(&self, path: &Path, contents: String) -> DomainResult<()> {
        let target = self.authorize(path)?;
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            write_atomic(&target, contents.as_bytes()).map_err(|e| DomainError::io(target, e))
        })
        .await
        .map_err(|e| DomainError::AgentFailed {
            agent,
            reason: format!("write task aborted: {e}"),
        })?
    }

    /// Agents check this between files and stop early when set.
    pub fn stop_requested(&self) -> bool {
        self.stop.is_triggered()
    }
}

// ---------------------------------------------------------------------------
// FixAgent
// ---------------------------------------------------------------------------

/// A pluggable repair routine bound to one error category.
///
/// Agents are stateless across calls; anything they remember lives in the
/// files they write. The errors passed in are already restricted to files
/// the grant covers, ordered by file then line.
#[async_trait]
pub trait FixAgent: Send + Sync {
    /// Variant name, recorded in every agent result.
    fn name(&self) -> &str;

    /// Attempt to fix `errors`. `Err` (including an ungranted access) marks
    /// the dispatch as failed; partial progress is reported through
    /// [`FixReport::resolved`].
    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport>;
}

/// Group errors by file, keeping input order within each file.
pub fn errors_by_file(errors: &[ErrorRecord]) -> Vec<(&Path, Vec<&ErrorRecord>)> {
    let mut groups: Vec<(&Path, Vec<&ErrorRecord>)> = Vec::new();
    for error in errors {
        match groups.iter_mut().find(|(file, _)| *file == error.file.as_path()) {
            Some((_, bucket)) => bucket.push(error),
            None => groups.push((error.file.as_path(), vec![error])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_normalises_relative_and_dot_segments() {
        let root = Path::new("/ws");
        assert_eq!(resolve_in(root, Path::new("src/./A.cs")), PathBuf::from("/ws/src/A.cs"));
        assert_eq!(
            resolve_in(root, Path::new("src/sub/../A.cs")),
            PathBuf::from("/ws/src/A.cs")
        );
        assert_eq!(resolve_in(root, Path::new("/abs/B.cs")), PathBuf::from("/abs/B.cs"));
    }

    #[tokio::test]
    async fn grant_rejects_files_outside_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let granted = dir.path().join("A.cs");
        std::fs::write(&granted, "class A {}").unwrap();
        std::fs::write(dir.path().join("B.cs"), "class B {}").unwrap();

        let grant = FileGrant::new("test", dir.path(), vec![granted], StopSignal::new());

        assert_eq!(grant.read(Path::new("A.cs")).await.unwrap(), "class A {}");
        let err = grant
            .write(Path::new("B.cs"), "hacked".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::UngrantedFile { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("B.cs")).unwrap(),
            "class B {}"
        );
    }

    #[tokio::test]
    async fn grant_writes_granted_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("A.cs");
        std::fs::write(&target, "old").unwrap();

        let grant = FileGrant::new("test", dir.path(), vec![target.clone()], StopSignal::new());
        grant.write(Path::new("A.cs"), "new".to_string()).await.unwrap();

        assert_eq!(std::fs::read_to_string(target).unwrap(), "new");
    }

    #[test]
    fn errors_grouped_by_file_in_first_seen_order() {
        let errors = vec![
            ErrorRecord::new("b.cs", "1"),
            ErrorRecord::new("a.cs", "2"),
            ErrorRecord::new("b.cs", "3"),
        ];
        let groups = errors_by_file(&errors);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Path::new("b.cs"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, Path::new("a.cs"));
    }
}
