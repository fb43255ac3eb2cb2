//! Per-file write locks for one scheduling phase.
//!
//! The lock table maps a resolved file path to the category currently
//! holding it. Acquisition never waits: files held by someone else are simply
//! left out of the grant and the caller defers the errors in them to the next
//! iteration. Because nothing ever blocks on a lock, two agents cannot
//! deadlock on each other.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::models::CategoryId;

/// Exclusive per-file locks held by category agents.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<PathBuf, CategoryId>>,
}

impl LockManager {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation mutates the table in one step, so a poisoned guard
    // still holds a consistent table.
    fn table(&self) -> MutexGuard<'_, HashMap<PathBuf, CategoryId>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock as many of `files` as possible for `holder`.
    ///
    /// Returns the granted subset: files that were free plus files `holder`
    /// already held. The decision for the whole request is made under one
    /// critical section, so concurrent callers never both receive a file.
    pub fn acquire<'a, I>(&self, holder: &CategoryId, files: I) -> BTreeSet<PathBuf>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut table = self.table();
        let mut granted = BTreeSet::new();

        for file in files {
            match table.get(file) {
                Some(owner) if owner != holder => {}
                Some(_) => {
                    granted.insert(file.to_path_buf());
                }
                None => {
                    table.insert(file.to_path_buf(), holder.clone());
                    granted.insert(file.to_path_buf());
                }
            }
        }

        granted
    }

    /// Free every file held by `holder`. Returns how many were released.
    pub fn release(&self, holder: &CategoryId) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, owner| owner != holder);
        before - table.len()
    }

    /// Drop every lock. Called at the end of each scheduling phase.
    pub fn reset(&self) {
        self.table().clear();
    }

    /// Category currently holding `file`.
    pub fn holder(&self, file: &Path) -> Option<CategoryId> {
        self.table().get(file).cloned()
    }

    /// Files currently locked by `holder`.
    pub fn held_by(&self, holder: &CategoryId) -> BTreeSet<PathBuf> {
        self.table()
            .iter()
            .filter(|(_, owner)| *owner == holder)
            .map(|(file, _)| file.clone())
            .collect()
    }

    /// Whether no file is locked.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
