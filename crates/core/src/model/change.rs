use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What a changed path means for the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A solution file: the whole project set may have changed.
    SolutionMeta,
    /// A project file: that project's shape may have changed.
    ProjectMeta,
    SourceFile,
    /// Build or analyzer configuration affecting every project beneath it.
    ConfigFile,
}

/// Changes accumulated during a quiescence window.
///
/// Inserting the same path twice keeps one entry, so the batch only grows
/// until it is drained with [`PendingChangeBatch::take`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeBatch {
    entries: BTreeMap<PathBuf, ChangeKind>,
}

impl PendingChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.entries.insert(path.into(), kind);
    }

    /// Swap the accumulated entries out, leaving this batch empty.
    pub fn take(&mut self) -> PendingChangeBatch {
        std::mem::take(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_kind(&self, kind: ChangeKind) -> bool {
        self.entries.values().any(|k| *k == kind)
    }

    pub fn paths(&self, kind: ChangeKind) -> impl Iterator<Item = &Path> + '_ {
        self.entries
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(p, _)| p.as_path())
    }
}

impl FromIterator<(PathBuf, ChangeKind)> for PendingChangeBatch {
    fn from_iter<I: IntoIterator<Item = (PathBuf, ChangeKind)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
