use crate::error::{Result, StratumError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use stratum_api::{GenerationId, SymbolHandle, SymbolId};
use xxhash_rust::xxh3::xxh3_64;

/// Stable project identity derived from the metadata path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl ProjectId {
    pub fn from_path(path: &Path) -> Self {
        ProjectId(xxh3_64(path.to_string_lossy().as_bytes()))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Compilation cache key. A new revision of either kind yields a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub project: ProjectId,
    pub revision: GenerationId,
    pub config_revision: GenerationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub path: PathBuf,
    pub text: Arc<str>,
    /// xxh3 of `text`.
    pub version: u64,
    /// Generation in which this text was captured.
    pub generation: GenerationId,
}

impl DocumentSnapshot {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<Arc<str>>, generation: GenerationId) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            version: Self::version_of(&text),
            text,
            generation,
        }
    }

    pub fn version_of(text: &str) -> u64 {
        xxh3_64(text.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub name: String,
    /// Project metadata file.
    pub path: PathBuf,
    pub directory: PathBuf,
    pub documents: BTreeMap<PathBuf, Arc<DocumentSnapshot>>,
    /// Generation in which the project shape or one of its documents last changed.
    pub revision: GenerationId,
    /// Generation of the last configuration change affecting this project.
    pub config_revision: GenerationId,
}

impl ProjectSnapshot {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, revision: GenerationId) -> Self {
        let path = path.into();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            id: ProjectId::from_path(&path),
            name: name.into(),
            path,
            directory,
            documents: BTreeMap::new(),
            revision,
            config_revision: revision,
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey {
            project: self.id,
            revision: self.revision,
            config_revision: self.config_revision,
        }
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.directory)
    }
}

/// How the workspace was loaded; drives full reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceSource {
    Solution(PathBuf),
    Project(PathBuf),
    /// A directory of project files without a solution.
    Directory(PathBuf),
}

impl WorkspaceSource {
    pub fn root(&self) -> &Path {
        match self {
            WorkspaceSource::Solution(path) | WorkspaceSource::Project(path) => {
                path.parent().unwrap_or(path)
            }
            WorkspaceSource::Directory(root) => root,
        }
    }
}

/// An immutable published snapshot of the workspace.
#[derive(Debug, Clone)]
pub struct Generation {
    pub id: GenerationId,
    pub source: Option<WorkspaceSource>,
    pub projects: BTreeMap<ProjectId, Arc<ProjectSnapshot>>,
    pub created_at: SystemTime,
}

impl Generation {
    pub fn empty() -> Self {
        Self {
            id: GenerationId::EMPTY,
            source: None,
            projects: BTreeMap::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.source.as_ref().map(WorkspaceSource::root)
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    pub fn document_count(&self) -> usize {
        self.projects.values().map(|p| p.documents.len()).sum()
    }

    pub fn document(&self, path: &Path) -> Option<(&Arc<ProjectSnapshot>, &Arc<DocumentSnapshot>)> {
        self.projects
            .values()
            .find_map(|p| p.documents.get(path).map(|d| (p, d)))
    }

    pub fn project_by_path(&self, path: &Path) -> Option<&Arc<ProjectSnapshot>> {
        self.projects.get(&ProjectId::from_path(path))
    }

    /// Project with the deepest directory containing `path`.
    pub fn project_containing(&self, path: &Path) -> Option<&Arc<ProjectSnapshot>> {
        self.projects
            .values()
            .filter(|p| p.contains_path(path))
            .max_by_key(|p| p.directory.components().count())
    }

    pub fn handle(&self, symbol: SymbolId) -> SymbolHandle {
        SymbolHandle::new(self.id, symbol)
    }

    pub fn check_handle(&self, handle: &SymbolHandle) -> Result<()> {
        if handle.generation != self.id {
            return Err(StratumError::Stale {
                handle: handle.clone(),
                current: self.id,
            });
        }
        Ok(())
    }

    pub fn created_at_millis(&self) -> u64 {
        self.created_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Which projects a candidate touched relative to its base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub full_reload: bool,
    pub changed: Vec<ProjectId>,
    pub removed: Vec<ProjectId>,
}

/// A generation ready for compare-and-publish against `base`.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub base: GenerationId,
    pub generation: Generation,
    pub summary: ChangeSummary,
}

/// Copy-on-write builder for the generation after `base`.
///
/// Untouched projects and documents keep sharing their `Arc` with the base.
pub struct GenerationDraft {
    base: GenerationId,
    id: GenerationId,
    source: Option<WorkspaceSource>,
    projects: BTreeMap<ProjectId, Arc<ProjectSnapshot>>,
    changed: BTreeSet<ProjectId>,
    removed: BTreeSet<ProjectId>,
    full_reload: bool,
}

impl GenerationDraft {
    pub fn from_base(base: &Generation) -> Self {
        Self {
            base: base.id,
            id: base.id.next(),
            source: base.source.clone(),
            projects: base.projects.clone(),
            changed: BTreeSet::new(),
            removed: BTreeSet::new(),
            full_reload: false,
        }
    }

    /// Id the finished generation will carry.
    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn source(&self) -> Option<&WorkspaceSource> {
        self.source.as_ref()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Arc<ProjectSnapshot>> {
        self.projects.get(&id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Arc<ProjectSnapshot>> + '_ {
        self.projects.values()
    }

    /// Project owning `path`: the one listing it, else the deepest one whose
    /// directory contains it.
    pub fn owner_of(&self, path: &Path) -> Option<ProjectId> {
        self.projects
            .values()
            .find(|p| p.documents.contains_key(path))
            .or_else(|| {
                self.projects
                    .values()
                    .filter(|p| p.contains_path(path))
                    .max_by_key(|p| p.directory.components().count())
            })
            .map(|p| p.id)
    }

    /// Replace the whole project set.
    pub fn replace_all(&mut self, source: WorkspaceSource, projects: Vec<ProjectSnapshot>) {
        self.source = Some(source);
        self.projects = projects
            .into_iter()
            .map(|p| (p.id, Arc::new(p)))
            .collect();
        self.full_reload = true;
    }

    pub fn upsert_project(&mut self, project: ProjectSnapshot) {
        self.removed.remove(&project.id);
        self.changed.insert(project.id);
        self.projects.insert(project.id, Arc::new(project));
    }

    pub fn remove_project(&mut self, id: ProjectId) -> bool {
        if self.projects.remove(&id).is_none() {
            return false;
        }
        self.changed.remove(&id);
        self.removed.insert(id);
        true
    }

    /// Store `text` for `path` in `project`. Returns false when the text is unchanged.
    pub fn put_document(&mut self, project: ProjectId, path: &Path, text: String) -> bool {
        let id = self.id;
        self.touch(project, |p| {
            let version = DocumentSnapshot::version_of(&text);
            if p.documents.get(path).is_some_and(|d| d.version == version) {
                return false;
            }
            p.documents.insert(
                path.to_path_buf(),
                Arc::new(DocumentSnapshot::new(path, text, id)),
            );
            p.revision = id;
            true
        })
    }

    /// Drop `path` from whichever project owns it.
    pub fn remove_document(&mut self, path: &Path) -> bool {
        let owner = self
            .projects
            .values()
            .find(|p| p.documents.contains_key(path))
            .map(|p| p.id);
        let Some(owner) = owner else {
            return false;
        };
        let id = self.id;
        self.touch(owner, |p| {
            p.documents.remove(path);
            p.revision = id;
            true
        })
    }

    pub fn bump_config_revision(&mut self, project: ProjectId) -> bool {
        let id = self.id;
        self.touch(project, |p| {
            if p.config_revision == id {
                return false;
            }
            p.config_revision = id;
            true
        })
    }

    fn touch(&mut self, id: ProjectId, f: impl FnOnce(&mut ProjectSnapshot) -> bool) -> bool {
        let Some(current) = self.projects.get(&id) else {
            return false;
        };
        let mut next = ProjectSnapshot::clone(current);
        if !f(&mut next) {
            return false;
        }
        self.projects.insert(id, Arc::new(next));
        self.changed.insert(id);
        true
    }

    /// Finish the draft. `None` when nothing changed relative to the base.
    pub fn finish(self) -> Option<Candidate> {
        if !self.full_reload && self.changed.is_empty() && self.removed.is_empty() {
            return None;
        }
        Some(Candidate {
            base: self.base,
            generation: Generation {
                id: self.id,
                source: self.source,
                projects: self.projects,
                created_at: SystemTime::now(),
            },
            summary: ChangeSummary {
                full_reload: self.full_reload,
                changed: self.changed.into_iter().collect(),
                removed: self.removed.into_iter().collect(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with_project() -> (Generation, ProjectId) {
        let mut project = ProjectSnapshot::new("App", "/ws/app/App.csproj", GenerationId(1));
        project.documents.insert(
            PathBuf::from("/ws/app/a.cs"),
            Arc::new(DocumentSnapshot::new("/ws/app/a.cs", "class A {}", GenerationId(1))),
        );
        let id = project.id;
        let generation = Generation {
            id: GenerationId(1),
            source: Some(WorkspaceSource::Directory(PathBuf::from("/ws"))),
            projects: BTreeMap::from([(id, Arc::new(project))]),
            created_at: SystemTime::now(),
        };
        (generation, id)
    }

    #[test]
    fn unchanged_text_yields_no_candidate() {
        let (base, id) = base_with_project();
        let mut draft = GenerationDraft::from_base(&base);
        assert!(!draft.put_document(id, Path::new("/ws/app/a.cs"), "class A {}".into()));
        assert!(draft.finish().is_none());
    }

    #[test]
    fn edit_bumps_revision_and_shares_untouched_documents() {
        let (mut base, id) = base_with_project();
        let mut other = ProjectSnapshot::new("Lib", "/ws/lib/Lib.csproj", GenerationId(1));
        other.documents.insert(
            PathBuf::from("/ws/lib/l.cs"),
            Arc::new(DocumentSnapshot::new("/ws/lib/l.cs", "class L {}", GenerationId(1))),
        );
        let other_id = other.id;
        base.projects.insert(other_id, Arc::new(other));

        let mut draft = GenerationDraft::from_base(&base);
        assert!(draft.put_document(id, Path::new("/ws/app/a.cs"), "class A2 {}".into()));
        let candidate = draft.finish().unwrap();

        assert_eq!(candidate.base, GenerationId(1));
        assert_eq!(candidate.generation.id, GenerationId(2));
        assert_eq!(candidate.summary.changed, vec![id]);
        let app = &candidate.generation.projects[&id];
        assert_eq!(app.revision, GenerationId(2));
        assert_eq!(app.config_revision, GenerationId(1));
        assert!(Arc::ptr_eq(
            &candidate.generation.projects[&other_id],
            &base.projects[&other_id]
        ));
    }

    #[test]
    fn stale_handles_are_rejected() {
        let (base, _) = base_with_project();
        let handle = SymbolHandle::new(GenerationId(0), SymbolId::new("T:A"));
        assert!(matches!(
            base.check_handle(&handle),
            Err(StratumError::Stale { current: GenerationId(1), .. })
        ));
        assert!(base.check_handle(&base.handle(SymbolId::new("T:A"))).is_ok());
    }

    #[test]
    fn deepest_project_contains_nested_paths() {
        let (mut base, _) = base_with_project();
        let nested = ProjectSnapshot::new("Tests", "/ws/app/tests/Tests.csproj", GenerationId(1));
        let nested_id = nested.id;
        base.projects.insert(nested_id, Arc::new(nested));

        let owner = base.project_containing(Path::new("/ws/app/tests/t.cs")).unwrap();
        assert_eq!(owner.id, nested_id);
        assert!(base.project_containing(Path::new("/elsewhere/x.cs")).is_none());
    }
}
