//! Turning a change batch into a candidate generation.

use super::classify::ChangeClassifier;
use super::ensure_active;
use crate::error::{Result, StratumError};
use crate::model::{
    Candidate, ChangeKind, DocumentSnapshot, Generation, GenerationDraft, PendingChangeBatch,
    ProjectId, ProjectSnapshot, WorkspaceSource,
};
use crate::plugin::{IndexError, ProjectDescriptor, SemanticIndex};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) struct Reconciler<'a> {
    index: &'a dyn SemanticIndex,
    classifier: &'a ChangeClassifier,
    token: &'a CancellationToken,
}

/// Index failures while reconciling are fatal for the batch.
fn fatal(path: &Path, err: IndexError) -> StratumError {
    StratumError::Fatal(format!("{}: {}", path.display(), err))
}

/// File text, lossily decoded. `None` when the file no longer exists.
pub(crate) fn read_text(path: &Path) -> Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(
        index: &'a dyn SemanticIndex,
        classifier: &'a ChangeClassifier,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            index,
            classifier,
            token,
        }
    }

    /// Load `source` from scratch. Always yields a candidate.
    pub(crate) fn load(
        &self,
        base: &Generation,
        source: &WorkspaceSource,
    ) -> Result<Option<Candidate>> {
        let mut draft = GenerationDraft::from_base(base);
        self.reload_all(&mut draft, base, source)?;
        Ok(draft.finish())
    }

    /// Apply `batch` on top of `base`.
    ///
    /// A solution change reloads the project set and subsumes project and
    /// configuration changes; source changes are applied afterwards either way.
    pub(crate) fn apply_batch(
        &self,
        base: &Generation,
        batch: &PendingChangeBatch,
    ) -> Result<Option<Candidate>> {
        let Some(source) = base.source.clone() else {
            tracing::debug!("No workspace loaded; dropping {} change(s)", batch.len());
            return Ok(None);
        };

        let mut draft = GenerationDraft::from_base(base);
        let full_reload = batch.contains_kind(ChangeKind::SolutionMeta);

        if full_reload {
            tracing::info!("Solution changed; reloading every project");
            self.reload_all(&mut draft, base, &source)?;
        } else {
            for path in batch.paths(ChangeKind::ProjectMeta) {
                ensure_active(self.token)?;
                self.apply_project_change(&mut draft, base, path)?;
            }
        }

        for path in batch.paths(ChangeKind::SourceFile) {
            ensure_active(self.token)?;
            self.apply_source_change(&mut draft, path)?;
        }

        if !full_reload {
            for path in batch.paths(ChangeKind::ConfigFile) {
                self.apply_config_change(&mut draft, path);
            }
        }

        Ok(draft.finish())
    }

    fn reload_all(
        &self,
        draft: &mut GenerationDraft,
        base: &Generation,
        source: &WorkspaceSource,
    ) -> Result<()> {
        let (source, descriptors) = self.describe(source)?;
        let mut projects = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            ensure_active(self.token)?;
            let previous = base.project_by_path(&descriptor.path).cloned();
            projects.push(self.build_project(descriptor, previous.as_deref(), draft.id())?);
        }
        tracing::info!(
            "Loaded {} project(s) from {}",
            projects.len(),
            source.root().display()
        );
        draft.replace_all(source, projects);
        Ok(())
    }

    /// Resolve the project set of `source`.
    ///
    /// A directory resolves to its top-level solution when it has one.
    fn describe(
        &self,
        source: &WorkspaceSource,
    ) -> Result<(WorkspaceSource, Vec<ProjectDescriptor>)> {
        match source {
            WorkspaceSource::Solution(path) => {
                let projects = self.index.open_solution(path).map_err(|e| fatal(path, e))?;
                Ok((source.clone(), projects))
            }
            WorkspaceSource::Project(path) => {
                let project = self.index.open_project(path).map_err(|e| fatal(path, e))?;
                Ok((source.clone(), vec![project]))
            }
            WorkspaceSource::Directory(root) => {
                if let Some(solution) = self.top_level_solution(root)? {
                    let projects = self
                        .index
                        .open_solution(&solution)
                        .map_err(|e| fatal(&solution, e))?;
                    return Ok((WorkspaceSource::Solution(solution), projects));
                }

                let files = self.project_files(root);
                if files.is_empty() {
                    return Err(StratumError::unsupported(
                        root,
                        "no solution or project files found",
                    ));
                }
                let mut projects = Vec::with_capacity(files.len());
                for file in files {
                    ensure_active(self.token)?;
                    projects.push(self.index.open_project(&file).map_err(|e| fatal(&file, e))?);
                }
                Ok((source.clone(), projects))
            }
        }
    }

    fn top_level_solution(&self, root: &Path) -> Result<Option<PathBuf>> {
        let mut solutions: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && self.classifier.classify_in(root, path) == Some(ChangeKind::SolutionMeta)
            })
            .collect();
        solutions.sort();
        if solutions.len() > 1 {
            tracing::warn!(
                "Several solutions in {}; using {}",
                root.display(),
                solutions[0].display()
            );
        }
        Ok(solutions.into_iter().next())
    }

    /// Project files under `root`, honoring ignore files and ignored directories.
    fn project_files(&self, root: &Path) -> Vec<PathBuf> {
        let classifier = self.classifier.clone();
        let walk_classifier = classifier.clone();
        let mut files: Vec<PathBuf> = WalkBuilder::new(root)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && walk_classifier.is_ignored_dir(&entry.file_name().to_string_lossy()))
            })
            .build()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.is_file() && classifier.classify_in(root, path) == Some(ChangeKind::ProjectMeta) {
                    return Some(path.to_path_buf());
                }
                None
            })
            .collect();
        files.sort();
        files
    }

    /// Snapshot for `descriptor`, sharing documents whose text is unchanged.
    fn build_project(
        &self,
        descriptor: ProjectDescriptor,
        previous: Option<&ProjectSnapshot>,
        revision: stratum_api::GenerationId,
    ) -> Result<ProjectSnapshot> {
        let mut project = ProjectSnapshot::new(descriptor.name, descriptor.path, revision);
        for path in descriptor.documents {
            ensure_active(self.token)?;
            let Some(text) = read_text(&path)? else {
                tracing::warn!(
                    "{} lists missing document {}",
                    project.path.display(),
                    path.display()
                );
                continue;
            };
            let reused = previous
                .and_then(|p| p.documents.get(&path))
                .filter(|d| d.version == DocumentSnapshot::version_of(&text))
                .cloned();
            let document =
                reused.unwrap_or_else(|| Arc::new(DocumentSnapshot::new(&path, text, revision)));
            project.documents.insert(path, document);
        }
        Ok(project)
    }

    fn apply_project_change(
        &self,
        draft: &mut GenerationDraft,
        base: &Generation,
        path: &Path,
    ) -> Result<()> {
        let id = ProjectId::from_path(path);
        if !path.exists() {
            if draft.remove_project(id) {
                tracing::info!("Project {} removed", path.display());
            }
            return Ok(());
        }

        let accepted = draft.project(id).is_some()
            || matches!(draft.source(), Some(WorkspaceSource::Directory(root)) if path.starts_with(root));
        if !accepted {
            tracing::debug!("Ignoring project {} outside the loaded set", path.display());
            return Ok(());
        }

        let descriptor = self.index.open_project(path).map_err(|e| fatal(path, e))?;
        let previous = base.projects.get(&id).cloned();
        let project = self.build_project(descriptor, previous.as_deref(), draft.id())?;
        tracing::debug!(
            "Reloaded project {} ({} documents)",
            project.name,
            project.documents.len()
        );
        draft.upsert_project(project);
        Ok(())
    }

    fn apply_source_change(&self, draft: &mut GenerationDraft, path: &Path) -> Result<()> {
        match read_text(path)? {
            None => {
                if draft.remove_document(path) {
                    tracing::debug!("Document {} removed", path.display());
                }
            }
            Some(text) => match draft.owner_of(path) {
                Some(owner) => {
                    draft.put_document(owner, path, text);
                }
                None => tracing::debug!("{} belongs to no loaded project", path.display()),
            },
        }
        Ok(())
    }

    fn apply_config_change(&self, draft: &mut GenerationDraft, path: &Path) {
        let Some(dir) = path.parent() else {
            return;
        };
        let affected: Vec<ProjectId> = draft
            .projects()
            .filter(|p| p.directory.starts_with(dir) || dir.starts_with(&p.directory))
            .map(|p| p.id)
            .collect();
        for id in &affected {
            draft.bump_config_revision(*id);
        }
        tracing::debug!(
            "Configuration {} affects {} project(s)",
            path.display(),
            affected.len()
        );
    }
}
