use super::reconcile::Reconciler;
use super::*;
use crate::model::{GenerationDraft, WorkspaceSource};
use std::path::Path;
use std::time::Instant;
use stratum_api::{ProjectInfo, WorkspaceInfo, WorkspaceStatus};

impl WorkspaceSynchronizer {
    /// Load a solution, a project, or a directory, replacing the project set.
    pub async fn load_or_reload(&self, path: &Path) -> Result<WorkspaceInfo> {
        let started = Instant::now();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(StratumError::NotFound {
                what: "workspace".to_string(),
                path: Some(path.to_path_buf()),
            });
        }
        let path = tokio::fs::canonicalize(path).await?;

        let source = if tokio::fs::metadata(&path).await?.is_dir() {
            WorkspaceSource::Directory(path)
        } else {
            match self.classifier.classify(&path) {
                Some(ChangeKind::SolutionMeta) => WorkspaceSource::Solution(path),
                Some(ChangeKind::ProjectMeta) => WorkspaceSource::Project(path),
                _ => {
                    return Err(StratumError::unsupported(
                        path,
                        "not a solution or project file",
                    ));
                }
            }
        };

        let _guard = self.reconcile_lock.lock().await;
        let token = self.cancel_token.child_token();
        let index = self.index.clone();
        let classifier = self.classifier.clone();
        self.publish_with_retry(&token, move |base, token| {
            Reconciler::new(index.as_ref(), &classifier, token).load(base, &source)
        })
        .await?;

        let generation = self.snapshot().await;
        let info = WorkspaceInfo {
            root: generation.root().map(Path::to_path_buf).unwrap_or_default(),
            generation: generation.id,
            projects: generation
                .projects
                .values()
                .map(|p| ProjectInfo {
                    id: p.id.0,
                    name: p.name.clone(),
                    path: p.path.clone(),
                    documents: p.documents.len(),
                })
                .collect(),
            load_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Workspace {} loaded: {} project(s), {} document(s) in {}ms",
            info.root.display(),
            info.projects.len(),
            info.document_count(),
            info.load_time_ms
        );
        Ok(info)
    }

    /// Publish an in-memory edit of one document.
    ///
    /// Competes with reconciliations through compare-and-publish only; the
    /// reconcile lock is not taken. Returns `None` if the text is unchanged.
    pub async fn apply_document_text(
        &self,
        path: &Path,
        text: impl Into<String>,
    ) -> Result<Option<GenerationId>> {
        let path = path.to_path_buf();
        let text = text.into();
        let token = self.cancel_token.child_token();
        self.publish_with_retry(&token, move |base, _| {
            let mut draft = GenerationDraft::from_base(base);
            let Some(owner) = draft.owner_of(&path) else {
                return Err(StratumError::NotFound {
                    what: "project for document".to_string(),
                    path: Some(path.clone()),
                });
            };
            draft.put_document(owner, &path, text.clone());
            Ok(draft.finish())
        })
        .await
    }

    pub async fn status(&self) -> WorkspaceStatus {
        let generation = self.snapshot().await;
        WorkspaceStatus {
            is_loaded: generation.is_loaded(),
            generation: generation.id,
            projects_loaded: generation.projects.len(),
            documents_analyzed: generation.document_count(),
            cache_hit_rate: self.cache.stats().hit_ratio,
            pending_changes: self.pending_changes(),
            last_update: (generation.id != GenerationId::EMPTY)
                .then(|| generation.created_at_millis()),
        }
    }
}
