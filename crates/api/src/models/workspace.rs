use super::symbol::GenerationId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct WorkspaceStatus {
    pub is_loaded: bool,
    pub generation: GenerationId,
    pub projects_loaded: usize,
    pub documents_analyzed: usize,
    /// Compilation cache hit ratio in `[0, 1]`.
    pub cache_hit_rate: f64,
    pub pending_changes: usize,
    /// Unix epoch milliseconds of the last publish, if any.
    pub last_update: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct ProjectInfo {
    pub id: u64,
    pub name: String,
    pub path: PathBuf,
    pub documents: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct WorkspaceInfo {
    pub root: PathBuf,
    pub generation: GenerationId,
    pub projects: Vec<ProjectInfo>,
    pub load_time_ms: u64,
}

impl WorkspaceInfo {
    pub fn document_count(&self) -> usize {
        self.projects.iter().map(|p| p.documents).sum()
    }
}
