use crate::ApiResult;
use crate::models::{WorkspaceInfo, WorkspaceStatus};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub trait WatchHandle: Send + Sync {
    fn stop(&self);
}

#[async_trait]
pub trait WorkspaceLifecycle: Send + Sync {
    /// Load a solution, a project, or a directory containing either.
    /// Calling it again replaces the whole project set.
    async fn load_or_reload(&self, path: &Path) -> ApiResult<WorkspaceInfo>;

    /// Snapshot of what is currently loaded.
    async fn status(&self) -> ApiResult<WorkspaceStatus>;

    /// Watch the loaded workspace root for filesystem changes.
    async fn start_watch(&self) -> ApiResult<Arc<dyn WatchHandle>>;
}
