use super::EngineHandle;
use crate::error::StratumError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use stratum_api::{
    ApiError, ApiResult, WatchHandle, WorkspaceInfo, WorkspaceLifecycle, WorkspaceStatus,
};

#[async_trait]
impl WorkspaceLifecycle for EngineHandle {
    async fn load_or_reload(&self, path: &Path) -> ApiResult<WorkspaceInfo> {
        self.sync
            .load_or_reload(path)
            .await
            .map_err(ApiError::from)
    }

    async fn status(&self) -> ApiResult<WorkspaceStatus> {
        Ok(self.sync.status().await)
    }

    async fn start_watch(&self) -> ApiResult<Arc<dyn WatchHandle>> {
        let generation = self.sync.snapshot().await;
        let Some(root) = generation.root() else {
            return Err(StratumError::not_found("loaded workspace").into());
        };
        let handle = self.sync.watch(root).map_err(ApiError::from)?;
        Ok(Arc::new(handle))
    }
}
