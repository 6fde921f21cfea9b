use std::sync::Arc;

use crate::error::{Result, StratumError};
use crate::features::{CallGraphEngine, InheritanceEngine};
use crate::model::Generation;
use crate::plugin::{CompiledArtifact, SemanticIndex};
use crate::runtime::WorkspaceSynchronizer;
use stratum_api::{
    CallGraphQuery, CallGraphResult, DerivedScope, InheritanceQuery, InheritanceTree,
    SymbolHandle, SymbolId, SymbolLocator, SymbolSummary,
};
use tokio_util::sync::CancellationToken;

mod lifecycle;
mod semantic;

/// Engine handle - unified query interface for all clients
///
/// Every query pins the generation current when it starts and answers from
/// that snapshot only. Traversals run on the blocking pool.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) sync: Arc<WorkspaceSynchronizer>,
}

impl EngineHandle {
    pub fn new(sync: Arc<WorkspaceSynchronizer>) -> Self {
        Self { sync }
    }

    pub fn synchronizer(&self) -> &Arc<WorkspaceSynchronizer> {
        &self.sync
    }

    /// Get the current generation (cheap operation)
    pub async fn generation(&self) -> Arc<Generation> {
        self.sync.snapshot().await
    }

    /// Current generation, provided `handle` belongs to it.
    async fn pinned(&self, handle: &SymbolHandle) -> Result<Arc<Generation>> {
        let generation = self.sync.snapshot().await;
        generation.check_handle(handle)?;
        Ok(generation)
    }

    async fn run_blocking<T, F>(&self, generation: Arc<Generation>, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SemanticIndex, &Generation) -> Result<T> + Send + 'static,
    {
        let index = self.sync.index().clone();
        tokio::task::spawn_blocking(move || task(index.as_ref(), &generation)).await?
    }

    /// Fail with `NotFound` unless `symbol` is known in `generation`.
    async fn ensure_type(&self, generation: &Arc<Generation>, symbol: &SymbolId) -> Result<()> {
        let symbol = symbol.clone();
        self.run_blocking(generation.clone(), move |index, generation| {
            if index.symbol_info(generation, &symbol).is_none() {
                return Err(StratumError::not_found(format!("type {}", symbol)));
            }
            Ok(())
        })
        .await
    }

    /// Compiled artifacts of every project in `scope`.
    async fn scope_artifacts(
        &self,
        generation: &Arc<Generation>,
        scope: &DerivedScope,
    ) -> Result<Vec<Arc<CompiledArtifact>>> {
        let projects: Vec<_> = match scope {
            DerivedScope::Workspace => generation.projects.values().cloned().collect(),
            DerivedScope::Project(id) => {
                let project = generation
                    .projects
                    .values()
                    .find(|p| p.id.0 == *id)
                    .cloned()
                    .ok_or_else(|| StratumError::not_found(format!("project {:016x}", id)))?;
                vec![project]
            }
        };

        let mut artifacts = Vec::with_capacity(projects.len());
        for project in &projects {
            artifacts.push(self.sync.artifact(generation, project).await?);
        }
        Ok(artifacts)
    }

    pub async fn resolve_symbol_with_token(
        &self,
        locator: &SymbolLocator,
        token: CancellationToken,
    ) -> Result<SymbolHandle> {
        let generation = self.sync.snapshot().await;
        let locator = locator.clone();
        self.run_blocking(generation, move |index, generation| {
            crate::runtime::ensure_active(&token)?;
            let Some(symbol) = index.resolve_symbol_at(generation, &locator) else {
                let what = match locator.column {
                    Some(column) => format!("symbol at {}:{}", locator.line, column),
                    None => format!("symbol at line {}", locator.line),
                };
                return Err(StratumError::NotFound {
                    what,
                    path: Some(locator.path.clone()),
                });
            };
            Ok(generation.handle(symbol))
        })
        .await
    }

    pub async fn describe_symbol_with_token(
        &self,
        handle: &SymbolHandle,
        token: CancellationToken,
    ) -> Result<SymbolSummary> {
        let generation = self.pinned(handle).await?;
        let symbol = handle.symbol.clone();
        self.run_blocking(generation, move |index, generation| {
            crate::runtime::ensure_active(&token)?;
            if index.symbol_info(generation, &symbol).is_none() {
                return Err(StratumError::not_found(format!("symbol {}", symbol)));
            }
            Ok(crate::features::summarize(index, generation, &symbol))
        })
        .await
    }

    pub async fn call_graph_with_token(
        &self,
        handle: &SymbolHandle,
        query: &CallGraphQuery,
        token: CancellationToken,
    ) -> Result<CallGraphResult> {
        let generation = self.pinned(handle).await?;
        let symbol = handle.symbol.clone();
        let query = query.clone();
        self.run_blocking(generation, move |index, generation| {
            CallGraphEngine::new(index, generation, &token).call_graph(&symbol, &query)
        })
        .await
    }

    pub async fn inheritance_tree_with_token(
        &self,
        handle: &SymbolHandle,
        query: &InheritanceQuery,
        token: CancellationToken,
    ) -> Result<InheritanceTree> {
        let generation = self.pinned(handle).await?;
        let artifacts = if query.include_derived {
            self.scope_artifacts(&generation, &query.scope).await?
        } else {
            Vec::new()
        };
        let symbol = handle.symbol.clone();
        let query = query.clone();
        self.run_blocking(generation, move |index, generation| {
            InheritanceEngine::new(index, generation, &token).inheritance_tree(
                &symbol,
                &query,
                &artifacts,
            )
        })
        .await
    }

    pub async fn base_chain_with_token(
        &self,
        handle: &SymbolHandle,
        token: CancellationToken,
    ) -> Result<Vec<SymbolSummary>> {
        let generation = self.pinned(handle).await?;
        self.ensure_type(&generation, &handle.symbol).await?;
        let symbol = handle.symbol.clone();
        self.run_blocking(generation, move |index, generation| {
            let chain = InheritanceEngine::new(index, generation, &token).base_chain(&symbol)?;
            Ok(chain
                .iter()
                .map(|id| crate::features::summarize(index, generation, id))
                .collect())
        })
        .await
    }

    pub async fn derived_types_with_token(
        &self,
        handle: &SymbolHandle,
        scope: &DerivedScope,
        token: CancellationToken,
    ) -> Result<Vec<SymbolSummary>> {
        let generation = self.pinned(handle).await?;
        // Before compiling anything for the scope.
        self.ensure_type(&generation, &handle.symbol).await?;
        let artifacts = self.scope_artifacts(&generation, scope).await?;
        let symbol = handle.symbol.clone();
        self.run_blocking(generation, move |index, generation| {
            let derived = InheritanceEngine::new(index, generation, &token)
                .derived_types(&symbol, &artifacts)?;
            Ok(derived
                .iter()
                .map(|id| crate::features::summarize(index, generation, id))
                .collect())
        })
        .await
    }
}
