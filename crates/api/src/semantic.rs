use crate::error::ApiResult;
use crate::models::{
    CallGraphQuery, CallGraphResult, DerivedScope, InheritanceQuery, InheritanceTree,
    SymbolHandle, SymbolLocator, SymbolSummary,
};
use async_trait::async_trait;

/// Symbol resolution against the current generation.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    /// Resolve the symbol declared or referenced at `locator`.
    ///
    /// Fails with `NotFound` when nothing can be resolved there; the returned
    /// handle is tagged with the generation it was resolved in.
    async fn resolve_symbol(&self, locator: &SymbolLocator) -> ApiResult<SymbolHandle>;

    /// Describe a symbol. Fails with `Stale` for handles of older generations.
    async fn describe_symbol(&self, handle: &SymbolHandle) -> ApiResult<SymbolSummary>;
}

/// Call hierarchy analysis: bounded callers/callees plus local complexity.
#[async_trait]
pub trait CallGraphAnalyzer: Send + Sync {
    async fn get_call_graph(
        &self,
        symbol: &SymbolHandle,
        query: &CallGraphQuery,
    ) -> ApiResult<CallGraphResult>;
}

/// Type hierarchy analysis.
#[async_trait]
pub trait InheritanceAnalyzer: Send + Sync {
    async fn get_inheritance_tree(
        &self,
        ty: &SymbolHandle,
        query: &InheritanceQuery,
    ) -> ApiResult<InheritanceTree>;

    /// Immediate base first.
    async fn get_base_chain(&self, ty: &SymbolHandle) -> ApiResult<Vec<SymbolSummary>>;

    /// Direct descendants of `ty` inside `scope`.
    async fn find_derived_types(
        &self,
        ty: &SymbolHandle,
        scope: &DerivedScope,
    ) -> ApiResult<Vec<SymbolSummary>>;
}
