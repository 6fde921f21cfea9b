use super::EngineHandle;
use async_trait::async_trait;
use stratum_api::{
    ApiError, ApiResult, CallGraphAnalyzer, CallGraphQuery, CallGraphResult, DerivedScope,
    InheritanceAnalyzer, InheritanceQuery, InheritanceTree, SymbolHandle, SymbolLocator,
    SymbolResolver, SymbolSummary,
};
use tokio_util::sync::CancellationToken;

// Each trait method owns a fresh token whose drop guard lives in the
// caller's future: dropping the future cancels the blocking traversal.

#[async_trait]
impl SymbolResolver for EngineHandle {
    async fn resolve_symbol(&self, locator: &SymbolLocator) -> ApiResult<SymbolHandle> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.resolve_symbol_with_token(locator, token)
            .await
            .map_err(ApiError::from)
    }

    async fn describe_symbol(&self, handle: &SymbolHandle) -> ApiResult<SymbolSummary> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.describe_symbol_with_token(handle, token)
            .await
            .map_err(ApiError::from)
    }
}

#[async_trait]
impl CallGraphAnalyzer for EngineHandle {
    async fn get_call_graph(
        &self,
        symbol: &SymbolHandle,
        query: &CallGraphQuery,
    ) -> ApiResult<CallGraphResult> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.call_graph_with_token(symbol, query, token)
            .await
            .map_err(ApiError::from)
    }
}

#[async_trait]
impl InheritanceAnalyzer for EngineHandle {
    async fn get_inheritance_tree(
        &self,
        ty: &SymbolHandle,
        query: &InheritanceQuery,
    ) -> ApiResult<InheritanceTree> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.inheritance_tree_with_token(ty, query, token)
            .await
            .map_err(ApiError::from)
    }

    async fn get_base_chain(&self, ty: &SymbolHandle) -> ApiResult<Vec<SymbolSummary>> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.base_chain_with_token(ty, token)
            .await
            .map_err(ApiError::from)
    }

    async fn find_derived_types(
        &self,
        ty: &SymbolHandle,
        scope: &DerivedScope,
    ) -> ApiResult<Vec<SymbolSummary>> {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        self.derived_types_with_token(ty, scope, token)
            .await
            .map_err(ApiError::from)
    }
}
