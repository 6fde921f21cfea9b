use crate::model::Generation;
use crate::plugin::SemanticIndex;
use stratum_api::{SymbolId, SymbolKind, SymbolSummary};

pub mod call_graph;
pub mod complexity;
pub mod inheritance;

pub use call_graph::{CallGraphEngine, Traversal};
pub use complexity::cyclomatic_complexity;
pub use inheritance::{DerivedEntry, InheritanceEngine};

/// Describe `symbol` for a result, falling back to its id when the index
/// has no information.
pub(crate) fn summarize(
    index: &dyn SemanticIndex,
    generation: &Generation,
    symbol: &SymbolId,
) -> SymbolSummary {
    match index.symbol_info(generation, symbol) {
        Some(info) => SymbolSummary {
            handle: generation.handle(info.id),
            name: info.name,
            kind: info.kind,
            container: info.container,
            location: info.location,
        },
        None => SymbolSummary {
            handle: generation.handle(symbol.clone()),
            name: symbol.to_string(),
            kind: SymbolKind::Unknown,
            container: None,
            location: None,
        },
    }
}
