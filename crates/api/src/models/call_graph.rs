use super::symbol::{Location, SymbolId, SymbolSummary};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, JsonSchema)]
pub enum CallDirection {
    #[default]
    Both,
    /// Callers of the symbol.
    In,
    /// Callees of the symbol.
    Out,
}

impl CallDirection {
    pub fn includes_callers(&self) -> bool {
        matches!(self, CallDirection::Both | CallDirection::In)
    }

    pub fn includes_callees(&self) -> bool {
        matches!(self, CallDirection::Both | CallDirection::Out)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct CallGraphQuery {
    #[serde(default)]
    pub direction: CallDirection,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Report callees that live outside the workspace (no body in the index).
    #[serde(default = "default_include_external")]
    pub include_external: bool,
}

fn default_max_depth() -> usize {
    2
}

fn default_include_external() -> bool {
    true
}

impl Default for CallGraphQuery {
    fn default() -> Self {
        Self {
            direction: CallDirection::default(),
            max_depth: default_max_depth(),
            include_external: default_include_external(),
        }
    }
}

impl CallGraphQuery {
    pub fn new(direction: CallDirection, max_depth: usize) -> Self {
        Self {
            direction,
            max_depth,
            ..Self::default()
        }
    }
}

/// One call relation with the location of the call expression.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct CallEdge {
    pub caller: SymbolId,
    pub callee: SymbolId,
    pub location: Option<Location>,
    pub expression: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct CallGraphNode {
    pub symbol: SymbolSummary,
    /// Distance from the root, starting at 1 for direct callers/callees.
    pub depth: usize,
    /// No body is available in the index; the node is never expanded.
    pub external: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct CallGraphMetrics {
    pub total_callers: usize,
    pub total_callees: usize,
    pub cyclomatic_complexity: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct CallGraphResult {
    pub root: SymbolSummary,
    pub callers: Vec<CallGraphNode>,
    pub callees: Vec<CallGraphNode>,
    pub edges: Vec<CallEdge>,
    pub metrics: CallGraphMetrics,
}

impl CallGraphResult {
    /// Call sites recorded between `caller` and `callee`.
    pub fn sites_between<'a>(
        &'a self,
        caller: &'a SymbolId,
        callee: &'a SymbolId,
    ) -> impl Iterator<Item = &'a CallEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| &e.caller == caller && &e.callee == callee)
    }
}
