use super::symbol::{SymbolId, SymbolSummary};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InheritanceKind {
    Extends,
    Implements,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct InheritanceEdge {
    pub subtype: SymbolId,
    pub supertype: SymbolId,
    pub kind: InheritanceKind,
}

/// Where derived-type discovery looks for candidates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DerivedScope {
    #[default]
    Workspace,
    /// Only the project with this id (see `ProjectInfo::id`).
    Project(u64),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct InheritanceQuery {
    #[serde(default = "default_include_derived")]
    pub include_derived: bool,
    /// Derived-type expansion depth. `0` and `1` both mean direct descendants only.
    #[serde(default)]
    pub max_derived_depth: usize,
    #[serde(default)]
    pub scope: DerivedScope,
}

fn default_include_derived() -> bool {
    true
}

impl Default for InheritanceQuery {
    fn default() -> Self {
        Self {
            include_derived: default_include_derived(),
            max_derived_depth: 0,
            scope: DerivedScope::Workspace,
        }
    }
}

impl InheritanceQuery {
    pub fn derived(max_derived_depth: usize) -> Self {
        Self {
            include_derived: true,
            max_derived_depth,
            scope: DerivedScope::Workspace,
        }
    }

    pub fn without_derived() -> Self {
        Self {
            include_derived: false,
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct DerivedType {
    pub symbol: SymbolSummary,
    /// 1 for direct descendants of the root.
    pub depth: usize,
    /// The type this one was found deriving from.
    pub parent: SymbolId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct InheritanceTree {
    pub root: SymbolSummary,
    /// Immediate base first, walking towards the root of the type system.
    pub base_chain: Vec<SymbolSummary>,
    pub contracts: Vec<SymbolSummary>,
    pub derived: Vec<DerivedType>,
    pub edges: Vec<InheritanceEdge>,
}
