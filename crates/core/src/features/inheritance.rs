use super::summarize;
use crate::error::{Result, StratumError};
use crate::model::Generation;
use crate::plugin::{CompiledArtifact, SemanticIndex};
use crate::runtime::ensure_active;
use indexmap::IndexSet;
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use stratum_api::{
    DerivedType, InheritanceEdge, InheritanceKind, InheritanceQuery, InheritanceTree, SymbolId,
};
use tokio_util::sync::CancellationToken;

/// One derived type found by [`InheritanceEngine::derived_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedEntry {
    pub symbol: SymbolId,
    pub depth: usize,
    pub parent: SymbolId,
}

pub struct InheritanceEngine<'a> {
    index: &'a dyn SemanticIndex,
    generation: &'a Generation,
    token: &'a CancellationToken,
}

impl<'a> InheritanceEngine<'a> {
    pub fn new(
        index: &'a dyn SemanticIndex,
        generation: &'a Generation,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            index,
            generation,
            token,
        }
    }

    /// Base types of `ty`, immediate base first.
    pub fn base_chain(&self, ty: &SymbolId) -> Result<Vec<SymbolId>> {
        let mut chain = Vec::new();
        let mut seen: HashSet<SymbolId> = HashSet::from([ty.clone()]);
        let mut current = ty.clone();
        while let Some(base) = self.index.base_type(self.generation, &current) {
            ensure_active(self.token)?;
            if !seen.insert(base.clone()) {
                break;
            }
            chain.push(base.clone());
            current = base;
        }
        Ok(chain)
    }

    /// Every contract `ty` implements, directly or through its supertypes.
    ///
    /// Also returns the declared edges walked on the way.
    pub fn implemented_contracts(
        &self,
        ty: &SymbolId,
    ) -> Result<(IndexSet<SymbolId>, IndexSet<InheritanceEdge>)> {
        let mut contracts = IndexSet::new();
        let mut edges = IndexSet::new();
        let mut visited: HashSet<SymbolId> = HashSet::from([ty.clone()]);
        let mut queue = VecDeque::from([ty.clone()]);

        while let Some(current) = queue.pop_front() {
            ensure_active(self.token)?;
            let declared = self
                .index
                .declared_supertypes(self.generation, &current)
                .unwrap_or_default();
            for supertype in declared {
                edges.insert(InheritanceEdge {
                    subtype: current.clone(),
                    supertype: supertype.symbol.clone(),
                    kind: supertype.kind,
                });
                if !visited.insert(supertype.symbol.clone()) {
                    continue;
                }
                if supertype.kind == InheritanceKind::Implements {
                    contracts.insert(supertype.symbol.clone());
                }
                queue.push_back(supertype.symbol);
            }
        }

        for contract in self
            .index
            .resolved_contracts(self.generation, ty)
            .unwrap_or_default()
        {
            if &contract != ty {
                contracts.insert(contract);
            }
        }
        Ok((contracts, edges))
    }

    /// Whether `candidate` derives from `ty` directly.
    ///
    /// Either signal is enough: `ty` appears in the declared supertype list,
    /// or the resolved type system says so. A resolved contract only counts
    /// when neither the base type nor another contract already carries it.
    pub fn is_direct_descendant(&self, candidate: &SymbolId, ty: &SymbolId) -> bool {
        if candidate == ty {
            return false;
        }
        let Some(declared) = self.index.declared_supertypes(self.generation, candidate) else {
            return false;
        };
        if declared.iter().any(|s| &s.symbol == ty) {
            return true;
        }

        let base = self.index.base_type(self.generation, candidate);
        if base.as_ref() == Some(ty) {
            return true;
        }

        let contracts = self
            .index
            .resolved_contracts(self.generation, candidate)
            .unwrap_or_default();
        if !contracts.contains(ty) {
            return false;
        }
        let carried_by_base = base.as_ref().is_some_and(|b| self.carries(b, ty));
        let carried_by_contract = contracts
            .iter()
            .filter(|c| *c != ty)
            .any(|c| self.carries(c, ty));
        !carried_by_base && !carried_by_contract
    }

    fn carries(&self, holder: &SymbolId, ty: &SymbolId) -> bool {
        self.index
            .resolved_contracts(self.generation, holder)
            .is_some_and(|contracts| contracts.contains(ty))
    }

    fn relation(&self, subtype: &SymbolId, supertype: &SymbolId) -> InheritanceKind {
        let declared = self
            .index
            .declared_supertypes(self.generation, subtype)
            .unwrap_or_default();
        if let Some(s) = declared.iter().find(|s| &s.symbol == supertype) {
            return s.kind;
        }
        if self.index.base_type(self.generation, subtype).as_ref() == Some(supertype) {
            InheritanceKind::Extends
        } else {
            InheritanceKind::Implements
        }
    }

    /// Direct descendants of `ty` among the declared types of `artifacts`.
    pub fn derived_types(
        &self,
        ty: &SymbolId,
        artifacts: &[Arc<CompiledArtifact>],
    ) -> Result<Vec<SymbolId>> {
        let candidates: IndexSet<SymbolId> = artifacts
            .iter()
            .flat_map(|artifact| self.index.declared_types(artifact))
            .collect();
        let candidates: Vec<SymbolId> = candidates.into_iter().collect();
        ensure_active(self.token)?;

        let matches = candidates
            .par_iter()
            .map(|candidate| {
                ensure_active(self.token)?;
                Ok(self
                    .is_direct_descendant(candidate, ty)
                    .then(|| candidate.clone()))
            })
            .collect::<Result<Vec<Option<SymbolId>>>>()?;
        Ok(matches.into_iter().flatten().collect())
    }

    /// Breadth-first expansion of derived types below `root`.
    ///
    /// `max_depth` levels are expanded, at least one.
    pub fn derived_tree(
        &self,
        root: &SymbolId,
        max_depth: usize,
        artifacts: &[Arc<CompiledArtifact>],
    ) -> Result<Vec<DerivedEntry>> {
        let levels = max_depth.max(1);
        let mut out = Vec::new();
        let mut visited: HashSet<SymbolId> = HashSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];

        for depth in 1..=levels {
            let mut next = Vec::new();
            for parent in &frontier {
                for derived in self.derived_types(parent, artifacts)? {
                    if visited.insert(derived.clone()) {
                        out.push(DerivedEntry {
                            symbol: derived.clone(),
                            depth,
                            parent: parent.clone(),
                        });
                        next.push(derived);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(out)
    }

    pub fn inheritance_tree(
        &self,
        ty: &SymbolId,
        query: &InheritanceQuery,
        artifacts: &[Arc<CompiledArtifact>],
    ) -> Result<InheritanceTree> {
        if self.index.symbol_info(self.generation, ty).is_none() {
            return Err(StratumError::not_found(format!("type {}", ty)));
        }

        let base_chain = self.base_chain(ty)?;
        let (contracts, mut edges) = self.implemented_contracts(ty)?;

        let mut subtype = ty;
        for base in &base_chain {
            edges.insert(InheritanceEdge {
                subtype: subtype.clone(),
                supertype: base.clone(),
                kind: InheritanceKind::Extends,
            });
            subtype = base;
        }

        let derived = if query.include_derived {
            self.derived_tree(ty, query.max_derived_depth, artifacts)?
        } else {
            Vec::new()
        };
        for entry in &derived {
            edges.insert(InheritanceEdge {
                subtype: entry.symbol.clone(),
                supertype: entry.parent.clone(),
                kind: self.relation(&entry.symbol, &entry.parent),
            });
        }

        let describe = |id: &SymbolId| summarize(self.index, self.generation, id);
        Ok(InheritanceTree {
            root: describe(ty),
            base_chain: base_chain.iter().map(describe).collect(),
            contracts: contracts.iter().map(describe).collect(),
            derived: derived
                .iter()
                .map(|entry| DerivedType {
                    symbol: describe(&entry.symbol),
                    depth: entry.depth,
                    parent: entry.parent.clone(),
                })
                .collect(),
            edges: edges.into_iter().collect(),
        })
    }
}
