//! Bounded caller/callee traversal.
//!
//! Both directions are breadth-first with one visited set per traversal,
//! seeded with the root, so a symbol is reported at most once and the root
//! never shows up in its own results even through recursion.

use super::{cyclomatic_complexity, summarize};
use crate::error::{Result, StratumError};
use crate::model::{Generation, SyntaxNode};
use crate::plugin::SemanticIndex;
use crate::runtime::ensure_active;
use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};
use stratum_api::{
    CallEdge, CallGraphMetrics, CallGraphNode, CallGraphQuery, CallGraphResult, SymbolId,
};
use tokio_util::sync::CancellationToken;

/// Nodes and edges discovered by one traversal, in discovery order.
#[derive(Debug, Default)]
pub struct Traversal {
    pub nodes: Vec<CallGraphNode>,
    pub edges: IndexSet<CallEdge>,
}

pub struct CallGraphEngine<'a> {
    index: &'a dyn SemanticIndex,
    generation: &'a Generation,
    token: &'a CancellationToken,
}

impl<'a> CallGraphEngine<'a> {
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

    /// Transitive callers of `root`, at most `max_depth` hops away.
    pub fn callers(&self, root: &SymbolId, max_depth: usize) -> Result<Traversal> {
        let mut out = Traversal::default();
        let mut visited: HashSet<SymbolId> = HashSet::from([root.clone()]);
        let mut queue = VecDeque::from([(root.clone(), 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            ensure_active(self.token)?;
            if depth >= max_depth {
                continue;
            }
            for site in self.index.callers(self.generation, &current) {
                if site.caller == current || &site.caller == root {
                    continue;
                }
                out.edges.insert(CallEdge {
                    caller: site.caller.clone(),
                    callee: current.clone(),
                    location: site.location,
                    expression: site.expression,
                });
                if visited.insert(site.caller.clone()) {
                    out.nodes.push(CallGraphNode {
                        symbol: summarize(self.index, self.generation, &site.caller),
                        depth: depth + 1,
                        external: false,
                    });
                    queue.push_back((site.caller, depth + 1));
                }
            }
        }
        Ok(out)
    }

    /// Transitive callees of `root`, at most `max_depth` hops away.
    ///
    /// A callee without a body in the index is reported as external and not
    /// expanded further.
    pub fn callees(&self, root: &SymbolId, max_depth: usize) -> Result<Traversal> {
        let mut out = Traversal::default();
        let Some(root_body) = self.index.body(self.generation, root) else {
            return Ok(out);
        };
        let mut visited: HashSet<SymbolId> = HashSet::from([root.clone()]);
        let mut queue: VecDeque<(SymbolId, usize, SyntaxNode)> =
            VecDeque::from([(root.clone(), 0usize, root_body)]);

        while let Some((current, depth, body)) = queue.pop_front() {
            ensure_active(self.token)?;
            if depth >= max_depth {
                continue;
            }
            for node in body.descendants().filter(|n| n.kind.is_call_form()) {
                let Some(target) = &node.target else {
                    continue;
                };
                if *target == current || target == root {
                    continue;
                }
                out.edges.insert(CallEdge {
                    caller: current.clone(),
                    callee: target.clone(),
                    location: node.location.clone(),
                    expression: node.text.clone().unwrap_or_default(),
                });
                if !visited.insert(target.clone()) {
                    continue;
                }
                let target_body = self.index.body(self.generation, target);
                out.nodes.push(CallGraphNode {
                    symbol: summarize(self.index, self.generation, target),
                    depth: depth + 1,
                    external: target_body.is_none(),
                });
                if let Some(target_body) = target_body {
                    queue.push_back((target.clone(), depth + 1, target_body));
                }
            }
        }
        Ok(out)
    }

    pub fn call_graph(&self, root: &SymbolId, query: &CallGraphQuery) -> Result<CallGraphResult> {
        let Some(info) = self.index.symbol_info(self.generation, root) else {
            return Err(StratumError::not_found(format!("symbol {}", root)));
        };
        let root_summary = summarize(self.index, self.generation, &info.id);

        let callers = if query.direction.includes_callers() {
            self.callers(root, query.max_depth)?
        } else {
            Traversal::default()
        };

        let mut callees = if query.direction.includes_callees() {
            self.callees(root, query.max_depth)?
        } else {
            Traversal::default()
        };
        if !query.include_external {
            let external: HashSet<SymbolId> = callees
                .nodes
                .iter()
                .filter(|n| n.external)
                .map(|n| n.symbol.handle.symbol.clone())
                .collect();
            callees.nodes.retain(|n| !n.external);
            callees.edges.retain(|e| !external.contains(&e.callee));
        }

        let body = self.index.body(self.generation, root);
        let metrics = CallGraphMetrics {
            total_callers: callers.nodes.len(),
            total_callees: callees.nodes.len(),
            cyclomatic_complexity: cyclomatic_complexity(body.as_ref()),
        };

        let mut edges = callers.edges;
        edges.extend(callees.edges);

        Ok(CallGraphResult {
            root: root_summary,
            callers: callers.nodes,
            callees: callees.nodes,
            edges: edges.into_iter().collect(),
            metrics,
        })
    }
}
