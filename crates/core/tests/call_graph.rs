mod common;

use common::{MemoryIndex, calls};
use std::collections::HashSet;
use stratum_api::{CallDirection, CallGraphQuery, Location, Range, SymbolId};
use stratum_core::StratumError;
use stratum_core::features::CallGraphEngine;
use stratum_core::model::{Generation, SyntaxKind, SyntaxNode};
use tokio_util::sync::CancellationToken;

fn ids(nodes: &[stratum_api::CallGraphNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| n.symbol.handle.symbol.to_string())
        .collect()
}

#[test]
fn caller_chain_is_cut_at_max_depth() {
    // M4 -> M3 -> M2 -> M1 -> Root
    let index = MemoryIndex::new();
    index.method_calling("M:Root", &[]);
    index.method_calling("M:M1", &["M:Root"]);
    index.method_calling("M:M2", &["M:M1"]);
    index.method_calling("M:M3", &["M:M2"]);
    index.method_calling("M:M4", &["M:M3"]);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);
    let root = SymbolId::from("M:Root");

    for (depth, expected) in [(0, 0), (1, 1), (2, 2), (4, 4), (10, 4)] {
        let found = engine.callers(&root, depth).unwrap();
        assert_eq!(found.nodes.len(), expected, "depth {depth}");
    }

    let two = engine.callers(&root, 2).unwrap();
    assert_eq!(ids(&two.nodes), vec!["M:M1", "M:M2"]);
    assert_eq!(two.nodes[1].depth, 2);
}

#[test]
fn mutual_recursion_reports_each_partner_once() {
    let index = MemoryIndex::new();
    index.method_calling("M:M1", &["M:M2"]);
    index.method_calling("M:M2", &["M:M1"]);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);

    let result = engine
        .call_graph(&SymbolId::from("M:M1"), &CallGraphQuery::new(CallDirection::Both, 2))
        .unwrap();

    assert_eq!(ids(&result.callers), vec!["M:M2"]);
    assert_eq!(ids(&result.callees), vec!["M:M2"]);
    assert_eq!(result.metrics.total_callers, 1);
    assert_eq!(result.metrics.total_callees, 1);
}

#[test]
fn recursive_symbol_never_appears_in_its_own_results() {
    let index = MemoryIndex::new();
    index.method_calling("M:Fact", &["M:Fact", "M:Helper"]);
    index.method_calling("M:Helper", &["M:Fact"]);
    index.method_calling("M:Main", &["M:Fact"]);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);
    let root = SymbolId::from("M:Fact");

    let result = engine
        .call_graph(&root, &CallGraphQuery::new(CallDirection::Both, 5))
        .unwrap();

    let all: Vec<String> = ids(&result.callers)
        .into_iter()
        .chain(ids(&result.callees))
        .collect();
    assert!(!all.contains(&"M:Fact".to_string()));
    assert!(result.edges.iter().all(|e| e.caller != e.callee));

    let callers: HashSet<String> = ids(&result.callers).into_iter().collect();
    assert_eq!(callers, HashSet::from(["M:Helper".to_string(), "M:Main".to_string()]));
}

#[test]
fn cycles_visit_each_symbol_once() {
    // A -> B -> C -> A and B -> D -> B
    let index = MemoryIndex::new();
    index.method_calling("M:A", &["M:B"]);
    index.method_calling("M:B", &["M:C", "M:D"]);
    index.method_calling("M:C", &["M:A"]);
    index.method_calling("M:D", &["M:B"]);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);

    let callees = engine.callees(&SymbolId::from("M:A"), 50).unwrap();
    assert_eq!(ids(&callees.nodes), vec!["M:B", "M:C", "M:D"]);

    let callers = engine.callers(&SymbolId::from("M:B"), 50).unwrap();
    let found: HashSet<String> = ids(&callers.nodes).into_iter().collect();
    assert_eq!(found.len(), callers.nodes.len());
    assert_eq!(
        found,
        HashSet::from(["M:A".to_string(), "M:C".to_string(), "M:D".to_string()])
    );
}

#[test]
fn callees_without_body_are_external_terminals() {
    let index = MemoryIndex::new();
    index.method_calling("M:Run", &["M:Console.WriteLine", "M:Local"]);
    index.method_calling("M:Local", &["M:Deeper"]);
    index.method_calling("M:Deeper", &[]);
    index.method("M:Console.WriteLine", None);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);
    let root = SymbolId::from("M:Run");

    let with_external = engine
        .call_graph(&root, &CallGraphQuery::new(CallDirection::Out, 3))
        .unwrap();
    assert_eq!(
        ids(&with_external.callees),
        vec!["M:Console.WriteLine", "M:Local", "M:Deeper"]
    );
    assert!(with_external.callees[0].external);
    assert!(!with_external.callees[1].external);

    let mut query = CallGraphQuery::new(CallDirection::Out, 3);
    query.include_external = false;
    let internal_only = engine.call_graph(&root, &query).unwrap();
    assert_eq!(ids(&internal_only.callees), vec!["M:Local", "M:Deeper"]);
    assert!(
        internal_only
            .edges
            .iter()
            .all(|e| e.callee.as_str() != "M:Console.WriteLine")
    );
}

#[test]
fn call_forms_beyond_invocation_are_followed() {
    let index = MemoryIndex::new();
    let body = SyntaxNode::new(SyntaxKind::Block).with_children([
        SyntaxNode::call(SyntaxKind::ObjectCreation, "M:Order..ctor", "new Order()"),
        SyntaxNode::call(SyntaxKind::PropertyAccess, "M:Order.get_Total", "order.Total"),
        SyntaxNode::call(SyntaxKind::EventSubscribe, "M:Bus.add_Sent", "bus.Sent += h"),
        SyntaxNode::call(SyntaxKind::EventUnsubscribe, "M:Bus.remove_Sent", "bus.Sent -= h"),
        SyntaxNode::call(SyntaxKind::ConstructorInitializer, "M:Base..ctor", "base()"),
        // Unresolved call: no target, nothing to report.
        SyntaxNode::new(SyntaxKind::Invocation),
    ]);
    index.method("M:Checkout", Some(body));

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);

    let callees = engine.callees(&SymbolId::from("M:Checkout"), 1).unwrap();
    assert_eq!(callees.nodes.len(), 5);
    assert!(callees.nodes.iter().all(|n| n.external));
    let expressions: Vec<&str> = callees.edges.iter().map(|e| e.expression.as_str()).collect();
    assert!(expressions.contains(&"bus.Sent += h"));
}

#[test]
fn duplicate_call_sites_collapse() {
    let site = || {
        SyntaxNode::call(SyntaxKind::Invocation, "M:Log", "Log()").with_location(Location::new(
            "/src/A.cs",
            Range::new(3, 4, 3, 9),
        ))
    };
    let index = MemoryIndex::new();
    index.method(
        "M:A",
        Some(SyntaxNode::new(SyntaxKind::Block).with_children([site(), site()])),
    );
    index.method_calling("M:Log", &[]);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);
    let result = engine
        .call_graph(&SymbolId::from("M:A"), &CallGraphQuery::new(CallDirection::Out, 1))
        .unwrap();

    let a = SymbolId::from("M:A");
    let log = SymbolId::from("M:Log");
    assert_eq!(result.sites_between(&a, &log).count(), 1);
}

#[test]
fn complexity_is_reported_for_root_body() {
    let index = MemoryIndex::new();
    let switch = SyntaxNode::new(SyntaxKind::Switch).with_children([
        SyntaxNode::new(SyntaxKind::CaseLabel),
        SyntaxNode::new(SyntaxKind::CaseLabel),
        SyntaxNode::new(SyntaxKind::CaseLabel),
        SyntaxNode::new(SyntaxKind::DefaultLabel),
    ]);
    index.method(
        "M:Branchy",
        Some(SyntaxNode::new(SyntaxKind::Block).with_children([
            SyntaxNode::new(SyntaxKind::If),
            switch,
        ])),
    );
    index.method("M:Extern", None);

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);

    let branchy = engine
        .call_graph(&SymbolId::from("M:Branchy"), &CallGraphQuery::default())
        .unwrap();
    assert_eq!(branchy.metrics.cyclomatic_complexity, 5);

    let external = engine
        .call_graph(&SymbolId::from("M:Extern"), &CallGraphQuery::default())
        .unwrap();
    assert_eq!(external.metrics.cyclomatic_complexity, 1);
    assert!(external.callees.is_empty());
}

#[test]
fn unknown_root_is_not_found_and_cancellation_stops_traversal() {
    let index = MemoryIndex::new();
    index.method("M:Known", Some(calls(&[])));

    let generation = Generation::empty();
    let token = CancellationToken::new();
    let engine = CallGraphEngine::new(index.as_ref(), &generation, &token);
    assert!(matches!(
        engine.call_graph(&SymbolId::from("M:Missing"), &CallGraphQuery::default()),
        Err(StratumError::NotFound { .. })
    ));

    token.cancel();
    assert!(matches!(
        engine.callers(&SymbolId::from("M:Known"), 3),
        Err(StratumError::Cancelled)
    ));
}
