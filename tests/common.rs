//! Common test utilities for building charts and editing sessions.
use flowstate::prelude::*;
use std::sync::Arc;

#[allow(dead_code)]
pub fn node(id: &str) -> Node {
    Node::new(id, "task", Position::default())
}

#[allow(dead_code)]
pub fn edge(id: &str, source: &str, target: &str) -> Edge {
    Edge::new(id, source, target)
}

/// Creates `{nodes: [A, B], edges: [A→B]}` at the given version.
#[allow(dead_code)]
pub fn chart_ab(version: u64) -> FlowChart {
    let mut chart = FlowChart::new("A to B");
    chart.version = version;
    chart.nodes = vec![node("A"), node("B")];
    chart.edges = vec![edge("A-B", "A", "B")];
    chart
}

/// A diamond with a decision in the middle, used where handles matter.
#[allow(dead_code)]
pub fn chart_decision() -> FlowChart {
    let mut chart = FlowChart::new("Decision");
    chart.version = 1;
    chart.nodes = vec![
        Node::new("start", "start", Position::new(0.0, 0.0)),
        Node::new("check", "decision", Position::new(0.0, 100.0))
            .with_data(serde_json::json!({"question": "Approved?"})),
        Node::new("yes", "end", Position::new(-100.0, 200.0)),
        Node::new("no", "end", Position::new(100.0, 200.0)),
    ];
    chart.edges = vec![
        edge("start-check", "start", "check"),
        edge("check-yes", "check", "yes").with_handles(Some("yes".into()), None),
        edge("check-no", "check", "no").with_handles(Some("no".into()), None),
    ];
    chart
}

/// A validator knowing the node kinds of [`chart_decision`].
#[allow(dead_code)]
pub fn decision_validator() -> Validator {
    Validator::new()
        .with_kind(NodeKind::new("start"))
        .with_kind(NodeKind::new("decision").with_source_handles(["yes", "no"]))
        .with_kind(NodeKind::new("end"))
        .with_kind(NodeKind::new("task"))
}

/// A store of record already holding `chart`.
#[allow(dead_code)]
pub async fn seeded(chart: FlowChart) -> Arc<MemoryStore> {
    let repository = Arc::new(MemoryStore::new());
    repository.insert(chart).await;
    repository
}

/// An editing session that has loaded `id` from `repository`.
#[allow(dead_code)]
pub async fn session(repository: &Arc<MemoryStore>, id: ChartId) -> EditingStore<MemoryStore> {
    let mut store = EditingStore::new(Arc::clone(repository));
    store.load(id).await.expect("Failed to load chart");
    store
}
