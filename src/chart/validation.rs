use super::definition::{Edge, FlowChart, Node};
use crate::error::{Endpoint, ValidationReport, Violation};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

/// Checks edge-endpoint referential integrity and id uniqueness.
///
/// Pure and side-effect free. An empty report means the chart is valid.
pub fn validate(chart: &FlowChart) -> ValidationReport {
    let mut violations = Vec::new();

    violations.extend(
        chart
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .duplicates()
            .map(|id| Violation::DuplicateNodeId { id: id.to_string() }),
    );
    violations.extend(
        chart
            .edges
            .iter()
            .map(|e| e.id.as_str())
            .duplicates()
            .map(|id| Violation::DuplicateEdgeId { id: id.to_string() }),
    );

    violations.extend(
        chart
            .nodes
            .iter()
            .filter(|n| !n.position.is_finite())
            .map(|n| Violation::NonFinitePosition { id: n.id.clone() }),
    );

    let node_ids: AHashSet<&str> = chart.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &chart.edges {
        for (end, node_id) in [
            (Endpoint::Source, &edge.source_node_id),
            (Endpoint::Target, &edge.target_node_id),
        ] {
            if !node_ids.contains(node_id.as_str()) {
                violations.push(Violation::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    end,
                });
            }
        }
    }

    ValidationReport::new(violations)
}

/// Describes a registered node type and the handles it exposes.
///
/// An empty handle list leaves that side unconstrained.
#[derive(Debug, Clone, Default)]
pub struct NodeKind {
    pub name: String,
    pub source_handles: Vec<String>,
    pub target_handles: Vec<String>,
}

impl NodeKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_source_handles<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_handles = handles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_handles<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_handles = handles.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(handles: &[String], handle: Option<&str>) -> bool {
        match handle {
            Some(h) if !handles.is_empty() => handles.iter().any(|known| known == h),
            _ => true,
        }
    }
}

/// Structural validation plus an optional registry of node kinds.
///
/// With an empty registry this is exactly [`validate`]. Once kinds are
/// registered, nodes of unknown type and edges on undeclared handles are
/// reported as well.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    registry: AHashMap<String, NodeKind>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.registry.insert(kind.name.clone(), kind);
        self
    }

    /// Registers `alias` as another name for an already registered kind.
    pub fn with_alias(mut self, alias: &str, registered: &str) -> Self {
        if let Some(kind) = self.registry.get(registered).cloned() {
            self.registry.insert(
                alias.to_string(),
                NodeKind {
                    name: alias.to_string(),
                    ..kind
                },
            );
        }
        self
    }

    pub fn is_strict(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn validate(&self, chart: &FlowChart) -> ValidationReport {
        let mut report = validate(chart);
        if !self.is_strict() {
            return report;
        }

        for node in &chart.nodes {
            if !self.registry.contains_key(&node.kind) {
                report.push(Violation::UnknownNodeKind {
                    node_id: node.id.clone(),
                    kind: node.kind.clone(),
                });
            }
        }

        let nodes: AHashMap<&str, &Node> = chart.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        for edge in &chart.edges {
            self.check_handles(edge, &nodes, &mut report);
        }
        report
    }

    fn check_handles(&self, edge: &Edge, nodes: &AHashMap<&str, &Node>, report: &mut ValidationReport) {
        let ends = [
            (&edge.source_node_id, edge.source_handle.as_deref(), Endpoint::Source),
            (&edge.target_node_id, edge.target_handle.as_deref(), Endpoint::Target),
        ];
        for (node_id, handle, end) in ends {
            let Some(kind) = nodes
                .get(node_id.as_str())
                .and_then(|node| self.registry.get(&node.kind))
            else {
                continue;
            };
            let handles = match end {
                Endpoint::Source => &kind.source_handles,
                Endpoint::Target => &kind.target_handles,
            };
            if !NodeKind::accepts(handles, handle) {
                report.push(Violation::UnknownHandle {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    handle: handle.unwrap_or_default().to_string(),
                });
            }
        }
    }
}
