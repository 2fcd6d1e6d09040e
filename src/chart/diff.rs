use super::definition::{Edge, FlowChart, Node};
use super::patch::ChartPatch;
use ahash::{AHashMap, AHashSet};

/// Computes the patches that turn `base` into a chart with the content of `target`.
///
/// Removals come first (edges, then nodes), followed by updates and
/// additions, so the sequence applies cleanly against `base`. A node whose
/// type changed is replaced, which also replaces the edges attached to it.
pub fn diff(base: &FlowChart, target: &FlowChart) -> Vec<ChartPatch> {
    let mut patches = Vec::new();

    if base.name != target.name {
        patches.push(ChartPatch::Rename {
            name: target.name.clone(),
        });
    }
    if base.description != target.description {
        patches.push(ChartPatch::Describe {
            description: target.description.clone(),
        });
    }

    let base_nodes: AHashMap<&str, &Node> = base.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let target_nodes: AHashMap<&str, &Node> =
        target.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let base_edges: AHashMap<&str, &Edge> = base.edges.iter().map(|e| (e.id.as_str(), e)).collect();

    let replaced: AHashSet<&str> = base
        .nodes
        .iter()
        .filter(|n| {
            target_nodes
                .get(n.id.as_str())
                .is_some_and(|t| t.kind != n.kind)
        })
        .map(|n| n.id.as_str())
        .collect();
    let touches_replaced = |edge: &Edge| {
        replaced.contains(edge.source_node_id.as_str()) || replaced.contains(edge.target_node_id.as_str())
    };

    let target_edges: AHashMap<&str, &Edge> =
        target.edges.iter().map(|e| (e.id.as_str(), e)).collect();
    for edge in &base.edges {
        let unchanged = target_edges.get(edge.id.as_str()) == Some(&edge) && !touches_replaced(edge);
        if !unchanged {
            patches.push(ChartPatch::RemoveEdge { id: edge.id.clone() });
        }
    }

    for node in &base.nodes {
        if !target_nodes.contains_key(node.id.as_str()) || replaced.contains(node.id.as_str()) {
            patches.push(ChartPatch::RemoveNode { id: node.id.clone() });
        }
    }

    for node in &target.nodes {
        match base_nodes.get(node.id.as_str()) {
            Some(existing) if !replaced.contains(node.id.as_str()) => {
                if existing.position != node.position {
                    patches.push(ChartPatch::MoveNode {
                        id: node.id.clone(),
                        position: node.position,
                    });
                }
                if existing.data != node.data {
                    patches.push(ChartPatch::UpdateNodeData {
                        id: node.id.clone(),
                        data: node.data.clone(),
                    });
                }
            }
            _ => patches.push(ChartPatch::AddNode { node: node.clone() }),
        }
    }

    for edge in &target.edges {
        let kept = base_edges.get(edge.id.as_str()) == Some(&edge) && !touches_replaced(edge);
        if !kept {
            patches.push(ChartPatch::AddEdge { edge: edge.clone() });
        }
    }

    patches
}
