use super::definition::{Edge, EdgeId, FlowChart, Node, NodeId, Position};
use crate::error::Violation;
use serde::{Deserialize, Serialize};

/// An item together with the list position it occupied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed<T> {
    pub index: usize,
    pub item: T,
}

/// A structural change to a chart.
///
/// Patches never touch `id`, `version` or `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ChartPatch {
    AddNode { node: Node },
    /// Removes the node and every edge touching it.
    RemoveNode { id: NodeId },
    MoveNode { id: NodeId, position: Position },
    UpdateNodeData { id: NodeId, data: serde_json::Value },
    AddEdge { edge: Edge },
    RemoveEdge { id: EdgeId },
    Rename { name: String },
    Describe { description: String },
    /// Re-inserts removed items at their former positions, nodes first.
    Restore {
        #[serde(default)]
        nodes: Vec<Placed<Node>>,
        #[serde(default)]
        edges: Vec<Placed<Edge>>,
    },
}

/// Result of [`apply_with_inverse`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub chart: FlowChart,
    /// Applying these to `chart` yields the original input again.
    pub inverse: Vec<ChartPatch>,
}

/// Produces a new chart reflecting `patch`; the input is left untouched.
///
/// Additive patches are applied as-is, so a duplicate id or a dangling edge
/// shows up in a subsequent [`validate`](super::validate) rather than here.
pub fn apply_patch(chart: &FlowChart, patch: &ChartPatch) -> Result<FlowChart, Violation> {
    let mut next = chart.clone();
    apply_in_place(&mut next, patch)?;
    Ok(next)
}

/// Applies a sequence of patches in order.
pub fn apply_patches(chart: &FlowChart, patches: &[ChartPatch]) -> Result<FlowChart, Violation> {
    apply_with_inverse(chart, patches).map(|applied| applied.chart)
}

/// Applies a sequence of patches and records how to undo them.
pub fn apply_with_inverse(chart: &FlowChart, patches: &[ChartPatch]) -> Result<Applied, Violation> {
    let mut next = chart.clone();
    let mut inverse = Vec::with_capacity(patches.len());
    for patch in patches {
        inverse.push(apply_in_place(&mut next, patch)?);
    }
    inverse.reverse();
    Ok(Applied {
        chart: next,
        inverse: inverse.into_iter().flatten().collect(),
    })
}

/// Mutates `chart` and returns the patches that revert the change, in application order.
fn apply_in_place(chart: &mut FlowChart, patch: &ChartPatch) -> Result<Vec<ChartPatch>, Violation> {
    match patch {
        ChartPatch::AddNode { node } => {
            chart.nodes.push(node.clone());
            Ok(vec![ChartPatch::RemoveNode { id: node.id.clone() }])
        }
        ChartPatch::RemoveNode { id } => {
            let index = node_index(chart, id)?;
            let mut removed_edges = Vec::new();
            let mut kept = Vec::with_capacity(chart.edges.len());
            for (index, edge) in std::mem::take(&mut chart.edges).into_iter().enumerate() {
                if edge.touches(id) {
                    removed_edges.push(Placed { index, item: edge });
                } else {
                    kept.push(edge);
                }
            }
            chart.edges = kept;
            let node = chart.nodes.remove(index);
            Ok(vec![ChartPatch::Restore {
                nodes: vec![Placed { index, item: node }],
                edges: removed_edges,
            }])
        }
        ChartPatch::MoveNode { id, position } => {
            let index = node_index(chart, id)?;
            let previous = std::mem::replace(&mut chart.nodes[index].position, *position);
            Ok(vec![ChartPatch::MoveNode {
                id: id.clone(),
                position: previous,
            }])
        }
        ChartPatch::UpdateNodeData { id, data } => {
            let index = node_index(chart, id)?;
            let previous = std::mem::replace(&mut chart.nodes[index].data, data.clone());
            Ok(vec![ChartPatch::UpdateNodeData {
                id: id.clone(),
                data: previous,
            }])
        }
        ChartPatch::AddEdge { edge } => {
            chart.edges.push(edge.clone());
            Ok(vec![ChartPatch::RemoveEdge { id: edge.id.clone() }])
        }
        ChartPatch::RemoveEdge { id } => {
            let index = chart
                .edges
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| Violation::UnknownEdge { id: id.clone() })?;
            let edge = chart.edges.remove(index);
            Ok(vec![ChartPatch::Restore {
                nodes: Vec::new(),
                edges: vec![Placed { index, item: edge }],
            }])
        }
        ChartPatch::Rename { name } => {
            let previous = std::mem::replace(&mut chart.name, name.clone());
            Ok(vec![ChartPatch::Rename { name: previous }])
        }
        ChartPatch::Describe { description } => {
            let previous = std::mem::replace(&mut chart.description, description.clone());
            Ok(vec![ChartPatch::Describe {
                description: previous,
            }])
        }
        ChartPatch::Restore { nodes, edges } => {
            let mut undo = Vec::with_capacity(nodes.len() + edges.len());
            for placed in sorted_by_index(nodes) {
                let index = placed.index.min(chart.nodes.len());
                chart.nodes.insert(index, placed.item.clone());
            }
            for placed in sorted_by_index(edges) {
                let index = placed.index.min(chart.edges.len());
                chart.edges.insert(index, placed.item.clone());
                undo.push(ChartPatch::RemoveEdge {
                    id: placed.item.id.clone(),
                });
            }
            // Edges first, otherwise the node removals would cascade into them.
            undo.extend(nodes.iter().map(|placed| ChartPatch::RemoveNode {
                id: placed.item.id.clone(),
            }));
            Ok(undo)
        }
    }
}

fn node_index(chart: &FlowChart, id: &str) -> Result<usize, Violation> {
    chart
        .nodes
        .iter()
        .position(|n| n.id == id)
        .ok_or_else(|| Violation::UnknownNode { id: id.to_string() })
}

fn sorted_by_index<T>(items: &[Placed<T>]) -> Vec<&Placed<T>> {
    let mut sorted: Vec<&Placed<T>> = items.iter().collect();
    sorted.sort_by_key(|p| p.index);
    sorted
}
