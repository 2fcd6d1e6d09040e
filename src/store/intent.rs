use crate::chart::{ChartPatch, Edge, EdgeId, FlowChart, Node, NodeId, Position};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A named mutation request dispatched to the editing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    AddNode { node: Node },
    MoveNode { id: NodeId, position: Position },
    UpdateNodeData { id: NodeId, data: serde_json::Value },
    DeleteNode { id: NodeId },
    AddEdge { edge: Edge },
    DeleteEdge { id: EdgeId },
    /// Deletes several nodes and edges as one undoable step.
    DeleteSelection {
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        edges: Vec<EdgeId>,
    },
    RenameChart { name: String },
    DescribeChart { description: String },
}

impl Intent {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::AddNode { .. } => "addNode",
            Intent::MoveNode { .. } => "moveNode",
            Intent::UpdateNodeData { .. } => "updateNodeData",
            Intent::DeleteNode { .. } => "deleteNode",
            Intent::AddEdge { .. } => "addEdge",
            Intent::DeleteEdge { .. } => "deleteEdge",
            Intent::DeleteSelection { .. } => "deleteSelection",
            Intent::RenameChart { .. } => "renameChart",
            Intent::DescribeChart { .. } => "describeChart",
        }
    }

    /// Expands the intent into the patches that implement it against `chart`.
    pub fn into_patches(self, chart: &FlowChart) -> Vec<ChartPatch> {
        match self {
            Intent::AddNode { node } => vec![ChartPatch::AddNode { node }],
            Intent::MoveNode { id, position } => vec![ChartPatch::MoveNode { id, position }],
            Intent::UpdateNodeData { id, data } => vec![ChartPatch::UpdateNodeData { id, data }],
            Intent::DeleteNode { id } => vec![ChartPatch::RemoveNode { id }],
            Intent::AddEdge { edge } => vec![ChartPatch::AddEdge { edge }],
            Intent::DeleteEdge { id } => vec![ChartPatch::RemoveEdge { id }],
            Intent::DeleteSelection { nodes, edges } => {
                let nodes: Vec<NodeId> = nodes.into_iter().unique().collect();
                // Edges attached to a selected node go away with the node.
                let edges = edges.into_iter().unique().filter(|id| {
                    chart
                        .edge(id)
                        .is_none_or(|edge| !nodes.iter().any(|n| edge.touches(n)))
                });
                edges
                    .map(|id| ChartPatch::RemoveEdge { id })
                    .chain(nodes.iter().cloned().map(|id| ChartPatch::RemoveNode { id }))
                    .collect()
            }
            Intent::RenameChart { name } => vec![ChartPatch::Rename { name }],
            Intent::DescribeChart { description } => vec![ChartPatch::Describe { description }],
        }
    }
}
