use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a flow chart. Immutable after creation.
pub type ChartId = Uuid;
/// Identifier of a node, unique within its chart.
pub type NodeId = String;
/// Identifier of an edge, unique within its chart.
pub type EdgeId = String;

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// JSON cannot carry NaN or infinities.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single vertex of the flow chart.
///
/// `kind` is the polymorphic tag (`"type"` on the wire) that selects the
/// rendering and behavior variant. `data` is an opaque payload whose shape is
/// owned by that variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A directed connection between two nodes of the same chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    #[serde(alias = "source")]
    pub source_node_id: NodeId,
    #[serde(alias = "target")]
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        source_node_id: impl Into<NodeId>,
        target_node_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_node_id: source_node_id.into(),
            target_node_id: target_node_id.into(),
            source_handle: None,
            target_handle: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_handles(
        mut self,
        source_handle: Option<String>,
        target_handle: Option<String>,
    ) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Returns `true` if either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }

    /// Two edges connect the same ports, regardless of their ids.
    pub fn same_connection(&self, other: &Edge) -> bool {
        self.source_node_id == other.source_node_id
            && self.target_node_id == other.target_node_id
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}

/// The versioned graph document and aggregate root of the crate.
///
/// `version` and `updated_at` belong to the store of record: they are only
/// ever replaced by values returned from an acknowledged save or fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowChart {
    pub id: ChartId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowChart {
    /// Creates an empty chart with a fresh id at version 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: ChartId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            version: 0,
            updated_at: Utc::now(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edge(id).is_some()
    }

    /// Compares everything except the fields assigned by the store of record.
    pub fn same_content(&self, other: &FlowChart) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && same_set(&self.nodes, &other.nodes, |n| n.id.as_str())
            && same_set(&self.edges, &other.edges, |e| e.id.as_str())
    }
}

/// Structural equality: node and edge lists compare as sets keyed by id.
impl PartialEq for FlowChart {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.updated_at == other.updated_at
            && self.same_content(other)
    }
}

fn same_set<T: PartialEq>(left: &[T], right: &[T], key: impl Fn(&T) -> &str) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let left_index: AHashMap<&str, &T> = left.iter().map(|item| (key(item), item)).collect();
    let right_index: AHashMap<&str, &T> = right.iter().map(|item| (key(item), item)).collect();
    // Duplicate ids collapse in the index; fall back to ordered comparison.
    if left_index.len() != left.len() || right_index.len() != right.len() {
        return left == right;
    }
    left_index == right_index
}
