//! The editor surface contract: gestures in, intents out.
//!
//! The surface never touches the working copy. It reads the session through
//! the store's [`StoreView`] channel and hands every change to
//! [`EditingStore::dispatch`] as an [`Intent`].

use crate::chart::{Edge, EdgeId, FlowChart, Node, NodeId, Position};
use crate::error::EditorError;
use crate::repository::FlowRepository;
use crate::store::{EditingStore, Intent, StoreView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Ordinal access level. Only the comparison is used here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Creator,
    Owner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => f.write_str("reader"),
            Role::Creator => f.write_str("creator"),
            Role::Owner => f.write_str("owner"),
        }
    }
}

/// A raw interaction on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "camelCase")]
pub enum Gesture {
    /// A node of `kind` dropped from the palette.
    DropNode {
        kind: String,
        at: Position,
        #[serde(default)]
        data: serde_json::Value,
    },
    DragEnd { node: NodeId, to: Position },
    Connect {
        from: NodeId,
        #[serde(default)]
        from_handle: Option<String>,
        to: NodeId,
        #[serde(default)]
        to_handle: Option<String>,
    },
    EditNodeData { node: NodeId, data: serde_json::Value },
    DeleteSelection {
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        edges: Vec<EdgeId>,
    },
    RenameChart { name: String },
}

/// Translates gestures for one user of one editing session.
pub struct EditorSurface {
    role: Role,
    required: Role,
    view: watch::Receiver<StoreView>,
}

impl EditorSurface {
    /// Attaches a surface to `store`. Editing requires [`Role::Creator`] unless
    /// changed with [`with_required_role`](Self::with_required_role).
    pub fn new<R: FlowRepository + ?Sized>(store: &EditingStore<R>, role: Role) -> Self {
        Self {
            role,
            required: Role::Creator,
            view: store.subscribe(),
        }
    }

    pub fn with_required_role(mut self, required: Role) -> Self {
        self.required = required;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn can_edit(&self) -> bool {
        self.role >= self.required
    }

    /// Latest published session snapshot.
    pub fn view(&self) -> StoreView {
        self.view.borrow().clone()
    }

    /// The chart currently shown on the canvas.
    pub fn canvas(&self) -> Option<Arc<FlowChart>> {
        self.view.borrow().chart.clone()
    }

    fn authorize(&self) -> Result<(), EditorError> {
        if self.can_edit() {
            Ok(())
        } else {
            Err(EditorError::Forbidden {
                role: self.role,
                required: self.required,
            })
        }
    }

    /// Turns `gesture` into the intent the store should receive.
    ///
    /// New nodes and edges get fresh UUID ids. Connecting two nodes that are
    /// already connected on the same handles is refused.
    pub fn translate(&self, gesture: Gesture) -> Result<Intent, EditorError> {
        self.authorize()?;
        let intent = match gesture {
            Gesture::DropNode { kind, at, data } => Intent::AddNode {
                node: Node::new(Uuid::new_v4().to_string(), kind, at).with_data(data),
            },
            Gesture::DragEnd { node, to } => Intent::MoveNode {
                id: node,
                position: to,
            },
            Gesture::Connect {
                from,
                from_handle,
                to,
                to_handle,
            } => {
                let chart = self.canvas().ok_or(EditorError::NoChart)?;
                let edge = Edge::new(Uuid::new_v4().to_string(), from, to)
                    .with_handles(from_handle, to_handle);
                if chart.edges.iter().any(|e| e.same_connection(&edge)) {
                    return Err(EditorError::DuplicateConnection {
                        source_node_id: edge.source_node_id,
                        target_node_id: edge.target_node_id,
                    });
                }
                Intent::AddEdge { edge }
            }
            Gesture::EditNodeData { node, data } => Intent::UpdateNodeData { id: node, data },
            Gesture::DeleteSelection { nodes, edges } => Intent::DeleteSelection { nodes, edges },
            Gesture::RenameChart { name } => Intent::RenameChart { name },
        };
        Ok(intent)
    }

    /// Translates `gesture` and dispatches it to `store`.
    pub fn apply<R: FlowRepository + ?Sized>(
        &self,
        store: &mut EditingStore<R>,
        gesture: Gesture,
    ) -> Result<Arc<FlowChart>, EditorError> {
        let intent = self.translate(gesture)?;
        Ok(store.dispatch(intent)?)
    }

    pub fn undo<R: FlowRepository + ?Sized>(
        &self,
        store: &mut EditingStore<R>,
    ) -> Result<Arc<FlowChart>, EditorError> {
        self.authorize()?;
        Ok(store.undo()?)
    }

    pub fn redo<R: FlowRepository + ?Sized>(
        &self,
        store: &mut EditingStore<R>,
    ) -> Result<Arc<FlowChart>, EditorError> {
        self.authorize()?;
        Ok(store.redo()?)
    }
}
