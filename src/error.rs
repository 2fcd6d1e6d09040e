use crate::chart::FlowChart;
use crate::editor::Role;
use crate::store::SessionState;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Which end of an edge a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    Source,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Source => f.write_str("source"),
            Endpoint::Target => f.write_str("target"),
        }
    }
}

/// A single structural problem found in a chart or in a patch against it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "camelCase")]
pub enum Violation {
    #[error("Node id '{id}' is used more than once")]
    DuplicateNodeId { id: String },

    #[error("Edge id '{id}' is used more than once")]
    DuplicateEdgeId { id: String },

    #[error("Edge '{edge_id}' references missing {end} node '{node_id}'")]
    DanglingEdge {
        edge_id: String,
        node_id: String,
        end: Endpoint,
    },

    #[error("Node '{id}' not found in chart")]
    UnknownNode { id: String },

    #[error("Edge '{id}' not found in chart")]
    UnknownEdge { id: String },

    #[error("Id '{id}' was already used in this editing session and cannot be reused")]
    RetiredId { id: String },

    #[error("Chart body carries id '{found}' but was submitted for '{expected}'")]
    ChartIdMismatch { expected: Uuid, found: Uuid },

    #[error("Node '{id}' has a position that is not a finite number")]
    NonFinitePosition { id: String },

    #[error("Chart is at version {version} and cannot advance further")]
    VersionExhausted { version: u64 },

    #[error("Node '{node_id}' has an unregistered type: '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    #[error("Edge '{edge_id}' uses handle '{handle}' which node '{node_id}' does not declare")]
    UnknownHandle {
        edge_id: String,
        node_id: String,
        handle: String,
    },
}

/// The outcome of validating a chart. Empty means valid.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", .violations.iter().join("; "))]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// `Ok(())` when valid, otherwise the report itself as the error.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() { Ok(()) } else { Err(self) }
    }
}

impl From<Violation> for ValidationReport {
    fn from(violation: Violation) -> Self {
        Self::new(vec![violation])
    }
}

/// Failures below the HTTP semantics: the request never produced a usable answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Server answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not encode request body: {0}")]
    Encode(String),

    #[error("Could not decode server response: {0}")]
    Decode(String),

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Errors reported by a [`FlowRepository`](crate::repository::FlowRepository).
#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    #[error("Flow chart '{id}' not found")]
    NotFound { id: Uuid },

    #[error(
        "Version conflict: expected version {expected}, but the server holds version {}",
        .current.version
    )]
    VersionConflict {
        expected: u64,
        current: Box<FlowChart>,
    },

    #[error("Server rejected the chart: {0}")]
    Validation(ValidationReport),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RepositoryError {
    /// The server's current chart when this is a version conflict.
    pub fn conflicting_chart(&self) -> Option<&FlowChart> {
        match self {
            RepositoryError::VersionConflict { current, .. } => Some(current),
            _ => None,
        }
    }
}

/// Which end of the history stack was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBoundary {
    Undo,
    Redo,
}

impl fmt::Display for HistoryBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryBoundary::Undo => f.write_str("undo"),
            HistoryBoundary::Redo => f.write_str("redo"),
        }
    }
}

/// Errors reported by the [`EditingStore`](crate::store::EditingStore).
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Editing session is {state}, operation requires a ready session")]
    NotReady { state: SessionState },

    #[error("Intent rejected: {0}")]
    Rejected(ValidationReport),

    #[error("Nothing to {0}")]
    NoOp(HistoryBoundary),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("History could not be replayed: {0}")]
    History(Violation),
}

impl StoreError {
    /// Informational errors that leave the session untouched.
    pub fn is_noop(&self) -> bool {
        matches!(self, StoreError::NoOp(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Repository(RepositoryError::VersionConflict { .. })
        )
    }
}

/// Errors reported by the [`EditorSurface`](crate::editor::EditorSurface).
#[derive(Error, Debug, Clone)]
pub enum EditorError {
    #[error("Role '{role}' may not edit, '{required}' is required")]
    Forbidden { role: Role, required: Role },

    #[error("Nodes '{source_node_id}' and '{target_node_id}' are already connected on these handles")]
    DuplicateConnection {
        source_node_id: String,
        target_node_id: String,
    },

    #[error("No chart is loaded")]
    NoChart,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Could not parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}
