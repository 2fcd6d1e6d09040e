//! Prelude module for convenient imports
//!
//! This module re-exports the types needed to run an editing session. Import
//! it to get the model, the store, the editor surface and the repositories
//! without importing each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowstate::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run_example() -> Result<()> {
//! let config = FlowConfig::from_env()?;
//! let repository = Arc::new(HttpFlowRepository::with_config(
//!     MemoryStore::new(),
//!     config.client.clone(),
//! ));
//! let mut store = EditingStore::with_config(repository, config.store);
//! # let id = uuid::Uuid::new_v4();
//! store.load(id).await?;
//! store.dispatch(Intent::RenameChart { name: "Renamed".to_string() })?;
//! store.save().await?;
//! # Ok(())
//! # }
//! ```

// Model
pub use crate::chart::{
    ChartId, ChartPatch, Edge, EdgeId, FlowChart, Node, NodeId, NodeKind, Position, Validator,
    apply_patch, apply_patches, diff, validate,
};

// Editing session
pub use crate::editor::{EditorSurface, Gesture, Role};
pub use crate::store::{EditingStore, Intent, Resolution, SessionState, StoreView};

// Store of record
pub use crate::repository::{FlowRepository, HttpClient, HttpFlowRepository, MemoryStore};

// Configuration
pub use crate::config::{FlowConfig, SaveMode};

// Error types
pub use crate::error::{
    EditorError, RepositoryError, StoreError, TransportError, ValidationReport, Violation,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
