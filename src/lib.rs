//! # Flowstate - Versioned Flow-Chart Editing Core
//!
//! **Flowstate** keeps a graph-structured flow chart consistent between the
//! surfaces that edit it and the remote store of record that versions it.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: An [`EditingStore`](store::EditingStore) fetches a chart through a
//!     [`FlowRepository`](repository::FlowRepository) and seeds a working copy.
//! 2.  **Edit**: An [`EditorSurface`](editor::EditorSurface) turns canvas gestures into
//!     intents. The store applies each intent as a patch, re-validates the chart and
//!     records the inverse for undo.
//! 3.  **Save**: The store submits the working copy, or its diff against the last
//!     acknowledged chart, together with the version it was based on. The store of
//!     record assigns the next version; a stale version is reported as a conflict
//!     instead of overwriting someone else's work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowstate::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let repository = Arc::new(MemoryStore::new());
//! let chart = repository.create("Onboarding").await;
//!
//! let mut store = EditingStore::new(Arc::clone(&repository));
//! store.load(chart.id).await?;
//!
//! let editor = EditorSurface::new(&store, Role::Creator);
//! editor.apply(
//!     &mut store,
//!     Gesture::DropNode {
//!         kind: "start".to_string(),
//!         at: Position::new(0.0, 0.0),
//!         data: serde_json::Value::Null,
//!     },
//! )?;
//!
//! let saved = store.save().await?;
//! println!("Saved '{}' as version {}", saved.name, saved.version);
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod config;
pub mod editor;
pub mod error;
pub mod prelude;
pub mod repository;
pub mod store;
