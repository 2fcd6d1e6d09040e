use crate::chart::{ChartId, ChartPatch, FlowChart};
use crate::config::SaveMode;
use crate::error::RepositoryError;
use crate::repository::FlowRepository;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of an editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No chart loaded.
    #[default]
    Idle,
    /// Fetch in flight.
    Loading,
    /// Working copy available for editing.
    Ready,
    /// Save in flight.
    Saving,
    /// The last save lost a version race; waiting for the caller's decision.
    Conflict,
    /// Unrecoverable; a fresh load is required.
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Saving => "saving",
            SessionState::Conflict => "in conflict",
            SessionState::Error => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of a session, published to subscribers after every change.
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    pub state: SessionState,
    pub chart: Option<Arc<FlowChart>>,
    /// The server's chart while in [`SessionState::Conflict`].
    pub conflict: Option<Arc<FlowChart>>,
    pub dirty: bool,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Caller decision for leaving [`SessionState::Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Drop local edits and continue from the server's chart.
    Reload,
    /// Keep local edits and adopt the server's version, so the next save overwrites it.
    Overwrite,
}

/// Whether a late response was applied to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket belonged to an abandoned or replaced operation.
    Discarded,
}

/// Identifies an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub(crate) generation: u64,
    pub chart_id: ChartId,
}

impl LoadTicket {
    pub async fn submit<R: FlowRepository + ?Sized>(
        &self,
        repository: &R,
    ) -> Result<FlowChart, RepositoryError> {
        repository.fetch(self.chart_id).await
    }
}

/// Identifies an in-flight save and carries everything needed to perform it.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    pub(crate) generation: u64,
    pub chart_id: ChartId,
    pub expected_version: u64,
    pub mode: SaveMode,
    pub chart: Arc<FlowChart>,
    /// Diff against the last acknowledged chart, used in [`SaveMode::Patch`].
    pub patches: Vec<ChartPatch>,
}

impl SaveTicket {
    pub async fn submit<R: FlowRepository + ?Sized>(
        &self,
        repository: &R,
    ) -> Result<FlowChart, RepositoryError> {
        match self.mode {
            SaveMode::Replace => {
                repository
                    .save(self.chart_id, &self.chart, self.expected_version)
                    .await
            }
            SaveMode::Patch => {
                repository
                    .patch(self.chart_id, &self.patches, self.expected_version)
                    .await
            }
        }
    }
}
