//! The editing store: single source of truth for one edit session.
//!
//! All mutations go through [`EditingStore::dispatch`], which expands an
//! [`Intent`] into patches, applies them to a fresh working copy, re-validates
//! and records the inverse for undo. `load` and `save` are the only
//! suspending operations. While one is in flight the store rejects every
//! other operation with [`StoreError::NotReady`] instead of queueing it.
//!
//! Both suspending operations come in two forms: the convenient `async`
//! methods, and a `begin_*`/`finish_*` pair for callers that need to abandon
//! a request. Every `begin_*` hands out a ticket stamped with the session
//! generation; a response presented with an outdated ticket is discarded.

use crate::chart::{
    ChartId, ChartPatch, EdgeId, FlowChart, NodeId, Validator, apply_patches, apply_with_inverse,
    diff,
};
use crate::config::{SaveMode, StoreConfig};
use crate::error::{HistoryBoundary, RepositoryError, StoreError, ValidationReport, Violation};
use crate::repository::FlowRepository;
use ahash::AHashSet;
use std::sync::Arc;
use tokio::sync::watch;

mod history;
mod intent;
mod state;

use history::{History, Step};

pub use intent::Intent;
pub use state::{Completion, LoadTicket, Resolution, SaveTicket, SessionState, StoreView};

pub struct EditingStore<R: ?Sized> {
    repository: Arc<R>,
    config: StoreConfig,
    validator: Validator,
    state: SessionState,
    generation: u64,
    working: Option<Arc<FlowChart>>,
    /// Last chart acknowledged by the store of record.
    base: Option<Arc<FlowChart>>,
    conflict: Option<Arc<FlowChart>>,
    history: History,
    retired_nodes: AHashSet<NodeId>,
    retired_edges: AHashSet<EdgeId>,
    last_error: Option<StoreError>,
    view: watch::Sender<StoreView>,
}

impl<R: FlowRepository + ?Sized> EditingStore<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, StoreConfig::default())
    }

    pub fn with_config(repository: Arc<R>, config: StoreConfig) -> Self {
        let (view, _) = watch::channel(StoreView::default());
        Self {
            repository,
            history: History::new(config.history_limit),
            config,
            validator: Validator::new(),
            state: SessionState::Idle,
            generation: 0,
            working: None,
            base: None,
            conflict: None,
            retired_nodes: AHashSet::new(),
            retired_edges: AHashSet::new(),
            last_error: None,
            view,
        }
    }

    /// Validates every dispatch with `validator` instead of the structural default.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repository)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The current working copy, if a chart is loaded.
    pub fn chart(&self) -> Option<Arc<FlowChart>> {
        self.working.clone()
    }

    /// The server's chart while the session is in conflict.
    pub fn conflict(&self) -> Option<Arc<FlowChart>> {
        self.conflict.clone()
    }

    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    /// `true` when the working copy differs from the last acknowledged chart.
    pub fn is_dirty(&self) -> bool {
        self.working.is_some() && self.history.is_dirty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Receives a [`StoreView`] after every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> StoreView {
        StoreView {
            state: self.state,
            chart: self.working.clone(),
            conflict: self.conflict.clone(),
            dirty: self.is_dirty(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.view());
    }

    fn ready_chart(&self) -> Result<Arc<FlowChart>, StoreError> {
        match (&self.state, &self.working) {
            (SessionState::Ready, Some(chart)) => Ok(Arc::clone(chart)),
            _ => Err(StoreError::NotReady { state: self.state }),
        }
    }

    /// Drops the current session and starts fetching `id`.
    ///
    /// Allowed from any state; a load already in flight is superseded.
    pub fn begin_load(&mut self, id: ChartId) -> LoadTicket {
        self.generation += 1;
        self.working = None;
        self.base = None;
        self.conflict = None;
        self.last_error = None;
        self.history = History::new(self.config.history_limit);
        self.retired_nodes.clear();
        self.retired_edges.clear();
        self.state = SessionState::Loading;
        tracing::info!("Loading flow chart {}", id);
        self.publish();
        LoadTicket {
            generation: self.generation,
            chart_id: id,
        }
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<FlowChart, RepositoryError>,
    ) -> Result<Completion, StoreError> {
        if ticket.generation != self.generation || self.state != SessionState::Loading {
            tracing::debug!("Discarding stale load response for {}", ticket.chart_id);
            return Ok(Completion::Discarded);
        }

        let chart = match result {
            Ok(chart) => chart,
            Err(e) => return Err(self.fail(StoreError::Repository(e))),
        };
        let report = self.validator.validate(&chart);
        if !report.is_valid() {
            tracing::warn!("Flow chart {} failed validation on load: {}", chart.id, report);
            return Err(self.fail(StoreError::Rejected(report)));
        }

        tracing::info!("Loaded flow chart {} at version {}", chart.id, chart.version);
        self.seed(chart);
        Ok(Completion::Applied)
    }

    /// Fetches `id` and seeds a new session with it.
    pub async fn load(&mut self, id: ChartId) -> Result<Arc<FlowChart>, StoreError> {
        let repository = self.repository();
        let ticket = self.begin_load(id);
        let result = ticket.submit(&*repository).await;
        self.finish_load(ticket, result)?;
        self.ready_chart()
    }

    /// Applies `intent` to the working copy as one undoable step.
    ///
    /// Rejected intents leave the working copy unchanged.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Arc<FlowChart>, StoreError> {
        let working = self.ready_chart()?;
        let label = intent.label();
        let patches = intent.into_patches(&working);
        if patches.is_empty() {
            return Ok(working);
        }

        self.check_retired(&working, &patches)
            .into_result()
            .map_err(StoreError::Rejected)?;
        let applied = apply_with_inverse(&working, &patches)
            .map_err(|v| StoreError::Rejected(ValidationReport::from(v)))?;
        let report = self.validator.validate(&applied.chart);
        if !report.is_valid() {
            tracing::debug!("Rejected {}: {}", label, report);
            return Err(StoreError::Rejected(report));
        }

        self.retire_added(&patches);
        self.history.push(Step {
            forward: patches,
            inverse: applied.inverse,
        });
        let chart = Arc::new(applied.chart);
        self.working = Some(Arc::clone(&chart));
        tracing::debug!("Applied {}", label);
        self.publish();
        Ok(chart)
    }

    pub fn undo(&mut self) -> Result<Arc<FlowChart>, StoreError> {
        let working = self.ready_chart()?;
        let Some(patches) = self.history.undo().map(<[ChartPatch]>::to_vec) else {
            return Err(StoreError::NoOp(HistoryBoundary::Undo));
        };
        match apply_patches(&working, &patches) {
            Ok(chart) => Ok(self.replace_working(chart)),
            Err(violation) => {
                self.history.revert_undo();
                Err(StoreError::History(violation))
            }
        }
    }

    pub fn redo(&mut self) -> Result<Arc<FlowChart>, StoreError> {
        let working = self.ready_chart()?;
        let Some(patches) = self.history.redo().map(<[ChartPatch]>::to_vec) else {
            return Err(StoreError::NoOp(HistoryBoundary::Redo));
        };
        match apply_patches(&working, &patches) {
            Ok(chart) => Ok(self.replace_working(chart)),
            Err(violation) => {
                self.history.revert_redo();
                Err(StoreError::History(violation))
            }
        }
    }

    /// Moves the session to `Saving` and returns what must be sent.
    pub fn begin_save(&mut self) -> Result<SaveTicket, StoreError> {
        let working = self.ready_chart()?;
        let patches = match (self.config.save_mode, &self.base) {
            (SaveMode::Patch, Some(base)) => diff(base, &working),
            _ => Vec::new(),
        };
        self.generation += 1;
        self.state = SessionState::Saving;
        tracing::info!(
            "Saving flow chart {} against version {}",
            working.id,
            working.version
        );
        self.publish();
        Ok(SaveTicket {
            generation: self.generation,
            chart_id: working.id,
            expected_version: working.version,
            mode: self.config.save_mode,
            chart: working,
            patches,
        })
    }

    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<FlowChart, RepositoryError>,
    ) -> Result<Completion, StoreError> {
        if ticket.generation != self.generation || self.state != SessionState::Saving {
            tracing::debug!("Discarding stale save response for {}", ticket.chart_id);
            return Ok(Completion::Discarded);
        }

        match result {
            Ok(saved) => {
                if let Some(working) = self.working.as_mut() {
                    let working = Arc::make_mut(working);
                    working.version = saved.version;
                    working.updated_at = saved.updated_at;
                }
                tracing::info!("Saved flow chart {} as version {}", saved.id, saved.version);
                self.base = Some(Arc::new(saved));
                self.history.mark_clean();
                self.last_error = None;
                self.state = SessionState::Ready;
                self.publish();
                Ok(Completion::Applied)
            }
            Err(RepositoryError::VersionConflict { expected, current }) => {
                tracing::warn!(
                    "Save of {} lost the race: expected version {}, server holds {}",
                    ticket.chart_id,
                    expected,
                    current.version
                );
                self.conflict = Some(Arc::new((*current).clone()));
                self.state = SessionState::Conflict;
                let error = StoreError::Repository(RepositoryError::VersionConflict {
                    expected,
                    current,
                });
                self.last_error = Some(error.clone());
                self.publish();
                Err(error)
            }
            Err(e @ RepositoryError::NotFound { .. }) => Err(self.fail(StoreError::Repository(e))),
            Err(e) => {
                tracing::warn!("Save of {} failed: {}", ticket.chart_id, e);
                let error = StoreError::Repository(e);
                self.last_error = Some(error.clone());
                self.state = SessionState::Ready;
                self.publish();
                Err(error)
            }
        }
    }

    /// Submits the working copy and reconciles the server's answer.
    pub async fn save(&mut self) -> Result<Arc<FlowChart>, StoreError> {
        let repository = self.repository();
        let ticket = self.begin_save()?;
        let result = ticket.submit(&*repository).await;
        self.finish_save(ticket, result)?;
        self.ready_chart()
    }

    /// Leaves [`SessionState::Conflict`] according to the caller's decision.
    pub fn resolve(&mut self, resolution: Resolution) -> Result<Arc<FlowChart>, StoreError> {
        let server = match (self.state, self.conflict.take()) {
            (SessionState::Conflict, Some(server)) => server,
            (_, conflict) => {
                self.conflict = conflict;
                return Err(StoreError::NotReady { state: self.state });
            }
        };

        match resolution {
            Resolution::Reload => {
                tracing::info!("Conflict on {} resolved by reloading version {}", server.id, server.version);
                let retired_nodes = std::mem::take(&mut self.retired_nodes);
                let retired_edges = std::mem::take(&mut self.retired_edges);
                self.seed((*server).clone());
                self.retired_nodes.extend(retired_nodes);
                self.retired_edges.extend(retired_edges);
            }
            Resolution::Overwrite => {
                tracing::info!("Conflict on {} resolved by overwriting version {}", server.id, server.version);
                if let Some(working) = self.working.as_mut() {
                    let working = Arc::make_mut(working);
                    working.version = server.version;
                    working.updated_at = server.updated_at;
                }
                self.base = Some(server);
                self.history.mark_dirty();
                self.last_error = None;
                self.state = SessionState::Ready;
                self.publish();
            }
        }
        self.ready_chart()
    }

    /// Abandons an in-flight load or save. Its response will be discarded.
    ///
    /// An abandoned save may still have reached the server; the next save
    /// then surfaces a version conflict rather than overwriting it.
    pub fn abandon(&mut self) {
        let next = match self.state {
            SessionState::Loading => SessionState::Idle,
            SessionState::Saving => SessionState::Ready,
            _ => return,
        };
        tracing::info!("Abandoned in-flight {} operation", self.state);
        self.generation += 1;
        self.state = next;
        self.publish();
    }

    /// Ends the session. Responses still in flight will be discarded.
    pub fn close(&mut self) {
        self.generation += 1;
        self.working = None;
        self.base = None;
        self.conflict = None;
        self.last_error = None;
        self.history = History::new(self.config.history_limit);
        self.retired_nodes.clear();
        self.retired_edges.clear();
        self.state = SessionState::Idle;
        self.publish();
    }

    fn seed(&mut self, chart: FlowChart) {
        self.retired_nodes.extend(chart.nodes.iter().map(|n| n.id.clone()));
        self.retired_edges.extend(chart.edges.iter().map(|e| e.id.clone()));
        let chart = Arc::new(chart);
        self.working = Some(Arc::clone(&chart));
        self.base = Some(chart);
        self.conflict = None;
        self.last_error = None;
        self.history = History::new(self.config.history_limit);
        self.state = SessionState::Ready;
        self.publish();
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        tracing::warn!("Editing session failed: {}", error);
        self.state = SessionState::Error;
        self.last_error = Some(error.clone());
        self.publish();
        error
    }

    fn replace_working(&mut self, chart: FlowChart) -> Arc<FlowChart> {
        let chart = Arc::new(chart);
        self.working = Some(Arc::clone(&chart));
        self.publish();
        chart
    }

    /// Ids are never handed out twice within a session.
    fn check_retired(&self, chart: &FlowChart, patches: &[ChartPatch]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for patch in patches {
            let id = match patch {
                ChartPatch::AddNode { node }
                    if self.retired_nodes.contains(&node.id) && !chart.contains_node(&node.id) =>
                {
                    &node.id
                }
                ChartPatch::AddEdge { edge }
                    if self.retired_edges.contains(&edge.id) && !chart.contains_edge(&edge.id) =>
                {
                    &edge.id
                }
                _ => continue,
            };
            report.push(Violation::RetiredId { id: id.clone() });
        }
        report
    }

    fn retire_added(&mut self, patches: &[ChartPatch]) {
        for patch in patches {
            match patch {
                ChartPatch::AddNode { node } => {
                    self.retired_nodes.insert(node.id.clone());
                }
                ChartPatch::AddEdge { edge } => {
                    self.retired_edges.insert(edge.id.clone());
                }
                _ => {}
            }
        }
    }
}
