//! Bridge between an editing session and the remote store of record.
//!
//! The store of record is the only authority for `version` and `updatedAt`.
//! Every write carries the version the client last observed; a mismatch is
//! answered with [`RepositoryError::VersionConflict`] and the server's current
//! chart, so concurrent writers can never silently overwrite each other.

use crate::chart::{ChartId, ChartPatch, FlowChart};
use crate::error::RepositoryError;
use async_trait::async_trait;
use std::sync::Arc;

mod http;
mod memory;
pub mod wire;

pub use http::{HttpClient, HttpFlowRepository};
pub use memory::MemoryStore;
pub use wire::{HttpRequest, HttpResponse, Method};

/// Load and save operations against the store of record.
///
/// Implementations keep no session state; they only perform I/O.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn fetch(&self, id: ChartId) -> Result<FlowChart, RepositoryError>;

    /// Replaces the stored chart if its version still equals `expected_version`.
    /// Returns the stored chart carrying the newly assigned version.
    async fn save(
        &self,
        id: ChartId,
        chart: &FlowChart,
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError>;

    /// Applies `patches` to the stored chart if its version still equals
    /// `expected_version`.
    async fn patch(
        &self,
        id: ChartId,
        patches: &[ChartPatch],
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError>;
}

#[async_trait]
impl<R: FlowRepository + ?Sized> FlowRepository for Arc<R> {
    async fn fetch(&self, id: ChartId) -> Result<FlowChart, RepositoryError> {
        (**self).fetch(id).await
    }

    async fn save(
        &self,
        id: ChartId,
        chart: &FlowChart,
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        (**self).save(id, chart, expected_version).await
    }

    async fn patch(
        &self,
        id: ChartId,
        patches: &[ChartPatch],
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        (**self).patch(id, patches, expected_version).await
    }
}
