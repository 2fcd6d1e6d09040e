use super::FlowRepository;
use super::http::HttpClient;
use super::wire::{HttpRequest, HttpResponse, Method, PatchBody, SaveBody, parse_chart_path};
use crate::chart::{ChartId, ChartPatch, FlowChart, Validator, apply_patches};
use crate::error::{RepositoryError, TransportError, ValidationReport, Violation};
use ahash::AHashMap;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

/// An in-process store of record.
///
/// Writes are a compare-and-swap on the version integer: the stored chart is
/// replaced only when the caller's expected version matches, and the store
/// alone assigns the next version and the `updated_at` timestamp. It also
/// answers the HTTP protocol through [`HttpClient`], which makes it usable as
/// a loopback server behind [`HttpFlowRepository`](super::HttpFlowRepository).
pub struct MemoryStore {
    charts: Mutex<AHashMap<ChartId, FlowChart>>,
    validator: Validator,
    base_path: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            charts: Mutex::new(AHashMap::new()),
            validator: Validator::new(),
            base_path: "/flow-charts".to_string(),
        }
    }

    /// Validates incoming charts with `validator` instead of the structural default.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Stores a new, empty chart at version 1.
    pub async fn create(&self, name: impl Into<String>) -> FlowChart {
        let mut chart = FlowChart::new(name);
        chart.version = 1;
        chart.updated_at = Utc::now();
        self.charts.lock().await.insert(chart.id, chart.clone());
        tracing::info!("Created flow chart {} at version 1", chart.id);
        chart
    }

    /// Seeds the store with `chart` exactly as given, bypassing version checks.
    pub async fn insert(&self, chart: FlowChart) {
        self.charts.lock().await.insert(chart.id, chart);
    }

    pub async fn get(&self, id: ChartId) -> Option<FlowChart> {
        self.charts.lock().await.get(&id).cloned()
    }

    /// Checks the version, builds the replacement and stamps it.
    async fn commit(
        &self,
        id: ChartId,
        expected_version: u64,
        build: impl FnOnce(&FlowChart) -> Result<FlowChart, ValidationReport>,
    ) -> Result<FlowChart, RepositoryError> {
        let mut charts = self.charts.lock().await;
        let current = charts.get(&id).ok_or(RepositoryError::NotFound { id })?;
        if current.version != expected_version {
            tracing::warn!(
                "Rejected write to {}: expected version {}, found {}",
                id,
                expected_version,
                current.version
            );
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                current: Box::new(current.clone()),
            });
        }

        let mut next = build(current).map_err(RepositoryError::Validation)?;
        if next.id != id {
            return Err(RepositoryError::Validation(
                Violation::ChartIdMismatch {
                    expected: id,
                    found: next.id,
                }
                .into(),
            ));
        }
        self.validator
            .validate(&next)
            .into_result()
            .map_err(RepositoryError::Validation)?;

        next.version = current.version.checked_add(1).ok_or_else(|| {
            RepositoryError::Validation(
                Violation::VersionExhausted {
                    version: current.version,
                }
                .into(),
            )
        })?;
        next.updated_at = Utc::now();
        tracing::info!("Committed flow chart {} at version {}", id, next.version);
        charts.insert(id, next.clone());
        Ok(next)
    }

    /// Answers one request of the `/flow-charts/{id}` protocol.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let Some(id) = parse_chart_path(&self.base_path, &request.path) else {
            return HttpResponse::message(404, format!("No route for {}", request.path));
        };
        let body = request.body.as_deref().unwrap_or("");
        let result = match request.method {
            Method::Get => self.fetch(id).await,
            Method::Put => match serde_json::from_str::<SaveBody>(body) {
                Ok(save) => self.save(id, &save.chart, save.expected_version).await,
                Err(e) => return HttpResponse::message(400, e.to_string()),
            },
            Method::Patch => match serde_json::from_str::<PatchBody>(body) {
                Ok(patch) => self.patch(id, &patch.patches, patch.expected_version).await,
                Err(e) => return HttpResponse::message(400, e.to_string()),
            },
        };
        match result {
            Ok(chart) => HttpResponse::json(200, &chart),
            Err(RepositoryError::NotFound { id }) => {
                HttpResponse::message(404, format!("Flow chart '{}' not found", id))
            }
            Err(RepositoryError::VersionConflict { current, .. }) => {
                HttpResponse::json(409, current.as_ref())
            }
            Err(RepositoryError::Validation(report)) => HttpResponse::json(422, &report),
            Err(RepositoryError::Transport(e)) => HttpResponse::message(500, e.to_string()),
        }
    }
}

#[async_trait]
impl FlowRepository for MemoryStore {
    async fn fetch(&self, id: ChartId) -> Result<FlowChart, RepositoryError> {
        self.get(id).await.ok_or(RepositoryError::NotFound { id })
    }

    async fn save(
        &self,
        id: ChartId,
        chart: &FlowChart,
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        self.commit(id, expected_version, |_| Ok(chart.clone())).await
    }

    async fn patch(
        &self,
        id: ChartId,
        patches: &[ChartPatch],
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        self.commit(id, expected_version, |current| {
            apply_patches(current, patches).map_err(ValidationReport::from)
        })
        .await
    }
}

#[async_trait]
impl HttpClient for MemoryStore {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(self.handle(request).await)
    }
}
