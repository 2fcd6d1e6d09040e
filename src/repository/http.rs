use super::FlowRepository;
use super::wire::{
    HttpRequest, HttpResponse, Method, PatchBody, SaveBody, chart_path, decode_chart_response,
};
use crate::chart::{ChartId, ChartPatch, FlowChart};
use crate::config::ClientConfig;
use crate::error::{RepositoryError, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// The transport seam: sends one request and returns whatever the server answered.
///
/// Non-2xx statuses are *responses*, not errors; only failures to obtain a
/// response at all belong in [`TransportError`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// A [`FlowRepository`] speaking the `/flow-charts/{id}` JSON protocol.
pub struct HttpFlowRepository<C> {
    client: C,
    config: ClientConfig,
}

impl<C: HttpClient> HttpFlowRepository<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, ClientConfig::default())
    }

    pub fn with_config(client: C, config: ClientConfig) -> Self {
        Self { client, config }
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = self.config.request_timeout();
        tracing::debug!("{} {}", request.method, request.path);
        match tokio::time::timeout(timeout, self.client.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                millis: self.config.request_timeout_ms,
            }),
        }
    }

    fn encode<T: serde::Serialize>(body: &T) -> Result<String, TransportError> {
        serde_json::to_string(body).map_err(|e| TransportError::Encode(e.to_string()))
    }
}

#[async_trait]
impl<C: HttpClient> FlowRepository for HttpFlowRepository<C> {
    async fn fetch(&self, id: ChartId) -> Result<FlowChart, RepositoryError> {
        let request = HttpRequest {
            method: Method::Get,
            path: chart_path(&self.config.base_path, id),
            body: None,
        };
        let response = self.exchange(request).await?;
        decode_chart_response(response, id, None)
    }

    async fn save(
        &self,
        id: ChartId,
        chart: &FlowChart,
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        let body = Self::encode(&SaveBody {
            chart: chart.clone(),
            expected_version,
        })?;
        let request = HttpRequest {
            method: Method::Put,
            path: chart_path(&self.config.base_path, id),
            body: Some(body),
        };
        let response = self.exchange(request).await?;
        decode_chart_response(response, id, Some(expected_version))
    }

    async fn patch(
        &self,
        id: ChartId,
        patches: &[ChartPatch],
        expected_version: u64,
    ) -> Result<FlowChart, RepositoryError> {
        let body = Self::encode(&PatchBody {
            patches: patches.to_vec(),
            expected_version,
        })?;
        let request = HttpRequest {
            method: Method::Patch,
            path: chart_path(&self.config.base_path, id),
            body: Some(body),
        };
        let response = self.exchange(request).await?;
        decode_chart_response(response, id, Some(expected_version))
    }
}
