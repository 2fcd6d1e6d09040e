//! Request and response shapes exchanged with the store of record.
use crate::chart::{ChartId, ChartPatch, FlowChart};
use crate::error::{RepositoryError, TransportError, ValidationReport};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Put => f.write_str("PUT"),
            Method::Patch => f.write_str("PATCH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    /// JSON body, if any.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// JSON body, possibly empty.
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self {
                status: 500,
                body: serde_json::json!({ "message": e.to_string() }).to_string(),
            },
        }
    }

    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &MessageBody {
                message: message.into(),
            },
        )
    }
}

/// Body of a full-replace save (`PUT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBody {
    pub chart: FlowChart,
    pub expected_version: u64,
}

/// Body of an incremental save (`PATCH`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
    pub patches: Vec<ChartPatch>,
    pub expected_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// `{base}/{id}` without a doubled slash.
pub fn chart_path(base_path: &str, id: ChartId) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), id)
}

/// Extracts the chart id from a request path under `base_path`.
pub fn parse_chart_path(base_path: &str, path: &str) -> Option<ChartId> {
    let rest = path.strip_prefix(base_path.trim_end_matches('/'))?;
    let id = rest.strip_prefix('/')?;
    id.trim_end_matches('/').parse().ok()
}

/// Maps a fetch or save response onto the repository error taxonomy.
pub fn decode_chart_response(
    response: HttpResponse,
    id: ChartId,
    expected_version: Option<u64>,
) -> Result<FlowChart, RepositoryError> {
    match response.status {
        200 => Ok(decode(&response.body)?),
        404 => Err(RepositoryError::NotFound { id }),
        409 => {
            let current: FlowChart = decode(&response.body)?;
            Err(RepositoryError::VersionConflict {
                expected: expected_version.unwrap_or_default(),
                current: Box::new(current),
            })
        }
        422 => {
            let report: ValidationReport = decode(&response.body)?;
            Err(RepositoryError::Validation(report))
        }
        status => Err(RepositoryError::Transport(TransportError::Status {
            status,
            body: response.body,
        })),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))
}
