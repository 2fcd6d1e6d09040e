//! Runtime configuration for editing sessions and the repository client.
//!
//! Values come from a JSON file, from the environment (a `.env` file is
//! honoured), or from [`Default`]. Every section is optional in a file.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_HISTORY_LIMIT: &str = "FLOWSTATE_HISTORY_LIMIT";
pub const ENV_SAVE_MODE: &str = "FLOWSTATE_SAVE_MODE";
pub const ENV_BASE_PATH: &str = "FLOWSTATE_BASE_PATH";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FLOWSTATE_REQUEST_TIMEOUT_MS";

/// How the editing store submits a save to the store of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveMode {
    /// `PUT` the whole working copy.
    #[default]
    Replace,
    /// `PATCH` the diff between the last acknowledged chart and the working copy.
    Patch,
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" | "put" => Ok(SaveMode::Replace),
            "patch" => Ok(SaveMode::Patch),
            other => Err(format!("expected 'replace' or 'patch', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Maximum number of undoable steps kept per session.
    pub history_limit: usize,
    pub save_mode: SaveMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_limit: 200,
            save_mode: SaveMode::Replace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Collection path the chart id is appended to.
    pub base_path: String,
    pub request_timeout_ms: u64,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_path: "/flow-charts".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub store: StoreConfig,
    pub client: ClientConfig,
}

impl FlowConfig {
    /// Loads `.env` if present, then reads the `FLOWSTATE_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_HISTORY_LIMIT) {
            config.store.history_limit = parse(ENV_HISTORY_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_SAVE_MODE) {
            config.store.save_mode = parse(ENV_SAVE_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_BASE_PATH) {
            config.client.base_path = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.client.request_timeout_ms = parse(ENV_REQUEST_TIMEOUT_MS, &value)?;
        }
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.store.history_limit == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_HISTORY_LIMIT.to_string(),
                value: "0".to_string(),
                reason: "history must keep at least one step".to_string(),
            });
        }
        if self.client.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_REQUEST_TIMEOUT_MS.to_string(),
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: AHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = FlowConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.client.base_path, "/flow-charts");
    }

    #[test]
    fn variables_override_defaults() {
        let config = FlowConfig::from_lookup(lookup(&[
            (ENV_HISTORY_LIMIT, "15"),
            (ENV_SAVE_MODE, "Patch"),
            (ENV_BASE_PATH, "/api/charts/"),
            (ENV_REQUEST_TIMEOUT_MS, "250"),
        ]))
        .unwrap();
        assert_eq!(config.store.history_limit, 15);
        assert_eq!(config.store.save_mode, SaveMode::Patch);
        assert_eq!(config.client.base_path, "/api/charts");
        assert_eq!(config.client.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let err = FlowConfig::from_lookup(lookup(&[(ENV_SAVE_MODE, "merge")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == ENV_SAVE_MODE));

        let err = FlowConfig::from_lookup(lookup(&[(ENV_HISTORY_LIMIT, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: FlowConfig = serde_json::from_str(r#"{"store": {"saveMode": "patch"}}"#).unwrap();
        assert_eq!(config.store.save_mode, SaveMode::Patch);
        assert_eq!(config.store.history_limit, 200);
        assert_eq!(config.client, ClientConfig::default());
    }
}
