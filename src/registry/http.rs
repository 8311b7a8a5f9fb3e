//! HTTP Scenario Store: fetches runtime scenarios from a remote endpoint.
//!
//! The transport is abstracted behind `HttpClient` so tests never touch the network.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestratorError;
use crate::runtime::RuntimeScenario;

use super::ScenarioStore;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<String>, String>;
}

struct ReqwestHttpClient {
    client: reqwest::Client,
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Option<String>, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.text().await.map(Some).map_err(|e| e.to_string())
    }
}

/// Remote scenario store: `GET {base_url}/scenarios` for the full list,
/// `GET {base_url}/scenarios/{name}` for a single lookup.
pub struct HttpScenarioStore {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
}

impl HttpScenarioStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: Arc::new(ReqwestHttpClient {
                client: reqwest::Client::new(),
            }),
        }
    }

    pub fn with_client(base_url: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl ScenarioStore for HttpScenarioStore {
    async fn get_scenario(&self, name: &str) -> Result<Option<RuntimeScenario>, OrchestratorError> {
        let url = format!("{}/scenarios/{name}", self.base_url);
        let body = self
            .http_client
            .get(&url)
            .await
            .map_err(OrchestratorError::StorageUnavailable)?;
        let Some(body) = body else { return Ok(None) };
        let scenario: RuntimeScenario = serde_json::from_str(&body)
            .map_err(|e| OrchestratorError::InvalidDefinition(e.to_string()))?;
        Ok(Some(scenario))
    }

    async fn get_all_scenarios(&self) -> Result<Vec<RuntimeScenario>, OrchestratorError> {
        let url = format!("{}/scenarios", self.base_url);
        let body = self
            .http_client
            .get(&url)
            .await
            .map_err(OrchestratorError::StorageUnavailable)?
            .unwrap_or_default();
        if body.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| OrchestratorError::InvalidDefinition(e.to_string()))
    }

    async fn list_scenario_names(&self) -> Result<Vec<String>, OrchestratorError> {
        Ok(self.get_all_scenarios().await?.into_iter().map(|s| s.name).collect())
    }

    async fn store_scenario(&self, _scenario: RuntimeScenario) -> Result<(), OrchestratorError> {
        Err(OrchestratorError::InvalidInput(
            "http scenario store does not support writes".into(),
        ))
    }

    async fn delete_scenario(&self, _name: &str) -> Result<(), OrchestratorError> {
        Err(OrchestratorError::InvalidInput(
            "http scenario store does not support writes".into(),
        ))
    }
}
