//! Scenario Registry: aggregates pluggable Scenario Stores behind a concurrent,
//! case-insensitive cache.

mod filesystem;
mod http;

pub use filesystem::FilesystemScenarioStore;
pub use http::HttpScenarioStore;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::runtime::RuntimeScenario;

/// A pluggable source of runtime scenarios (filesystem, remote, ...).
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    async fn get_scenario(&self, name: &str) -> Result<Option<RuntimeScenario>, OrchestratorError>;
    async fn get_all_scenarios(&self) -> Result<Vec<RuntimeScenario>, OrchestratorError>;
    async fn list_scenario_names(&self) -> Result<Vec<String>, OrchestratorError>;
    async fn store_scenario(&self, scenario: RuntimeScenario) -> Result<(), OrchestratorError>;
    async fn delete_scenario(&self, name: &str) -> Result<(), OrchestratorError>;
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Ordered list of stores plus a concurrent cache keyed case-insensitively by
/// scenario name.
pub struct ScenarioRegistry {
    stores: Vec<Arc<dyn ScenarioStore>>,
    cache: DashMap<String, RuntimeScenario>,
    warm_up: OnceCell<()>,
}

impl ScenarioRegistry {
    /// Constructs a registry over a non-empty, ordered list of stores. Construction
    /// itself does not perform I/O; warm-up runs lazily on first `get_scenario`.
    pub fn new(stores: Vec<Arc<dyn ScenarioStore>>) -> Result<Self, OrchestratorError> {
        if stores.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "registry requires a non-empty list of stores".into(),
            ));
        }
        Ok(Self {
            stores,
            cache: DashMap::new(),
            warm_up: OnceCell::new(),
        })
    }

    async fn ensure_warm(&self) {
        self.warm_up
            .get_or_init(|| async {
                info!(store_count = self.stores.len(), "warming up scenario registry");
                let fetches = self
                    .stores
                    .iter()
                    .map(|store| async move { store.get_all_scenarios().await });
                let results = futures::future::join_all(fetches).await;
                // Apply sequentially in store order so ties resolve last-writer-wins
                // with store order fixing precedence, even though fetches ran concurrently.
                for (i, result) in results.into_iter().enumerate() {
                    match result {
                        Ok(scenarios) => {
                            for scenario in scenarios {
                                self.cache.insert(normalize(&scenario.name), scenario);
                            }
                        }
                        Err(e) => warn!(store_index = i, error = %e, "store failed during warm-up"),
                    }
                }
                info!(cached = self.cache.len(), "scenario registry warm-up complete");
            })
            .await;
    }

    /// Resolves a scenario by name: cache hit, else fan out across all stores.
    pub async fn get_scenario(&self, name: &str) -> Result<RuntimeScenario, OrchestratorError> {
        self.ensure_warm().await;

        let key = normalize(name);
        if let Some(hit) = self.cache.get(&key) {
            debug!(name, "scenario cache hit");
            return Ok(hit.value().clone());
        }

        let fetches = self
            .stores
            .iter()
            .map(|store| async move { store.get_scenario(name).await });
        let results = futures::future::join_all(fetches).await;
        for result in results {
            if let Ok(Some(scenario)) = result {
                self.cache.insert(normalize(&scenario.name), scenario);
            }
        }

        self.cache
            .get(&key)
            .map(|s| s.value().clone())
            .ok_or_else(|| OrchestratorError::NotFound(format!("scenario not found: {name}")))
    }

    /// Cache keys, sorted.
    pub async fn list_scenario_names(&self) -> Vec<String> {
        self.ensure_warm().await;
        let mut names: Vec<String> = self.cache.iter().map(|e| e.value().name.clone()).collect();
        names.sort();
        names
    }
}
