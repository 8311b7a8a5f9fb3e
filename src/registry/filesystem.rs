//! Filesystem Scenario Store: a non-recursive directory of scenario definition
//! files, parsed through the loader and builder on every access.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::build;
use crate::error::OrchestratorError;
use crate::loader;
use crate::runtime::RuntimeScenario;
use crate::schema::SchemaProvider;

use super::ScenarioStore;

/// Reads scenario definitions from `.json`/`.yaml`/`.yml` files directly under a
/// directory (no recursion into subdirectories).
pub struct FilesystemScenarioStore {
    dir: PathBuf,
    schema_provider: Box<dyn SchemaProvider>,
}

impl FilesystemScenarioStore {
    pub fn new(dir: impl AsRef<Path>, schema_provider: Box<dyn SchemaProvider>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            schema_provider,
        }
    }

    async fn scenario_file_paths(&self) -> Result<Vec<PathBuf>, OrchestratorError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                return Err(OrchestratorError::StorageUnavailable(format!(
                    "reading directory {}: {e}",
                    self.dir.display()
                )))
            }
        };

        let mut paths = Vec::new();
        loop {
            let next = entries.next_entry().await.map_err(|e| {
                OrchestratorError::StorageUnavailable(format!("listing directory entries: {e}"))
            })?;
            let Some(entry) = next else { break };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("json") => paths.push(path),
                Some(ext) if ext.eq_ignore_ascii_case("yaml") => paths.push(path),
                Some(ext) if ext.eq_ignore_ascii_case("yml") => paths.push(path),
                _ => continue,
            }
        }
        Ok(paths)
    }

    async fn load_scenario(&self, path: &Path) -> Option<RuntimeScenario> {
        let def = match loader::load_file(path).await {
            Ok(def) => def,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unparseable scenario file");
                return None;
            }
        };
        match build::build(&def, self.schema_provider.as_ref()) {
            Ok(scenario) => Some(scenario),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping invalid scenario definition");
                None
            }
        }
    }
}

#[async_trait]
impl ScenarioStore for FilesystemScenarioStore {
    async fn get_scenario(&self, name: &str) -> Result<Option<RuntimeScenario>, OrchestratorError> {
        for path in self.scenario_file_paths().await? {
            if let Some(scenario) = self.load_scenario(&path).await {
                if scenario.name.eq_ignore_ascii_case(name) {
                    return Ok(Some(scenario));
                }
            }
        }
        Ok(None)
    }

    async fn get_all_scenarios(&self) -> Result<Vec<RuntimeScenario>, OrchestratorError> {
        let mut scenarios = Vec::new();
        for path in self.scenario_file_paths().await? {
            if let Some(scenario) = self.load_scenario(&path).await {
                scenarios.push(scenario);
            }
        }
        Ok(scenarios)
    }

    async fn list_scenario_names(&self) -> Result<Vec<String>, OrchestratorError> {
        Ok(self.get_all_scenarios().await?.into_iter().map(|s| s.name).collect())
    }

    async fn store_scenario(&self, _scenario: RuntimeScenario) -> Result<(), OrchestratorError> {
        Err(OrchestratorError::InvalidInput(
            "filesystem scenario store is read-only".into(),
        ))
    }

    async fn delete_scenario(&self, _name: &str) -> Result<(), OrchestratorError> {
        Err(OrchestratorError::InvalidInput(
            "filesystem scenario store is read-only".into(),
        ))
    }
}
