//! Scenario Loader: parses a scenario file by extension into a `ScenarioDefinition`.

use std::path::Path;

use crate::definition::ScenarioDefinition;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("unsupported scenario file extension: {0}")]
    UnsupportedExtension(String),
    #[error("failed to parse scenario file {path}: {source}")]
    InvalidDefinition {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parses scenario file contents given its extension (case-insensitive).
pub fn parse(contents: &str, extension: &str, path_for_errors: &str) -> Result<ScenarioDefinition, LoaderError> {
    match extension.to_ascii_lowercase().as_str() {
        "json" => serde_json::from_str(contents).map_err(|e| LoaderError::InvalidDefinition {
            path: path_for_errors.to_string(),
            source: Box::new(e),
        }),
        "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| LoaderError::InvalidDefinition {
            path: path_for_errors.to_string(),
            source: Box::new(e),
        }),
        other => Err(LoaderError::UnsupportedExtension(other.to_string())),
    }
}

/// Reads and parses a scenario definition from a file on disk.
pub async fn load_file(path: impl AsRef<Path>) -> Result<ScenarioDefinition, LoaderError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoaderError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&contents, &extension, &path.display().to_string())
}
