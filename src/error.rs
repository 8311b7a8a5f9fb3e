//! Crate-boundary error type: one variant per error kind the orchestrator can raise.
//!
//! Component-local errors (`ContextStoreError`, `FunctionError`, `ProviderError`,
//! `ScenarioBuildError`, `PipelineError`) convert into this type via `From` at the
//! point where they cross into orchestrator-facing code.

use thiserror::Error;

/// Top-level error surfaced by the registry, pipeline, and orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unresolved placeholder in stage {stage}: {marker}")]
    UnresolvedPlaceholder { stage: String, marker: String },

    #[error("tool missing: {0}")]
    ToolMissing(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<crate::context_store::ContextStoreError> for OrchestratorError {
    fn from(e: crate::context_store::ContextStoreError) -> Self {
        use crate::context_store::ContextStoreError as E;
        match e {
            E::InvalidArgument(m) => OrchestratorError::InvalidInput(m),
            E::StorageUnavailable(m) => OrchestratorError::StorageUnavailable(m),
        }
    }
}

impl From<crate::function_registry::FunctionError> for OrchestratorError {
    fn from(e: crate::function_registry::FunctionError) -> Self {
        use crate::function_registry::FunctionError as E;
        match e {
            E::InvalidInput(m) => OrchestratorError::InvalidInput(m),
            E::NotFound(m) => OrchestratorError::ToolMissing(m),
            E::Execution(m) => OrchestratorError::ProviderError(m),
        }
    }
}

impl From<crate::llm::ProviderError> for OrchestratorError {
    fn from(e: crate::llm::ProviderError) -> Self {
        use crate::llm::ProviderError as E;
        match e {
            E::InvalidInput(m) => OrchestratorError::InvalidInput(m),
            E::ToolMissing(m) => OrchestratorError::ToolMissing(m),
            E::ToolLoopExhausted(rounds) => {
                OrchestratorError::ProviderError(format!("tool loop exhausted after {rounds} rounds"))
            }
            E::Transport(m) => OrchestratorError::ProviderError(m),
            E::Cancelled => OrchestratorError::Cancelled,
        }
    }
}

impl From<crate::build::ScenarioBuildError> for OrchestratorError {
    fn from(e: crate::build::ScenarioBuildError) -> Self {
        OrchestratorError::InvalidDefinition(e.to_string())
    }
}

impl From<crate::pipeline::PipelineError> for OrchestratorError {
    fn from(e: crate::pipeline::PipelineError) -> Self {
        use crate::pipeline::PipelineError as E;
        match e {
            E::UnresolvedPlaceholder { stage, marker } => {
                OrchestratorError::UnresolvedPlaceholder { stage, marker }
            }
            E::Orchestrator(inner) => *inner,
        }
    }
}
