//! Stage Execution Pipeline: a Russian-doll middleware chain run once per stage.
//!
//! Each middleware receives the current state plus a boxed `next` continuation
//! it decides whether and when to call. The continuation owns
//! `StageExecutionContext` by value and returns it (or a failure) the same
//! way, so a middleware can freely act before `next()`, after it, or both —
//! `ContextPopulationMiddleware` acts before, `ContextStoreMiddleware` after.

mod context_population;
mod context_store_middleware;
mod llm_request;
mod logging;
mod placeholder_validation;

pub use context_population::ContextPopulationMiddleware;
pub use context_store_middleware::ContextStoreMiddleware;
pub use llm_request::LlmRequestMiddleware;
pub use logging::LoggingMiddleware;
pub use placeholder_validation::PlaceholderValidationMiddleware;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context_store::ContextItemStore;
use crate::error::OrchestratorError;
use crate::llm::LlmAdapter;
use crate::runtime::{CompletionResult, RuntimeStage};

/// Errors a middleware or the pipeline driver itself can raise.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unresolved placeholder in stage {stage}: {marker}")]
    UnresolvedPlaceholder { stage: String, marker: String },
    #[error(transparent)]
    Orchestrator(Box<OrchestratorError>),
}

impl From<OrchestratorError> for PipelineError {
    fn from(e: OrchestratorError) -> Self {
        PipelineError::Orchestrator(Box::new(e))
    }
}

impl From<crate::context_store::ContextStoreError> for PipelineError {
    fn from(e: crate::context_store::ContextStoreError) -> Self {
        PipelineError::Orchestrator(Box::new(e.into()))
    }
}

impl From<crate::llm::ProviderError> for PipelineError {
    fn from(e: crate::llm::ProviderError) -> Self {
        PipelineError::Orchestrator(Box::new(e.into()))
    }
}

/// Per-stage execution state threaded through the middleware chain.
///
/// `stage` is mutable so `ContextPopulationMiddleware` can rewrite user-turn
/// content in place; `results` is append-only, filled by `LlmRequestMiddleware`.
#[derive(Clone, Debug)]
pub struct StageExecutionContext {
    pub session_id: String,
    pub stage: RuntimeStage,
    pub metadata: HashMap<String, Value>,
    pub results: Vec<CompletionResult>,
    pub ct: CancellationToken,
}

impl StageExecutionContext {
    pub fn new(
        session_id: impl Into<String>,
        stage: RuntimeStage,
        metadata: HashMap<String, Value>,
        ct: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            stage,
            metadata,
            results: Vec::new(),
            ct,
        }
    }
}

/// The remaining chain, wrapping `ctx` to produce the final pipeline outcome.
pub type Next = Box<
    dyn FnOnce(StageExecutionContext) -> BoxFuture<'static, Result<StageExecutionContext, PipelineError>>
        + Send,
>;

#[async_trait]
pub trait StageMiddleware: Send + Sync {
    async fn run(&self, ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError>;
}

fn terminal() -> Next {
    Box::new(|ctx| Box::pin(async move { Ok(ctx) }))
}

fn build_chain(middlewares: Arc<Vec<Arc<dyn StageMiddleware>>>, index: usize) -> Next {
    if index >= middlewares.len() {
        return terminal();
    }
    Box::new(move |ctx| {
        Box::pin(async move {
            let middleware = middlewares[index].clone();
            let next = build_chain(middlewares.clone(), index + 1);
            middleware.run(ctx, next).await
        })
    })
}

/// The composed Stage Execution Pipeline: one `run()` call drives the full
/// middleware chain for a single stage.
pub struct Pipeline {
    middlewares: Arc<Vec<Arc<dyn StageMiddleware>>>,
}

impl Pipeline {
    pub fn new(middlewares: Vec<Arc<dyn StageMiddleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }

    /// The standard middleware order.
    pub fn standard(context_store: Arc<dyn ContextItemStore>, adapter: Arc<LlmAdapter>) -> Self {
        Self::new(vec![
            Arc::new(ContextPopulationMiddleware::new(context_store.clone())),
            Arc::new(PlaceholderValidationMiddleware),
            Arc::new(LlmRequestMiddleware::new(adapter)),
            Arc::new(LoggingMiddleware),
            Arc::new(ContextStoreMiddleware::new(context_store)),
        ])
    }

    pub async fn run(&self, ctx: StageExecutionContext) -> Result<StageExecutionContext, PipelineError> {
        let chain = build_chain(self.middlewares.clone(), 0);
        chain(ctx).await
    }
}
