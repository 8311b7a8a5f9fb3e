//! LoggingMiddleware: brackets `next()` with start/finish
//! log lines and a duration measurement.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{Next, PipelineError, StageExecutionContext, StageMiddleware};

pub struct LoggingMiddleware;

#[async_trait]
impl StageMiddleware for LoggingMiddleware {
    async fn run(&self, ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError> {
        let stage_id = ctx.stage.id;
        let session_id = ctx.session_id.clone();
        info!(session_id, stage_id, "stage execution starting");
        let start = Instant::now();
        let result = next(ctx).await;
        let elapsed_ms = start.elapsed().as_millis();
        match &result {
            Ok(_) => info!(session_id, stage_id, elapsed_ms, "stage execution finished"),
            Err(e) => warn!(session_id, stage_id, elapsed_ms, error = %e, "stage execution failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeStage;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn passes_the_context_through_unchanged() {
        let mw = LoggingMiddleware;
        let stage = RuntimeStage {
            id: 1,
            name: "s".into(),
            turns: vec![],
            model: None,
            parameters: Default::default(),
        };
        let ctx = StageExecutionContext::new("s1", stage, HashMap::new(), CancellationToken::new());
        let out = mw.run(ctx, Box::new(|c| Box::pin(async move { Ok(c) }))).await.unwrap();
        assert_eq!(out.session_id, "s1");
    }
}
