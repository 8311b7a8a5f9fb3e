//! ContextPopulationMiddleware: rewrites each user
//! turn's content with its resolved form before the rest of the chain runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context_store::ContextItemStore;
use crate::placeholder;
use crate::role::Role;

use super::{Next, PipelineError, StageExecutionContext, StageMiddleware};

pub struct ContextPopulationMiddleware {
    store: Arc<dyn ContextItemStore>,
}

impl ContextPopulationMiddleware {
    pub fn new(store: Arc<dyn ContextItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageMiddleware for ContextPopulationMiddleware {
    async fn run(&self, mut ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError> {
        for turn in ctx.stage.turns.iter_mut() {
            if turn.role != Role::User {
                continue;
            }
            turn.content = placeholder::populate(
                &turn.content,
                &ctx.session_id,
                self.store.as_ref(),
                &turn.parameters.extras,
            )
            .await?;
        }
        next(ctx).await
    }
}
