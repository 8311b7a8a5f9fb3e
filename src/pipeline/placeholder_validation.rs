//! PlaceholderValidationMiddleware: after populate,
//! asserts no `{{…}}`/`{…}` marker remains in any user turn.

use async_trait::async_trait;

use crate::key;
use crate::placeholder;
use crate::role::Role;

use super::{Next, PipelineError, StageExecutionContext, StageMiddleware};

pub struct PlaceholderValidationMiddleware;

#[async_trait]
impl StageMiddleware for PlaceholderValidationMiddleware {
    async fn run(&self, ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError> {
        for (index, turn) in ctx.stage.turns.iter().filter(|t| t.role == Role::User).enumerate() {
            if let Some(marker) = placeholder::first_unresolved_marker(&turn.content) {
                return Err(PipelineError::UnresolvedPlaceholder {
                    stage: key::stage_key(ctx.stage.id, index),
                    marker,
                });
            }
        }
        next(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ParameterBag, PromptTurn, RuntimeStage};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    fn ctx_with(content: &str) -> StageExecutionContext {
        let stage = RuntimeStage {
            id: 1,
            name: "s".into(),
            turns: vec![PromptTurn::user(content, "p1", ParameterBag::default())],
            model: None,
            parameters: ParameterBag::default(),
        };
        StageExecutionContext::new("s1", stage, HashMap::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn passes_through_when_fully_resolved() {
        let mw = PlaceholderValidationMiddleware;
        let ctx = ctx_with("hello world");
        assert!(mw.run(ctx, Box::new(|c| Box::pin(async move { Ok(c) }))).await.is_ok());
    }

    #[tokio::test]
    async fn fails_on_remaining_marker() {
        let mw = PlaceholderValidationMiddleware;
        let ctx = ctx_with("Hi {{nope}}");
        let err = mw
            .run(ctx, Box::new(|c| Box::pin(async move { Ok(c) })))
            .await
            .unwrap_err();
        match err {
            PipelineError::UnresolvedPlaceholder { stage, marker } => {
                assert_eq!(stage, "1-1");
                assert_eq!(marker, "{{nope}}");
            }
            other => panic!("expected UnresolvedPlaceholder, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stage_key_counts_user_turns_only_even_with_a_leading_system_turn() {
        let mw = PlaceholderValidationMiddleware;
        let stage = RuntimeStage {
            id: 1,
            name: "s".into(),
            turns: vec![
                PromptTurn::system("be nice"),
                PromptTurn::user("Hi {{nope}}", "p1", ParameterBag::default()),
            ],
            model: None,
            parameters: ParameterBag::default(),
        };
        let ctx = StageExecutionContext::new("s1", stage, HashMap::new(), CancellationToken::new());
        let err = mw
            .run(ctx, Box::new(|c| Box::pin(async move { Ok(c) })))
            .await
            .unwrap_err();
        match err {
            PipelineError::UnresolvedPlaceholder { stage, .. } => assert_eq!(stage, "1-1"),
            other => panic!("expected UnresolvedPlaceholder, got {other:?}"),
        }
    }
}
