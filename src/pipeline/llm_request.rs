//! LlmRequestMiddleware: turns the stage into one
//! `CompletionPrompt` per user turn and drives each through the LLM Adapter,
//! in order.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::LlmAdapter;
use crate::runtime::{PromptTurn, RuntimeStage};

use super::{Next, PipelineError, StageExecutionContext, StageMiddleware};

/// One user turn paired with the stage's system turn, ready for the adapter.
#[derive(Clone, Debug)]
struct CompletionPrompt {
    system_turn: Option<PromptTurn>,
    user_turn: PromptTurn,
    /// Position of this prompt among the stage's user turns; carried in case a
    /// future context-window policy needs to know how deep into the stage a
    /// given turn sits.
    history_depth: usize,
}

fn to_completion_prompts(stage: &RuntimeStage) -> Vec<CompletionPrompt> {
    let system_turn = stage.system_turn().cloned();
    stage
        .user_turns()
        .enumerate()
        .map(|(history_depth, user_turn)| CompletionPrompt {
            system_turn: system_turn.clone(),
            user_turn: user_turn.clone(),
            history_depth,
        })
        .collect()
}

pub struct LlmRequestMiddleware {
    adapter: Arc<LlmAdapter>,
}

impl LlmRequestMiddleware {
    pub fn new(adapter: Arc<LlmAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl StageMiddleware for LlmRequestMiddleware {
    async fn run(&self, mut ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError> {
        let prompts = to_completion_prompts(&ctx.stage);
        for prompt in prompts {
            ctx.metadata.insert(
                format!("history_depth:{}", prompt.history_depth),
                Value::from(prompt.history_depth as u64),
            );
            let result = self
                .adapter
                .complete(&ctx.session_id, prompt.system_turn.as_ref(), &prompt.user_turn, &ctx.ct)
                .await?;
            ctx.results.push(result);
        }
        next(ctx).await
    }
}
