//! ContextStoreMiddleware: after `next()`,
//! persists every result of the stage. All writes for all results go out
//! concurrently; the middleware awaits their joint completion.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use serde_json::Value;

use crate::context_store::{ContextItemStore, ContextStoreError};
use crate::key;
use crate::runtime::CompletionResult;

use super::{Next, PipelineError, StageExecutionContext, StageMiddleware};

pub struct ContextStoreMiddleware {
    store: Arc<dyn ContextItemStore>,
}

impl ContextStoreMiddleware {
    pub fn new(store: Arc<dyn ContextItemStore>) -> Self {
        Self { store }
    }

    fn writes_for<'a>(
        &'a self,
        session_id: &'a str,
        stage_key: String,
        result: &'a CompletionResult,
    ) -> Vec<BoxFuture<'a, Result<(), ContextStoreError>>> {
        let mut writes: Vec<BoxFuture<'a, Result<(), ContextStoreError>>> = Vec::new();
        let save = move |k: String, v: Value| -> BoxFuture<'a, Result<(), ContextStoreError>> {
            Box::pin(async move { self.store.save_item(session_id, &k, v, None).await })
        };

        if let Some(system_prompt) = &result.system_prompt {
            if !system_prompt.is_empty() {
                writes.push(save(key::input(&stage_key, "system_prompt"), Value::String(system_prompt.clone())));
            }
        }

        writes.push(save(
            key::input(&stage_key, "user_prompt"),
            Value::String(result.user_prompt.content.clone()),
        ));

        for (param_key, param_value) in &result.user_prompt.parameters.extras {
            writes.push(save(key::input_param(&stage_key, param_key), param_value.clone()));
        }

        let output_record = serde_json::from_str(&result.content).unwrap_or_else(|_| Value::String(result.content.clone()));
        writes.push(save(key::output(&stage_key), output_record));

        let execution_id = result.metadata.id.clone().unwrap_or_else(|| stage_key.clone());
        writes.push(save(key::output_param(&stage_key, "execution_id"), Value::String(execution_id)));

        if let Some(model) = &result.metadata.model {
            writes.push(save(key::metadata(&stage_key, "output_model"), Value::String(model.clone())));
        }
        if let Some(finish_reason) = &result.metadata.finish_reason {
            writes.push(save(
                key::metadata(&stage_key, "finish_reason"),
                Value::String(finish_reason.clone()),
            ));
        }

        for audit in &result.metadata.tool_calls {
            if let Ok(audit_json) = serde_json::to_value(audit) {
                writes.push(save(key::tool(&stage_key, &audit.function_name, &audit.id), audit_json));
            }
        }

        if let Some(input_tokens) = result.metadata.input_tokens {
            writes.push(save(key::metadata(&stage_key, "input_tokens"), Value::from(input_tokens)));
        }
        if let Some(output_tokens) = result.metadata.output_tokens {
            writes.push(save(key::metadata(&stage_key, "output_tokens"), Value::from(output_tokens)));
        }
        if let Some(total_tokens) = result.metadata.total_tokens {
            writes.push(save(key::metadata(&stage_key, "total_tokens"), Value::from(total_tokens)));
        }

        writes
    }
}

#[async_trait]
impl StageMiddleware for ContextStoreMiddleware {
    async fn run(&self, ctx: StageExecutionContext, next: Next) -> Result<StageExecutionContext, PipelineError> {
        let ctx = next(ctx).await?;

        let mut writes = Vec::new();
        for (index, result) in ctx.results.iter().enumerate() {
            let stage_key = key::stage_key(ctx.stage.id, index);
            writes.extend(self.writes_for(&ctx.session_id, stage_key, result));
        }
        try_join_all(writes).await?;

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_store::{InMemoryContextStore, TurnStoreConfig};
    use crate::runtime::{CompletionMetadata, ParameterBag, PromptTurn, RuntimeStage, ToolCallAudit};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn store() -> Arc<InMemoryContextStore> {
        Arc::new(InMemoryContextStore::new(
            TurnStoreConfig::new("sess:", Duration::from_secs(60), 10).unwrap(),
        ))
    }

    fn stage() -> RuntimeStage {
        RuntimeStage {
            id: 1,
            name: "s".into(),
            turns: vec![],
            model: None,
            parameters: ParameterBag::default(),
        }
    }

    fn sample_result() -> CompletionResult {
        let mut params = ParameterBag::default();
        params.extras.insert("topic".into(), json!("rust"));
        CompletionResult {
            session_id: "s1".into(),
            system_prompt: Some("be nice".into()),
            user_prompt: PromptTurn::user("hello", "p1", params),
            content: "hi there".into(),
            metadata: CompletionMetadata {
                id: Some("resp-1".into()),
                model: Some("gpt-4o-mini".into()),
                finish_reason: Some("stop".into()),
                tool_calls: vec![ToolCallAudit {
                    id: "call-1".into(),
                    function_name: "sum".into(),
                    arguments: json!({"a": 1, "b": 2}),
                    result: "3".into(),
                }],
                input_tokens: Some(10),
                output_tokens: Some(5),
                total_tokens: Some(15),
            },
        }
    }

    #[tokio::test]
    async fn persists_every_field_under_its_canonical_key() {
        let store = store();
        let mw = ContextStoreMiddleware::new(store.clone());
        let mut ctx = StageExecutionContext::new("s1", stage(), HashMap::new(), CancellationToken::new());
        ctx.results.push(sample_result());

        let next: Next = {
            let ctx = ctx.clone();
            Box::new(move |_| Box::pin(async move { Ok(ctx) }))
        };
        mw.run(ctx, next).await.unwrap();

        assert_eq!(
            store.load_item("s1", "stage:1-1:input:system_prompt").await.unwrap(),
            Some(json!("be nice"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:input:user_prompt").await.unwrap(),
            Some(json!("hello"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:input:params:topic").await.unwrap(),
            Some(json!("rust"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:output").await.unwrap(),
            Some(json!("hi there"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:output:params:execution_id").await.unwrap(),
            Some(json!("resp-1"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:metadata:output_model").await.unwrap(),
            Some(json!("gpt-4o-mini"))
        );
        assert_eq!(
            store.load_item("s1", "stage:1-1:metadata:finish_reason").await.unwrap(),
            Some(json!("stop"))
        );
        assert!(store
            .load_item("s1", "stage:1-1:tool:sum:call-1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            store.load_item("s1", "stage:1-1:metadata:input_tokens").await.unwrap(),
            Some(json!(10))
        );
    }

    #[tokio::test]
    async fn empty_system_prompt_is_not_persisted() {
        let store = store();
        let mw = ContextStoreMiddleware::new(store.clone());
        let mut result = sample_result();
        result.system_prompt = Some(String::new());
        let mut ctx = StageExecutionContext::new("s1", stage(), HashMap::new(), CancellationToken::new());
        ctx.results.push(result);

        let next: Next = {
            let ctx = ctx.clone();
            Box::new(move |_| Box::pin(async move { Ok(ctx) }))
        };
        mw.run(ctx, next).await.unwrap();

        assert_eq!(
            store.load_item("s1", "stage:1-1:input:system_prompt").await.unwrap(),
            None
        );
    }
}
