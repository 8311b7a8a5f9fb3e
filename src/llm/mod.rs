//! LLM Adapter: provider transport trait plus the tool-calling conversation
//! loop driver.

mod mock;
mod openai;

pub use mock::{MockProvider, ScriptedTurn};
pub use openai::OpenAiProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::function_registry::FunctionRegistry;
use crate::role::Role;
use crate::runtime::{
    CompletionMetadata, CompletionResult, FunctionCallMode, ParameterBag, PromptTurn,
    ResolvedFunctionDef, ResponseFormat, ToolCallAudit,
};

#[derive(Debug, thiserror::Error, Clone)]
pub enum ProviderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tool missing: {0}")]
    ToolMissing(String),
    #[error("tool loop exhausted after {0} rounds")]
    ToolLoopExhausted(u32),
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("cancelled")]
    Cancelled,
}

/// One message in the wire conversation sent to a provider.
#[derive(Clone, Debug)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
}

impl ProviderMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool call requested by the model, not yet executed.
#[derive(Clone, Debug)]
pub struct ProviderToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One provider round-trip result, before the adapter resolves tool calls.
#[derive(Clone, Debug, Default)]
pub struct RawCompletion {
    pub content: String,
    pub tool_calls: Vec<ProviderToolCall>,
    pub finish_reason: Option<String>,
    pub id: Option<String>,
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Resolved request parameters for one provider call, with §4.6 defaults applied.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub response_format: ResponseFormat,
    pub functions: Vec<ResolvedFunctionDef>,
    pub tools: Vec<ResolvedFunctionDef>,
    pub tool_choice: FunctionCallMode,
    pub allow_parallel_tool_calls: bool,
}

impl RequestOptions {
    pub fn from_parameters(bag: &ParameterBag, allow_parallel_tool_calls: bool) -> Self {
        let (functions, function_call) = match &bag.functions {
            Some(cfg) => (cfg.functions.clone(), cfg.function_call.clone()),
            None => (Vec::new(), FunctionCallMode::Auto),
        };
        let (tools, tool_call_from_tools) = match &bag.tools {
            Some(cfg) => (cfg.tools.clone(), cfg.function_call.clone()),
            None => (Vec::new(), FunctionCallMode::Auto),
        };
        let tool_choice = if bag.functions.is_some() {
            function_call
        } else {
            tool_call_from_tools
        };

        Self {
            max_tokens: bag.max_tokens.unwrap_or(4096),
            temperature: bag.temperature.unwrap_or(1.0),
            top_p: bag.top_p.unwrap_or(1.0),
            response_format: bag.response_format.clone().unwrap_or_default(),
            functions,
            tools,
            tool_choice,
            allow_parallel_tool_calls,
        }
    }

    fn has_callables(&self) -> bool {
        !self.functions.is_empty() || !self.tools.is_empty()
    }
}

/// Transport-level provider binding: one chat-completion round trip.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[ProviderMessage],
        options: &RequestOptions,
        ct: &CancellationToken,
    ) -> Result<RawCompletion, ProviderError>;
}

/// Configuration for the tool-calling conversation loop.
#[derive(Clone, Debug)]
pub struct LlmAdapterConfig {
    pub allow_parallel_tool_calls: bool,
    pub max_tool_rounds: u32,
}

impl Default for LlmAdapterConfig {
    fn default() -> Self {
        Self {
            allow_parallel_tool_calls: false,
            max_tool_rounds: 25,
        }
    }
}

/// Drives the tool-calling conversation loop over one `LlmProvider`, resolving
/// tool calls against a `FunctionRegistry` between provider round trips.
pub struct LlmAdapter {
    provider: Arc<dyn LlmProvider>,
    functions: Arc<dyn FunctionRegistry>,
    config: LlmAdapterConfig,
}

impl LlmAdapter {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        functions: Arc<dyn FunctionRegistry>,
        config: LlmAdapterConfig,
    ) -> Self {
        Self {
            provider,
            functions,
            config,
        }
    }

    /// Runs one user turn (with an optional preceding system turn) to completion,
    /// including any tool-call rounds.
    pub async fn complete(
        &self,
        session_id: &str,
        system_turn: Option<&PromptTurn>,
        user_turn: &PromptTurn,
        ct: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        if user_turn.role != Role::User {
            return Err(ProviderError::InvalidInput(
                "completion prompt's user turn must have role user".into(),
            ));
        }

        let options = RequestOptions::from_parameters(&user_turn.parameters, self.config.allow_parallel_tool_calls);

        let mut messages = Vec::new();
        if let Some(sys) = system_turn {
            messages.push(ProviderMessage::system(sys.content.clone()));
        }
        messages.push(ProviderMessage::user(user_turn.content.clone()));

        let mut all_audits = Vec::new();
        let mut rounds = 0u32;

        loop {
            if ct.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let raw = self.provider.complete_chat(&messages, &options, ct).await?;

            if raw.tool_calls.is_empty() {
                let metadata = CompletionMetadata {
                    id: raw.id,
                    model: raw.model,
                    finish_reason: raw.finish_reason,
                    tool_calls: all_audits,
                    input_tokens: raw.input_tokens,
                    output_tokens: raw.output_tokens,
                    total_tokens: raw.total_tokens,
                };
                return Ok(CompletionResult {
                    session_id: session_id.to_string(),
                    system_prompt: system_turn.map(|t| t.content.clone()),
                    user_prompt: user_turn.clone(),
                    content: raw.content,
                    metadata,
                });
            }

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                warn!(session_id, rounds, "tool-call loop exceeded configured bound");
                return Err(ProviderError::ToolLoopExhausted(self.config.max_tool_rounds));
            }

            let (audits, tool_messages) = self.execute_tool_calls(raw.tool_calls, ct).await?;
            all_audits.extend(audits);
            messages.extend(tool_messages);
        }
    }

    async fn execute_tool_calls(
        &self,
        calls: Vec<ProviderToolCall>,
        ct: &CancellationToken,
    ) -> Result<(Vec<ToolCallAudit>, Vec<ProviderMessage>), ProviderError> {
        if !self.config.allow_parallel_tool_calls {
            let mut audits = Vec::with_capacity(calls.len());
            let mut messages = Vec::with_capacity(calls.len());
            for call in calls {
                if ct.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                let (audit, message) = self.execute_one(call).await?;
                audits.push(audit);
                messages.push(message);
            }
            return Ok((audits, messages));
        }

        // Parallel execution: audits are collected in completion order,
        // not issue order — a `FuturesUnordered` drain, not `join_all`.
        let mut in_flight = FuturesUnordered::new();
        for call in calls {
            in_flight.push(self.execute_one(call));
        }
        let mut audits = Vec::new();
        let mut messages = Vec::new();
        while let Some(result) = in_flight.next().await {
            let (audit, message) = result?;
            audits.push(audit);
            messages.push(message);
        }
        Ok((audits, messages))
    }

    async fn execute_one(&self, call: ProviderToolCall) -> Result<(ToolCallAudit, ProviderMessage), ProviderError> {
        let function = self
            .functions
            .try_get(&call.name)
            .ok_or_else(|| ProviderError::ToolMissing(call.name.clone()))?;

        let arguments: Value = serde_json::from_str(&call.arguments)
            .map_err(|e| ProviderError::InvalidInput(format!("tool call arguments are not valid JSON: {e}")))?;

        info!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        let result = function
            .call(arguments.clone())
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let audit = ToolCallAudit {
            id: call.id.clone(),
            function_name: call.name,
            arguments,
            result: result.clone(),
        };
        let message = ProviderMessage::tool_result(call.id, result);
        Ok((audit, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_registry::{FunctionError, InProcessFunctionRegistry, ToolFunction, ToolFunctionSpec};
    use crate::runtime::ParameterBag;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<RawCompletion>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete_chat(
            &self,
            _messages: &[ProviderMessage],
            _options: &RequestOptions,
            _ct: &CancellationToken,
        ) -> Result<RawCompletion, ProviderError> {
            let mut guard = self.responses.lock().unwrap();
            if guard.is_empty() {
                return Err(ProviderError::Transport("script exhausted".into()));
            }
            Ok(guard.remove(0))
        }
    }

    struct Sum;

    #[async_trait]
    impl ToolFunction for Sum {
        fn spec(&self) -> ToolFunctionSpec {
            ToolFunctionSpec {
                name: "sum".into(),
                description: None,
                parameters: "{}".into(),
            }
        }
        async fn call(&self, args: Value) -> Result<String, FunctionError> {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok((a + b).to_string())
        }
    }

    fn user_turn(content: &str) -> PromptTurn {
        PromptTurn::user(content, "p1", ParameterBag::default())
    }

    #[tokio::test]
    async fn terminal_response_with_no_tool_calls_returns_immediately() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![RawCompletion {
                content: "hi".into(),
                id: Some("r1".into()),
                model: Some("m".into()),
                finish_reason: Some("stop".into()),
                ..Default::default()
            }]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        let adapter = LlmAdapter::new(provider, functions, LlmAdapterConfig::default());
        let result = adapter
            .complete("sess", None, &user_turn("Hello"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.content, "hi");
        assert_eq!(result.metadata.id, Some("r1".into()));
        assert!(result.metadata.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn tool_call_round_trip_executes_and_continues() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![
                RawCompletion {
                    tool_calls: vec![ProviderToolCall {
                        id: "call-1".into(),
                        name: "sum".into(),
                        arguments: r#"{"a":2,"b":3}"#.into(),
                    }],
                    ..Default::default()
                },
                RawCompletion {
                    content: "the answer is 5".into(),
                    finish_reason: Some("stop".into()),
                    ..Default::default()
                },
            ]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        functions.register("sum", Arc::new(Sum)).unwrap();
        let adapter = LlmAdapter::new(provider, functions, LlmAdapterConfig::default());
        let result = adapter
            .complete("sess", None, &user_turn("add"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.content, "the answer is 5");
        assert_eq!(result.metadata.tool_calls.len(), 1);
        assert_eq!(result.metadata.tool_calls[0].result, "5");
    }

    #[tokio::test]
    async fn unknown_tool_fails_tool_missing() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![RawCompletion {
                tool_calls: vec![ProviderToolCall {
                    id: "call-1".into(),
                    name: "unknown_fn".into(),
                    arguments: "{}".into(),
                }],
                ..Default::default()
            }]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        let adapter = LlmAdapter::new(provider, functions, LlmAdapterConfig::default());
        let err = adapter
            .complete("sess", None, &user_turn("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ToolMissing(name) if name == "unknown_fn"));
    }

    #[tokio::test]
    async fn tool_loop_exhaustion_fails_after_configured_rounds() {
        let responses: Vec<RawCompletion> = (0..5)
            .map(|i| RawCompletion {
                tool_calls: vec![ProviderToolCall {
                    id: format!("call-{i}"),
                    name: "sum".into(),
                    arguments: r#"{"a":1,"b":1}"#.into(),
                }],
                ..Default::default()
            })
            .collect();
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(responses),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        functions.register("sum", Arc::new(Sum)).unwrap();
        let adapter = LlmAdapter::new(
            provider,
            functions,
            LlmAdapterConfig {
                allow_parallel_tool_calls: false,
                max_tool_rounds: 3,
            },
        );
        let err = adapter
            .complete("sess", None, &user_turn("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ToolLoopExhausted(3)));
    }

    #[tokio::test]
    async fn non_user_role_turn_is_rejected() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        let adapter = LlmAdapter::new(provider, functions, LlmAdapterConfig::default());
        let bad_turn = PromptTurn::system("nope");
        let err = adapter
            .complete("sess", None, &bad_turn, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_provider_call() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![RawCompletion::default()]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        let adapter = LlmAdapter::new(provider, functions, LlmAdapterConfig::default());
        let ct = CancellationToken::new();
        ct.cancel();
        let err = adapter.complete("sess", None, &user_turn("x"), &ct).await.unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn parallel_tool_calls_collect_in_completion_order() {
        struct Delayed(u64, &'static str);
        #[async_trait]
        impl ToolFunction for Delayed {
            fn spec(&self) -> ToolFunctionSpec {
                ToolFunctionSpec {
                    name: self.1.into(),
                    description: None,
                    parameters: "{}".into(),
                }
            }
            async fn call(&self, _args: Value) -> Result<String, FunctionError> {
                tokio::time::sleep(Duration::from_millis(self.0)).await;
                Ok(self.1.to_string())
            }
        }

        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![
                RawCompletion {
                    tool_calls: vec![
                        ProviderToolCall {
                            id: "slow".into(),
                            name: "slow".into(),
                            arguments: "{}".into(),
                        },
                        ProviderToolCall {
                            id: "fast".into(),
                            name: "fast".into(),
                            arguments: "{}".into(),
                        },
                    ],
                    ..Default::default()
                },
                RawCompletion {
                    content: "done".into(),
                    ..Default::default()
                },
            ]),
        });
        let functions = Arc::new(InProcessFunctionRegistry::new());
        functions.register("slow", Arc::new(Delayed(30, "slow"))).unwrap();
        functions.register("fast", Arc::new(Delayed(1, "fast"))).unwrap();
        let adapter = LlmAdapter::new(
            provider,
            functions,
            LlmAdapterConfig {
                allow_parallel_tool_calls: true,
                max_tool_rounds: 25,
            },
        );
        let result = adapter
            .complete("sess", None, &user_turn("x"), &CancellationToken::new())
            .await
            .unwrap();
        let names: Vec<&str> = result
            .metadata
            .tool_calls
            .iter()
            .map(|a| a.function_name.as_str())
            .collect();
        assert_eq!(names, vec!["fast", "slow"]);
    }
}
