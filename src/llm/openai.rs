//! OpenAI-compatible chat-completions provider binding, with `response_format`,
//! function/tool schemas, and retry/backoff on transport errors.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject,
    ResponseFormat as OpenAiResponseFormat, ResponseFormatJsonSchema, ToolChoiceOptions,
};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::role::Role;
use crate::runtime::{FunctionCallMode, ResolvedFunctionDef, ResponseFormat};

use super::{LlmProvider, ProviderError, ProviderMessage, ProviderToolCall, RawCompletion, RequestOptions};

/// Configuration for one model's OpenAI-compatible client.
#[derive(Clone, Debug)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>, timeout_seconds: u64) -> Result<Self, ProviderError> {
        if timeout_seconds == 0 {
            return Err(ProviderError::InvalidInput("timeoutSeconds must be > 0".into()));
        }
        Ok(Self {
            api_key: api_key.into(),
            base_url: None,
            organization_id: None,
            project_id: None,
            timeout_seconds,
            max_retries: 5,
        })
    }
}

/// One model's OpenAI-compatible chat-completions client.
pub struct OpenAiProvider {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, config: OpenAiProviderConfig) -> Self {
        let mut oai_config = OpenAIConfig::new().with_api_key(config.api_key);
        if let Some(base_url) = config.base_url {
            oai_config = oai_config.with_api_base(base_url);
        }
        if let Some(org) = config.organization_id {
            oai_config = oai_config.with_org_id(org);
        }
        if let Some(project) = config.project_id {
            oai_config = oai_config.with_project_id(project);
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            client: async_openai::Client::with_config(oai_config).with_http_client(http_client),
            model: model.into(),
            max_retries: config.max_retries,
        }
    }

    fn messages_to_request(messages: &[ProviderMessage]) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => Ok(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(m.content.as_str()),
                )),
                Role::User => Ok(ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(
                    m.content.as_str(),
                ))),
                Role::Assistant => Ok(ChatCompletionRequestMessage::Assistant(m.content.as_str().into())),
                Role::Function => {
                    let call_id = m.tool_call_id.clone().ok_or_else(|| {
                        ProviderError::InvalidInput("tool message is missing its tool_call_id".into())
                    })?;
                    Ok(ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                        content: m.content.clone().into(),
                        tool_call_id: call_id,
                    }))
                }
            })
            .collect()
    }

    fn function_objects(defs: &[ResolvedFunctionDef]) -> Vec<FunctionObject> {
        defs.iter()
            .map(|f| FunctionObject {
                name: f.name.clone(),
                description: f.description.clone(),
                parameters: serde_json::from_str(&f.parameters).ok(),
                strict: Some(true),
            })
            .collect()
    }

    fn tool_choice_option(mode: &FunctionCallMode) -> ChatCompletionToolChoiceOption {
        match mode {
            FunctionCallMode::Auto => ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto),
            FunctionCallMode::None => ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::None),
            FunctionCallMode::Specific(name) => {
                ChatCompletionToolChoiceOption::Function(async_openai::types::chat::ChatCompletionNamedToolChoice {
                    function: async_openai::types::chat::FunctionName { name: name.clone() },
                })
            }
        }
    }

    async fn send(
        &self,
        messages: &[ProviderMessage],
        options: &RequestOptions,
        ct: &CancellationToken,
    ) -> Result<RawCompletion, ProviderError> {
        let oai_messages = Self::messages_to_request(messages)?;
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(oai_messages);
        args.max_tokens(options.max_tokens);
        args.temperature(options.temperature as f32);
        args.top_p(options.top_p as f32);

        match &options.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonObject => {
                args.response_format(OpenAiResponseFormat::JsonObject);
            }
            ResponseFormat::JsonSchema { schema } => {
                if let Ok(json_schema) = serde_json::from_str(schema) {
                    args.response_format(OpenAiResponseFormat::JsonSchema {
                        json_schema: ResponseFormatJsonSchema {
                            description: None,
                            name: "response".to_string(),
                            schema: Some(json_schema),
                            strict: Some(true),
                        },
                    });
                }
            }
        }

        if options.has_callables() {
            let defs = if !options.functions.is_empty() {
                &options.functions
            } else {
                &options.tools
            };
            let tools: Vec<ChatCompletionTools> = Self::function_objects(defs)
                .into_iter()
                .map(|function| ChatCompletionTools::Function(ChatCompletionTool { function }))
                .collect();
            args.tools(tools);
            args.tool_choice(Self::tool_choice_option(&options.tool_choice));
        }

        let request = args
            .build()
            .map_err(|e| ProviderError::InvalidInput(format!("request build failed: {e}")))?;

        debug!(model = %self.model, "sending chat completion request");
        if let Ok(js) = serde_json::to_string(&request) {
            trace!(model = %self.model, request = %js, "request body");
        }

        if ct.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Transport("provider returned no choices".into()))?;
        let message = choice.message;
        let content = message.content.unwrap_or_default();
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| match tc {
                ChatCompletionMessageToolCalls::Function(f) => Some(ProviderToolCall {
                    id: f.id,
                    name: f.function.name,
                    arguments: f.function.arguments,
                }),
                ChatCompletionMessageToolCalls::Custom(_) => None,
            })
            .collect();

        Ok(RawCompletion {
            content,
            tool_calls,
            finish_reason: choice.finish_reason.map(|fr| format!("{fr:?}")),
            id: Some(response.id),
            model: Some(response.model),
            input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens as u64),
            output_tokens: response.usage.as_ref().map(|u| u.completion_tokens as u64),
            total_tokens: response.usage.as_ref().map(|u| u.total_tokens as u64),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete_chat(
        &self,
        messages: &[ProviderMessage],
        options: &RequestOptions,
        ct: &CancellationToken,
    ) -> Result<RawCompletion, ProviderError> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        let attempt = std::sync::atomic::AtomicU32::new(0);
        retry(backoff, || async {
            let attempt = attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            match self.send(messages, options, ct).await {
                Ok(completion) => Ok(completion),
                Err(ProviderError::Transport(msg)) if attempt <= self.max_retries => {
                    warn!(attempt, max_retries = self.max_retries, error = %msg, "retrying transport error");
                    Err(backoff::Error::transient(ProviderError::Transport(msg)))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}
