//! Scripted mock provider for deterministic tool-calling-loop tests: replays a
//! fixed, stateful sequence of tool-call rounds followed by a terminal completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{LlmProvider, ProviderError, ProviderMessage, ProviderToolCall, RawCompletion, RequestOptions};

/// One scripted provider response: either a terminal completion or a round of
/// tool calls to be resolved before the script advances.
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
    Completion {
        content: String,
        finish_reason: Option<String>,
    },
    ToolCalls(Vec<ProviderToolCall>),
}

/// Replays a fixed sequence of responses regardless of the messages it receives.
/// Exhausting the script is a transport error, surfacing a bug in the test rather
/// than silently looping.
pub struct MockProvider {
    script: Vec<ScriptedTurn>,
    cursor: AtomicUsize,
    calls: Mutex<Vec<Vec<ProviderMessage>>>,
}

impl MockProvider {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Messages passed to each recorded call, in order, for assertions.
    pub fn recorded_calls(&self) -> Vec<Vec<ProviderMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete_chat(
        &self,
        messages: &[ProviderMessage],
        _options: &RequestOptions,
        ct: &CancellationToken,
    ) -> Result<RawCompletion, ProviderError> {
        if ct.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        self.calls.lock().unwrap().push(messages.to_vec());

        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let turn = self
            .script
            .get(index)
            .ok_or_else(|| ProviderError::Transport("mock provider script exhausted".into()))?;

        Ok(match turn {
            ScriptedTurn::Completion { content, finish_reason } => RawCompletion {
                content: content.clone(),
                finish_reason: finish_reason.clone(),
                ..Default::default()
            },
            ScriptedTurn::ToolCalls(calls) => RawCompletion {
                tool_calls: calls.clone(),
                ..Default::default()
            },
        })
    }
}
