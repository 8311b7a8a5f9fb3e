//! Runtime (post-build) representation of scenarios, stages, and turns, plus the
//! completion result shape produced by the LLM Adapter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::role::Role;

/// How a function may be invoked by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionCallMode {
    Auto,
    None,
    Specific(String),
}

impl Default for FunctionCallMode {
    fn default() -> Self {
        FunctionCallMode::Auto
    }
}

/// One function resolved to a concrete JSON schema string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedFunctionDef {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema literal for the function's parameters (strict).
    pub parameters: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionsConfig {
    pub functions: Vec<ResolvedFunctionDef>,
    pub function_call: FunctionCallMode,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub tools: Vec<ResolvedFunctionDef>,
    pub function_call: FunctionCallMode,
}

/// Resolved structured-output configuration for one user turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { schema: String },
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Text
    }
}

/// Typed per-turn parameter bag, resolved by the Scenario Builder.
///
/// The Scenario Builder is the sole writer of the typed fields; anything it does
/// not recognize is preserved verbatim in `extras` for forward compatibility.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterBag {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub functions: Option<FunctionsConfig>,
    pub tools: Option<ToolsConfig>,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

/// One turn in a built, runtime prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: Role,
    pub content: String,
    pub name: Option<String>,
    pub parameters: ParameterBag,
}

impl PromptTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
            parameters: ParameterBag::default(),
        }
    }

    pub fn user(content: impl Into<String>, name: impl Into<String>, parameters: ParameterBag) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: Some(name.into()),
            parameters,
        }
    }
}

/// One stage of a built scenario: `turns` is `[system?, user1, user2, ...]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeStage {
    pub id: i64,
    pub name: String,
    pub turns: Vec<PromptTurn>,
    pub model: Option<String>,
    pub parameters: ParameterBag,
}

impl RuntimeStage {
    /// Turns with role `User`, in declared order.
    pub fn user_turns(&self) -> impl Iterator<Item = &PromptTurn> {
        self.turns.iter().filter(|t| t.role == Role::User)
    }

    /// The single system turn, if one was emitted.
    pub fn system_turn(&self) -> Option<&PromptTurn> {
        self.turns.iter().find(|t| t.role == Role::System)
    }
}

/// A built scenario: ready to run against the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeScenario {
    pub name: String,
    pub stages: Vec<RuntimeStage>,
    pub metadata: HashMap<String, String>,
}

/// A single tool invocation issued by the model and executed locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallAudit {
    pub id: String,
    pub function_name: String,
    pub arguments: Value,
    pub result: String,
}

/// Metadata attached to one `CompletionResult`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionMetadata {
    pub id: Option<String>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub tool_calls: Vec<ToolCallAudit>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// The model's terminal response to one user turn, plus audit metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionResult {
    pub session_id: String,
    pub system_prompt: Option<String>,
    pub user_prompt: PromptTurn,
    pub content: String,
    pub metadata: CompletionMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_stage_separates_system_from_user_turns() {
        let stage = RuntimeStage {
            id: 1,
            name: "s".into(),
            turns: vec![
                PromptTurn::system("be nice"),
                PromptTurn::user("hi", "p1", ParameterBag::default()),
                PromptTurn::user("bye", "p2", ParameterBag::default()),
            ],
            model: None,
            parameters: ParameterBag::default(),
        };
        assert!(stage.system_turn().is_some());
        assert_eq!(stage.user_turns().count(), 2);
    }

    #[test]
    fn function_call_mode_defaults_to_auto() {
        assert_eq!(FunctionCallMode::default(), FunctionCallMode::Auto);
    }
}
