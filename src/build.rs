//! Scenario Builder: lowers a validated `ScenarioDefinition` to the runtime form.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::definition::{
    FunctionDefinitionEntry, FunctionsDefinition, ResponseFormatConfig, ResponseFormatType,
    ScenarioDefinition, StageDefinition, ToolDefinitionEntry, UserPromptDefinition,
};
use crate::runtime::{
    FunctionCallMode, FunctionsConfig, ParameterBag, PromptTurn, ResolvedFunctionDef,
    ResponseFormat, RuntimeScenario, RuntimeStage, ToolsConfig,
};
use crate::schema::SchemaProvider;
use crate::validate::validate;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioBuildError {
    #[error("scenario definition is invalid: {0:?}")]
    Invalid(Vec<crate::validate::ValidationError>),
    #[error("invalid definition at {path}: {message}")]
    InvalidAt { path: String, message: String },
}

/// Lowers a validated scenario definition into its runtime representation.
pub fn build(
    def: &ScenarioDefinition,
    schema_provider: &dyn SchemaProvider,
) -> Result<RuntimeScenario, ScenarioBuildError> {
    let violations = validate(def);
    if !violations.is_empty() {
        return Err(ScenarioBuildError::Invalid(violations));
    }

    let mut stages = Vec::with_capacity(def.stages.len());
    for stage in &def.stages {
        stages.push(build_stage(stage, schema_provider)?);
    }

    Ok(RuntimeScenario {
        name: def.name.clone(),
        stages,
        metadata: def.metadata.clone(),
    })
}

fn build_stage(
    stage: &StageDefinition,
    schema_provider: &dyn SchemaProvider,
) -> Result<RuntimeStage, ScenarioBuildError> {
    let mut turns = Vec::new();

    if let Some(sp) = &stage.system_prompt {
        if !sp.is_empty() {
            turns.push(PromptTurn::system(sp.clone()));
        }
    }

    let functions = stage
        .functions
        .as_ref()
        .map(|f| build_functions_config(f, schema_provider))
        .transpose()?;
    let tools = stage
        .tools
        .as_ref()
        .map(|t| build_tools_config(t, schema_provider))
        .transpose()?;

    for (i, prompt) in stage.user_prompts.iter().enumerate() {
        let parameters = build_turn_parameters(stage, prompt, schema_provider, &functions, &tools)?;
        let name = format!("{}-p{}", stage.name, i + 1);
        turns.push(PromptTurn::user(prompt.template.clone(), name, parameters));
    }

    let parameters = ParameterBag {
        temperature: stage.temperature,
        top_p: stage.top_p,
        max_tokens: stage.max_tokens,
        response_format: None,
        functions,
        tools,
        extras: json_map(&stage.parameters),
    };

    Ok(RuntimeStage {
        id: stage.id,
        name: stage.name.clone(),
        turns,
        model: stage.model.clone(),
        parameters,
    })
}

fn build_turn_parameters(
    stage: &StageDefinition,
    prompt: &UserPromptDefinition,
    schema_provider: &dyn SchemaProvider,
    functions: &Option<FunctionsConfig>,
    tools: &Option<ToolsConfig>,
) -> Result<ParameterBag, ScenarioBuildError> {
    let response_format = prompt
        .response_format_config
        .as_ref()
        .map(|c| resolve_response_format(c, schema_provider))
        .transpose()?;

    Ok(ParameterBag {
        temperature: prompt.temperature.or(stage.temperature),
        top_p: prompt.top_p.or(stage.top_p),
        max_tokens: prompt.max_tokens.or(stage.max_tokens),
        response_format,
        functions: functions.clone(),
        tools: tools.clone(),
        extras: json_map(&prompt.parameters),
    })
}

fn resolve_response_format(
    config: &ResponseFormatConfig,
    schema_provider: &dyn SchemaProvider,
) -> Result<ResponseFormat, ScenarioBuildError> {
    match config.kind {
        ResponseFormatType::Text => Ok(ResponseFormat::Text),
        ResponseFormatType::JsonObject => Ok(ResponseFormat::JsonObject),
        ResponseFormatType::JsonSchema => {
            match (&config.schema, &config.response_type_name) {
                (Some(schema), None) => Ok(ResponseFormat::JsonSchema {
                    schema: schema.clone(),
                }),
                (None, Some(type_name)) => match schema_provider.resolve(type_name) {
                    Some(schema) => Ok(ResponseFormat::JsonSchema { schema }),
                    None => {
                        warn!(type_name, "schema not resolvable, downgrading to JsonObject");
                        Ok(ResponseFormat::JsonObject)
                    }
                },
                _ => Err(ScenarioBuildError::InvalidAt {
                    path: "responseFormatConfig".into(),
                    message:
                        "exactly one of schema or responseTypeName must be present for JsonSchema"
                            .into(),
                }),
            }
        }
    }
}

fn resolve_function_def(
    entry: &FunctionDefinitionEntry,
    schema_provider: &dyn SchemaProvider,
) -> ResolvedFunctionDef {
    let parameters = match (&entry.parameters_type, &entry.parameters) {
        (Some(type_name), _) => schema_provider
            .resolve(type_name)
            .unwrap_or_else(|| "{}".to_string()),
        (None, Some(literal)) => literal.clone(),
        (None, None) => "{}".to_string(),
    };
    ResolvedFunctionDef {
        name: entry.name.clone(),
        description: entry.description.clone(),
        parameters,
    }
}

fn resolve_function_call_mode(raw: Option<&str>) -> FunctionCallMode {
    match raw {
        None => FunctionCallMode::Auto,
        Some(s) if s.eq_ignore_ascii_case("auto") => FunctionCallMode::Auto,
        Some(s) if s.eq_ignore_ascii_case("none") => FunctionCallMode::None,
        Some(name) => FunctionCallMode::Specific(name.to_string()),
    }
}

fn build_functions_config(
    def: &FunctionsDefinition,
    schema_provider: &dyn SchemaProvider,
) -> Result<FunctionsConfig, ScenarioBuildError> {
    Ok(FunctionsConfig {
        functions: def
            .functions
            .iter()
            .map(|f| resolve_function_def(f, schema_provider))
            .collect(),
        function_call: resolve_function_call_mode(def.function_call.as_deref()),
    })
}

fn build_tools_config(
    defs: &[ToolDefinitionEntry],
    schema_provider: &dyn SchemaProvider,
) -> Result<ToolsConfig, ScenarioBuildError> {
    Ok(ToolsConfig {
        tools: defs
            .iter()
            .map(|t| resolve_function_def(&t.function, schema_provider))
            .collect(),
        function_call: FunctionCallMode::Auto,
    })
}

fn json_map(map: &HashMap<String, Value>) -> serde_json::Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
