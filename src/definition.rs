//! Declarative scenario definition: the shape parsed directly from YAML/JSON files.
//! camelCase on the wire, snake_case in Rust.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub valid_models: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub stages: Vec<StageDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub user_prompts: Vec<UserPromptDefinition>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub functions: Option<FunctionsDefinition>,
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinitionEntry>>,
    /// Stage-level fallback, propagated to user prompts that don't override it.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptDefinition {
    pub template: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub response_format_config: Option<ResponseFormatConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormatType {
    Text,
    JsonObject,
    JsonSchema,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFormatConfig {
    #[serde(rename = "type")]
    pub kind: ResponseFormatType,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub response_type_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinitionEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub parameters_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionsDefinition {
    pub functions: Vec<FunctionDefinitionEntry>,
    #[serde(default)]
    pub function_call: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinitionEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinitionEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_round_trips_through_yaml() {
        let def = ScenarioDefinition {
            name: "echo".into(),
            version: "1".into(),
            description: "".into(),
            valid_models: vec!["gpt-4o".into()],
            metadata: HashMap::new(),
            stages: vec![StageDefinition {
                id: 1,
                name: "s1".into(),
                description: None,
                system_prompt: None,
                user_prompts: vec![UserPromptDefinition {
                    template: "Hello {{sessionId}}".into(),
                    parameters: HashMap::new(),
                    temperature: None,
                    top_p: None,
                    max_tokens: None,
                    response_format_config: None,
                }],
                model: None,
                parameters: HashMap::new(),
                functions: None,
                tools: None,
                temperature: None,
                top_p: None,
                max_tokens: None,
            }],
        };
        let yaml = serde_yaml::to_string(&def).unwrap();
        let back: ScenarioDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.name, def.name);
        assert_eq!(back.stages[0].user_prompts[0].template, def.stages[0].user_prompts[0].template);
    }

    #[test]
    fn camel_case_keys_accepted_from_wire_format() {
        let json = r#"{
            "name": "x",
            "validModels": ["m"],
            "stages": [{
                "id": 1,
                "name": "s",
                "userPrompts": [{"template": "hi"}]
            }]
        }"#;
        let def: ScenarioDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.valid_models, vec!["m".to_string()]);
        assert_eq!(def.stages[0].user_prompts[0].template, "hi");
    }
}
