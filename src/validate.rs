//! Scenario Validator: enforces well-formedness of a parsed definition.

use crate::definition::ScenarioDefinition;

/// One validation failure, addressed by a dotted property path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub property_path: String,
    pub message: String,
}

impl ValidationError {
    fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

/// Validates a scenario definition, returning every violation found (not just the first).
pub fn validate(def: &ScenarioDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if def.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "name must be non-empty"));
    }
    if def.valid_models.is_empty() {
        errors.push(ValidationError::new(
            "validModels",
            "validModels must be non-empty",
        ));
    }
    if def.stages.is_empty() {
        errors.push(ValidationError::new("stages", "stages must be non-empty"));
        return errors;
    }

    for (i, stage) in def.stages.iter().enumerate() {
        let path = format!("stages[{i}]");
        if stage.user_prompts.is_empty() {
            errors.push(ValidationError::new(
                format!("{path}.userPrompts"),
                "stage must have at least one user-prompt template",
            ));
        }
        for (j, prompt) in stage.user_prompts.iter().enumerate() {
            let prompt_path = format!("{path}.userPrompts[{j}]");
            let temperature = prompt.temperature.or(stage.temperature);
            if let Some(t) = temperature {
                if !(0.0..=1.0).contains(&t) {
                    errors.push(ValidationError::new(
                        format!("{prompt_path}.temperature"),
                        "temperature must be within 0..=1",
                    ));
                }
            }
            let top_p = prompt.top_p.or(stage.top_p);
            if let Some(p) = top_p {
                if !(0.0..=1.0).contains(&p) {
                    errors.push(ValidationError::new(
                        format!("{prompt_path}.topP"),
                        "topP must be within 0..=1",
                    ));
                }
            }
            let max_tokens = prompt.max_tokens.or(stage.max_tokens);
            if let Some(m) = max_tokens {
                if m == 0 {
                    errors.push(ValidationError::new(
                        format!("{prompt_path}.maxTokens"),
                        "maxTokens must be > 0 when present",
                    ));
                }
            }
        }
    }

    errors
}
