//! Canonical composition of context-store keys.
//!
//! All context-store reads/writes go through these constructors so that key
//! literals appear exactly once in the crate.

/// `"{stageId}-{turnIndex+1}"` — the composite key identifying one turn of one stage.
pub fn stage_key(stage_id: i64, turn_index: usize) -> String {
    format!("{}-{}", stage_id, turn_index + 1)
}

pub fn input(stage_key: &str, name: &str) -> String {
    format!("stage:{stage_key}:input:{name}")
}

pub fn input_param(stage_key: &str, name: &str) -> String {
    format!("stage:{stage_key}:input:params:{name}")
}

pub fn metadata(stage_key: &str, name: &str) -> String {
    format!("stage:{stage_key}:metadata:{name}")
}

pub fn tool(stage_key: &str, tool_name: &str, call_id: &str) -> String {
    format!("stage:{stage_key}:tool:{tool_name}:{call_id}")
}

pub fn output(stage_key: &str) -> String {
    format!("stage:{stage_key}:output")
}

pub fn output_param(stage_key: &str, name: &str) -> String {
    format!("stage:{stage_key}:output:params:{name}")
}

pub fn output_log(stage_key: &str, log_type: &str) -> String {
    format!("stage:{stage_key}:output:{log_type}")
}
