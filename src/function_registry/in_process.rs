//! `dashmap`-backed, case-insensitive function registry: keys are stored
//! lower-cased so lookups don't depend on the caller's casing.

use std::sync::Arc;

use dashmap::DashMap;

use super::{FunctionError, FunctionRegistry, ToolFunction};

#[derive(Default)]
pub struct InProcessFunctionRegistry {
    functions: DashMap<String, Arc<dyn ToolFunction>>,
}

impl InProcessFunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl FunctionRegistry for InProcessFunctionRegistry {
    fn register(&self, name: &str, function: Arc<dyn ToolFunction>) -> Result<(), FunctionError> {
        if name.trim().is_empty() {
            return Err(FunctionError::InvalidInput("function name must be non-empty".into()));
        }
        self.functions.insert(normalize(name), function);
        Ok(())
    }

    fn try_get(&self, name: &str) -> Option<Arc<dyn ToolFunction>> {
        self.functions.get(&normalize(name)).map(|e| e.value().clone())
    }

    fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
