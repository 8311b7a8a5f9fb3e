//! Function Registry: a case-insensitive, name-addressed table of callable tool
//! implementations.

mod in_process;

pub use in_process::InProcessFunctionRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Error raised by a `ToolFunction` call or by registry operations.
#[derive(Debug, thiserror::Error, Clone)]
pub enum FunctionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("function not registered: {0}")]
    NotFound(String),
    #[error("function execution failed: {0}")]
    Execution(String),
}

/// One callable tool: JSON-in, JSON-string-out.
#[derive(Clone, Debug)]
pub struct ToolFunctionSpec {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema literal for this function's parameters.
    pub parameters: String,
}

#[async_trait]
pub trait ToolFunction: Send + Sync {
    fn spec(&self) -> ToolFunctionSpec;
    async fn call(&self, args: Value) -> Result<String, FunctionError>;
}

/// Name-addressed table of tool implementations.
pub trait FunctionRegistry: Send + Sync {
    /// Registers (replacing any existing entry) a function under `name`.
    fn register(&self, name: &str, function: Arc<dyn ToolFunction>) -> Result<(), FunctionError>;
    fn try_get(&self, name: &str) -> Option<Arc<dyn ToolFunction>>;
    fn registered_names(&self) -> Vec<String>;
}
