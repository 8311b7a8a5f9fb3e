//! Context Store: two façades over session-keyed storage — a
//! bounded turn-history store and a general item store — used respectively by
//! conversation history and by the Stage Execution Pipeline's persistence step.

mod in_memory;

pub use in_memory::InMemoryContextStore;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ContextStoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Validated configuration for a turn store.
#[derive(Clone, Debug)]
pub struct TurnStoreConfig {
    pub key_prefix: String,
    pub default_ttl: Duration,
    pub default_max_turns: usize,
}

impl TurnStoreConfig {
    pub fn new(
        key_prefix: impl Into<String>,
        default_ttl: Duration,
        default_max_turns: usize,
    ) -> Result<Self, ContextStoreError> {
        let key_prefix = key_prefix.into();
        if key_prefix.is_empty() {
            return Err(ContextStoreError::InvalidArgument(
                "keyPrefix must be non-empty".into(),
            ));
        }
        if default_ttl.is_zero() {
            return Err(ContextStoreError::InvalidArgument(
                "defaultTtl must be > 0".into(),
            ));
        }
        if default_max_turns == 0 {
            return Err(ContextStoreError::InvalidArgument(
                "defaultMaxTurns must be > 0".into(),
            ));
        }
        Ok(Self {
            key_prefix,
            default_ttl,
            default_max_turns,
        })
    }
}

/// Bounded conversation-history store: prepend-and-trim semantics, newest first.
#[async_trait]
pub trait ContextTurnStore: Send + Sync {
    /// Prepends `turn` to the session's list; resets the list's TTL to `ttl`
    /// (or the store's configured default). The push and the TTL reset are atomic.
    async fn save_turn(
        &self,
        session_id: &str,
        turn: Value,
        ttl: Option<Duration>,
    ) -> Result<(), ContextStoreError>;

    /// Returns the newest `max_turns` entries (index 0 is newest). If the stored
    /// list exceeds the window, the excess is trimmed as a side effect. Missing
    /// or expired sessions return an empty list. `max_turns == Some(0)` is an
    /// invalid argument.
    async fn load_turns(
        &self,
        session_id: &str,
        max_turns: Option<usize>,
    ) -> Result<Vec<Value>, ContextStoreError>;
}

/// General-purpose session key-value store used by the pipeline for cross-stage data.
#[async_trait]
pub trait ContextItemStore: Send + Sync {
    async fn save_item(
        &self,
        session_id: &str,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), ContextStoreError>;

    /// Missing keys return `Ok(None)`, never an error.
    async fn load_item(&self, session_id: &str, key: &str) -> Result<Option<Value>, ContextStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_store_config_rejects_empty_prefix() {
        let err = TurnStoreConfig::new("", Duration::from_secs(60), 10).unwrap_err();
        assert!(matches!(err, ContextStoreError::InvalidArgument(_)));
    }

    #[test]
    fn turn_store_config_rejects_zero_ttl() {
        let err = TurnStoreConfig::new("p", Duration::ZERO, 10).unwrap_err();
        assert!(matches!(err, ContextStoreError::InvalidArgument(_)));
    }

    #[test]
    fn turn_store_config_rejects_zero_max_turns() {
        let err = TurnStoreConfig::new("p", Duration::from_secs(60), 0).unwrap_err();
        assert!(matches!(err, ContextStoreError::InvalidArgument(_)));
    }

    #[test]
    fn turn_store_config_accepts_valid_values() {
        assert!(TurnStoreConfig::new("p", Duration::from_secs(60), 10).is_ok());
    }
}
