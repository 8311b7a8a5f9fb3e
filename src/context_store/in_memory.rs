//! In-memory Context Store. Not persistent — a namespace-joined map keyed by
//! session and item key, with TTL and turn-count eviction layered on top.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{ContextItemStore, ContextStoreError, ContextTurnStore, TurnStoreConfig};

struct TtlEntry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> TtlEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory implementation of both Context Store façades.
///
/// TTL is tracked as an absolute `Instant`, checked lazily on read and swept
/// opportunistically on write — no background reaper; reads of expired entries
/// simply behave as absent.
pub struct InMemoryContextStore {
    config: TurnStoreConfig,
    turns: RwLock<HashMap<String, TtlEntry<Vec<Value>>>>,
    items: RwLock<HashMap<(String, String), TtlEntry<Value>>>,
}

impl InMemoryContextStore {
    pub fn new(config: TurnStoreConfig) -> Self {
        Self {
            config,
            turns: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
        }
    }

    fn turn_key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, session_id)
    }
}

#[async_trait]
impl ContextTurnStore for InMemoryContextStore {
    async fn save_turn(
        &self,
        session_id: &str,
        turn: Value,
        ttl: Option<Duration>,
    ) -> Result<(), ContextStoreError> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(ContextStoreError::InvalidArgument("ttl must be > 0".into()));
        }
        let key = self.turn_key(session_id);
        let now = Instant::now();
        let mut guard = self.turns.write().await;
        let entry = guard.entry(key).or_insert_with(|| TtlEntry {
            value: Vec::new(),
            expires_at: now,
        });
        if entry.is_expired(now) {
            entry.value.clear();
        }
        entry.value.insert(0, turn);
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn load_turns(
        &self,
        session_id: &str,
        max_turns: Option<usize>,
    ) -> Result<Vec<Value>, ContextStoreError> {
        if let Some(0) = max_turns {
            return Err(ContextStoreError::InvalidArgument(
                "maxTurns must be > 0".into(),
            ));
        }
        let window = max_turns.unwrap_or(self.config.default_max_turns);
        let key = self.turn_key(session_id);
        let now = Instant::now();
        let mut guard = self.turns.write().await;
        let Some(entry) = guard.get_mut(&key) else {
            return Ok(Vec::new());
        };
        if entry.is_expired(now) {
            guard.remove(&key);
            return Ok(Vec::new());
        }
        if entry.value.len() > window {
            entry.value.truncate(window);
        }
        Ok(entry.value.clone())
    }
}

#[async_trait]
impl ContextItemStore for InMemoryContextStore {
    async fn save_item(
        &self,
        session_id: &str,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), ContextStoreError> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(ContextStoreError::InvalidArgument("ttl must be > 0".into()));
        }
        let now = Instant::now();
        self.items.write().await.insert(
            (session_id.to_string(), key.to_string()),
            TtlEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn load_item(&self, session_id: &str, key: &str) -> Result<Option<Value>, ContextStoreError> {
        let now = Instant::now();
        let map_key = (session_id.to_string(), key.to_string());
        let mut guard = self.items.write().await;
        match guard.get(&map_key) {
            Some(entry) if entry.is_expired(now) => {
                guard.remove(&map_key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> InMemoryContextStore {
        InMemoryContextStore::new(TurnStoreConfig::new("sess:", Duration::from_secs(60), 10).unwrap())
    }

    #[tokio::test]
    async fn save_and_load_item_round_trips() {
        let s = store();
        s.save_item("sess1", "k", json!("v"), None).await.unwrap();
        assert_eq!(s.load_item("sess1", "k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn missing_item_returns_none_not_error() {
        let s = store();
        assert_eq!(s.load_item("sess1", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_positive_ttl_is_rejected() {
        let s = store();
        let err = s
            .save_item("sess1", "k", json!("v"), Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, ContextStoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn expired_item_behaves_as_absent() {
        let s = store();
        s.save_item("sess1", "k", json!("v"), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(s.load_item("sess1", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_turn_prepends_newest_first() {
        let s = store();
        s.save_turn("sess1", json!("a"), None).await.unwrap();
        s.save_turn("sess1", json!("b"), None).await.unwrap();
        let turns = s.load_turns("sess1", None).await.unwrap();
        assert_eq!(turns, vec![json!("b"), json!("a")]);
    }

    #[tokio::test]
    async fn load_turns_trims_to_window() {
        let s = store();
        for i in 0..5 {
            s.save_turn("sess1", json!(i), None).await.unwrap();
        }
        let turns = s.load_turns("sess1", Some(2)).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns, vec![json!(4), json!(3)]);
    }

    #[tokio::test]
    async fn load_turns_zero_max_is_invalid() {
        let s = store();
        let err = s.load_turns("sess1", Some(0)).await.unwrap_err();
        assert!(matches!(err, ContextStoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn missing_session_turns_return_empty() {
        let s = store();
        assert_eq!(s.load_turns("nope", None).await.unwrap(), Vec::<Value>::new());
    }

    #[tokio::test]
    async fn expired_turn_list_behaves_as_absent() {
        let s = store();
        s.save_turn("sess1", json!("a"), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(s.load_turns("sess1", None).await.unwrap(), Vec::<Value>::new());
    }

    #[tokio::test]
    async fn concurrent_saves_are_safe() {
        let s = std::sync::Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                s.save_item("sess1", &format!("k{i}"), json!(i), None).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for i in 0..20 {
            assert_eq!(s.load_item("sess1", &format!("k{i}")).await.unwrap(), Some(json!(i)));
        }
    }
}
