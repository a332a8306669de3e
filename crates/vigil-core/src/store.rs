//! External collaborator contracts.
//!
//! The engine performs no network I/O. These traits describe the durable
//! store and identity provider the host brings; the engine consumes their
//! results and produces commands for the host to execute. The store is
//! treated as a keyed document map -- no query language is assumed.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Key space of the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The current user's own document.
    User(String),
    /// One side's view of a relationship.
    Contact(String),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::User(id) => write!(f, "user:{id}"),
            StoreKey::Contact(id) => write!(f, "contact:{id}"),
        }
    }
}

/// Keyed document store with change subscriptions.
pub trait DurableStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Value>, StoreError>;

    fn put(&mut self, key: &StoreKey, value: Value) -> Result<(), StoreError>;

    /// Stream of values written to `key` after the subscription is taken.
    /// Used to mirror counterpart-owned relationship state.
    fn subscribe(&mut self, key: &StoreKey) -> mpsc::UnboundedReceiver<Value>;
}

/// Authenticates a phone number to a stable user identifier. The engine only
/// consumes the result.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// In-memory store for tests and hosts that bring their own sync layer.
#[derive(Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    /// When set, the next `fail_puts` writes fail with a transient error.
    fail_puts: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` puts fail, to exercise retry paths.
    pub fn fail_next_puts(&mut self, count: u32) {
        self.fail_puts = count;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(&key.to_string()).cloned())
    }

    fn put(&mut self, key: &StoreKey, value: Value) -> Result<(), StoreError> {
        if self.fail_puts > 0 {
            self.fail_puts -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        let key = key.to_string();
        if let Some(senders) = self.subscribers.get_mut(&key) {
            senders.retain(|tx| tx.send(value.clone()).is_ok());
        }
        self.values.insert(key, value);
        Ok(())
    }

    fn subscribe(&mut self, key: &StoreKey) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(key.to_string()).or_default().push(tx);
        rx
    }
}

/// Identity provider double with a fixed answer.
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_render_with_prefix() {
        assert_eq!(StoreKey::User("u1".into()).to_string(), "user:u1");
        assert_eq!(StoreKey::Contact("c1".into()).to_string(), "contact:c1");
    }

    #[test]
    fn put_get_roundtrip() {
        let mut store = MemoryStore::new();
        let key = StoreKey::User("u1".into());
        store.put(&key, json!({"last_check_in": "2026-01-01T00:00:00Z"})).unwrap();
        let value = store.get(&key).unwrap().unwrap();
        assert_eq!(value["last_check_in"], "2026-01-01T00:00:00Z");
        assert!(store.get(&StoreKey::User("u2".into())).unwrap().is_none());
    }

    #[test]
    fn subscription_sees_later_writes() {
        let mut store = MemoryStore::new();
        let key = StoreKey::Contact("c1".into());
        let mut rx = store.subscribe(&key);

        store.put(&key, json!({"v": 1})).unwrap();
        store.put(&key, json!({"v": 2})).unwrap();

        assert_eq!(rx.try_recv().unwrap()["v"], 1);
        assert_eq!(rx.try_recv().unwrap()["v"], 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn injected_failures_then_recovery() {
        let mut store = MemoryStore::new();
        let key = StoreKey::User("u1".into());
        store.fail_next_puts(1);
        assert!(store.put(&key, json!({})).is_err());
        assert!(store.put(&key, json!({})).is_ok());
    }

    #[test]
    fn static_identity() {
        assert!(StaticIdentity::signed_in("u1").is_authenticated());
        assert!(!StaticIdentity::signed_out().is_authenticated());
    }
}
