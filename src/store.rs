//! Persistence for sessions.
//!
//! Values are opaque bytes, so that a store never needs to understand the
//! protocol. Keys are namespaced strings, built with [key].
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Error;
use crate::session::SessionId;

/// Build the key under which something about a session lives.
pub fn key(namespace: &str, session: &SessionId) -> String {
    format!("{namespace}/{session}")
}

/// A key value store, which sessions are persisted to.
pub trait SessionStore: Send + Sync {
    /// Load the value under a key, if there is one.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Save a value under a key, replacing any previous value.
    fn save(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;

    /// Append one contribution to the list under a key.
    fn append_contribution(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;

    /// Every contribution appended under a key, in order.
    fn contributions(&self, key: &str) -> Result<Vec<Vec<u8>>, Error>;
}

/// A store which keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    contributions: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn append_contribution(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut contributions = self
            .contributions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        contributions.entry(key.to_string()).or_default().push(value);
        Ok(())
    }

    fn contributions(&self, key: &str) -> Result<Vec<Vec<u8>>, Error> {
        let contributions = self
            .contributions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(contributions.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_memory_store() -> Result<(), Error> {
        let store = MemoryStore::new();
        let id = SessionId::from_bytes([1; 32]);
        let k = key("key", &id);
        assert!(k.starts_with("key/0101"));

        assert_eq!(store.load(&k)?, None);
        store.save(&k, vec![1, 2])?;
        store.save(&k, vec![3])?;
        assert_eq!(store.load(&k)?, Some(vec![3]));

        assert!(store.contributions(&k)?.is_empty());
        store.append_contribution(&k, vec![4])?;
        store.append_contribution(&k, vec![5])?;
        assert_eq!(store.contributions(&k)?, vec![vec![4], vec![5]]);
        Ok(())
    }
}
