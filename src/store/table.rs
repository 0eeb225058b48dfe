//! KvStore implementation
//!
//! HashMap-based store with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Result, TxkvError};
use crate::txlog::{Event, EventType};

/// Guarded in-memory map
#[derive(Debug, Default)]
pub struct KvStore {
    data: RwLock<HashMap<String, String>>,
}

impl KvStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key, returning the value it replaced
    pub fn put(&self, key: &str, value: &str) -> Result<Option<String>> {
        if key.is_empty() {
            return Err(TxkvError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(self.data.write().insert(key.to_string(), value.to_string()))
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or(TxkvError::KeyNotFound)
    }

    /// Remove a key and return its value; absent keys report `KeyNotFound`
    pub fn delete(&self, key: &str) -> Result<String> {
        self.data.write().remove(key).ok_or(TxkvError::KeyNotFound)
    }

    /// Put back what a key held before a mutation: `None` removes it
    pub fn restore(&self, key: &str, previous: Option<String>) {
        let mut data = self.data.write();
        match previous {
            Some(value) => {
                data.insert(key.to_string(), value);
            }
            None => {
                data.remove(key);
            }
        }
    }

    /// Apply a replayed event. Deleting an absent key is not an error here:
    /// the log may legitimately hold deletes of keys that never existed.
    pub fn apply(&self, event: &Event) -> Result<()> {
        match event.event_type {
            EventType::Put => self.put(&event.key, &event.value).map(|_| ()),
            EventType::Delete => {
                self.data.write().remove(&event.key);
                Ok(())
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }
}
