use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::Storage;
use crate::error::ClientResult;

/// Process-local storage; contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> ClientResult<Option<Value>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> ClientResult<()> {
        self.map.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.map.write().remove(key);
        Ok(())
    }
}
