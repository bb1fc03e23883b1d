//!
//! velovis storage module
//! ----------------------
//! Durable keyed storage for client state that must survive restarts. Values are
//! JSON documents addressed by a fixed key; the crate owns two of them:
//! `auth-storage` (the serialized session) and `cart-storage` (guest cart items).
//!
//! The `Storage` trait is the seam: `FileStorage` keeps one `<key>.json` per key
//! under a directory, `MemoryStorage` keeps everything in process memory.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientResult;

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key of the persisted session document.
pub const AUTH_STORAGE_KEY: &str = "auth-storage";
/// Key of the persisted guest cart document.
pub const CART_STORAGE_KEY: &str = "cart-storage";

pub trait Storage: Send + Sync {
    fn load(&self, key: &str) -> ClientResult<Option<Value>>;
    fn save(&self, key: &str, value: &Value) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
}

pub type SharedStorage = Arc<dyn Storage>;

/// Load and decode a typed document. A document that no longer decodes is treated as absent.
pub fn load_typed<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> ClientResult<Option<T>> {
    let Some(raw) = storage.load(key)? else { return Ok(None); };
    match serde_json::from_value::<T>(raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(target: "velovis::storage", "discarding undecodable document key='{}': {}", key, e);
            Ok(None)
        }
    }
}

pub fn save_typed<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> ClientResult<()> {
    let raw = serde_json::to_value(value)?;
    storage.save(key, &raw)
}
