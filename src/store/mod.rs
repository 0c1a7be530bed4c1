//! Local key-value storage for layout and view state.
//!
//! Two backends implement [`KvStore`]:
//!
//! - [`MemStore`]: in-process only, backed by DashMap
//! - [`DurableStore`]: on-disk, backed by redb
//!
//! Keys are namespaced strings (`<fingerprint>:positions`, ...); values are
//! opaque bytes, JSON-encoded by the layout manager.

pub mod durable;
pub mod mem;

use crate::error::StoreError;

pub use durable::DurableStore;
pub use mem::MemStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Minimal key-value interface used by the layout manager.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;
    /// Delete a key. Returns whether the key existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;
    /// All keys starting with `prefix`, in key order.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    fn contains(&self, key: &str) -> StoreResult<bool> {
        self.get(key).map(|v| v.is_some())
    }
}

/// Open the backend for an optional data directory: redb when given, memory otherwise.
pub fn open_store(data_dir: Option<&std::path::Path>) -> StoreResult<Box<dyn KvStore>> {
    match data_dir {
        Some(dir) => Ok(Box::new(DurableStore::open(dir)?)),
        None => Ok(Box::new(MemStore::new())),
    }
}
