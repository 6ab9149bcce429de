//! Byte-oriented key-value stores underneath the index

mod file;
mod memory;

pub use file::FileStore;
pub use file::STORE_MAGIC;
pub use file::STORE_VERSION;
pub use memory::MemoryStore;

use crate::error::StorageResult;
use std::sync::Arc;

/// Narrow storage contract consumed by the index.
///
/// Implementations are shared between threads; every method takes `&self`.
/// Writes only have to be durable after [`KeyValueStore::flush`] returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removing an absent key is not an error
    fn remove(&self, key: &[u8]) -> StorageResult<()>;

    fn keys(&self) -> StorageResult<Vec<Vec<u8>>>;

    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        let mut keys = self.keys()?;
        keys.retain(|key| key.starts_with(prefix));
        Ok(keys)
    }

    fn flush(&self) -> StorageResult<()>;

    /// Drop every entry
    fn clear(&self) -> StorageResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<Vec<u8>>> {
        (**self).keys()
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        (**self).keys_with_prefix(prefix)
    }

    fn flush(&self) -> StorageResult<()> {
        (**self).flush()
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }
}
