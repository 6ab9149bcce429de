use super::KeyValueStore;
use crate::error::StorageResult;
use std::collections::BTreeMap;
use std::sync::PoisonError;
use std::sync::RwLock;

/// Volatile store; `flush` is a no-op
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .range(prefix.to_vec()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_put_get_remove() {
        let store = MemoryStore::new();
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        store.remove(b"a").unwrap();
        store.remove(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = MemoryStore::new();
        for key in [&b"\x01b"[..], b"\x01a", b"\x02a", b"\x00"] {
            store.put(key, b"").unwrap();
        }
        assert_eq!(
            store.keys_with_prefix(b"\x01").unwrap(),
            vec![b"\x01a".to_vec(), b"\x01b".to_vec()]
        );
        assert_eq!(store.keys().unwrap().len(), 4);

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
