//! Map-backed index over a [`KeyValueStore`].
//!
//! Store layout, one byte of prefix per entry family:
//!
//! | prefix | key | value |
//! |---|---|---|
//! | `0x00` | - | index version, `u32` LE |
//! | `0x01` | bincode(key) | bincode(container record) |
//! | `0x02` | file id, `u32` LE | bincode(keys contributed by the file) |
//!
//! Containers are cached in a [`DashMap`] and replaced copy-on-write under the
//! entry lock, so readers holding an `Arc` keep a consistent view while writers
//! move on. Changes reach the store on [`MapIndex::flush`].
//!
//! A container is loaded from the store at most once: cache misses load while
//! holding the entry lock, and published containers (empty ones included) stay
//! cached until [`MapIndex::clear`]. Memory therefore grows with the set of
//! keys touched since open, as does the forward map of updated files.

use crate::container::ContainerRecord;
use crate::container::FileId;
use crate::container::ValueContainer;
use crate::error::Result;
use crate::error::StorageError;
use crate::index::KeyIndex;
use crate::scope::SearchScope;
use crate::store::KeyValueStore;
use ahash::AHashMap;
use ahash::AHashSet;
use dashmap::DashMap;
use dashmap::DashSet;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use tracing::debug;
use tracing::info;
use tracing::warn;

const VERSION_KEY: &[u8] = &[0x00];
const INVERTED_PREFIX: u8 = 0x01;
const FORWARD_PREFIX: u8 = 0x02;

/// Bounds shared by index keys and values
pub trait IndexItem: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync {}

impl<T: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync> IndexItem for T {}

pub struct MapIndex<K, V, S> {
    store: S,
    version: u32,
    containers: DashMap<K, Arc<ValueContainer<V>>>,
    forward: DashMap<FileId, Vec<K>>,
    dirty_keys: DashSet<K>,
    dirty_files: DashSet<FileId>,
    flush_lock: Mutex<()>,
}

impl<K, V, S> MapIndex<K, V, S>
where
    K: IndexItem,
    V: IndexItem,
    S: KeyValueStore,
{
    /// Open an index over `store`.
    ///
    /// A store stamped with a different (or no) version is wiped and stamped
    /// with `version`, so the caller has to rebuild the index.
    pub fn open(store: S, version: u32) -> Result<Self> {
        let expected = version.to_le_bytes();
        match store.get(VERSION_KEY)? {
            Some(found) if found == expected => {
                info!("Opened index version {}", version);
            }
            Some(found) => {
                warn!(
                    "Index version changed ({:?} -> {}), discarding stored entries",
                    found, version
                );
                store.clear()?;
                store.put(VERSION_KEY, &expected)?;
            }
            None => {
                debug!("Stamping empty index with version {}", version);
                store.clear()?;
                store.put(VERSION_KEY, &expected)?;
            }
        }

        Ok(Self {
            store,
            version,
            containers: DashMap::new(),
            forward: DashMap::new(),
            dirty_keys: DashSet::new(),
            dirty_files: DashSet::new(),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace everything `file` contributed with `entries`.
    ///
    /// Every container involved is loaded before the first one changes, so a
    /// store fault leaves the index as it was.
    pub fn update(&self, file: FileId, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let mut grouped: AHashMap<K, Vec<V>> = AHashMap::new();
        for (key, value) in entries {
            grouped.entry(key).or_default().push(value);
        }

        let previous = self.forward_keys(file)?;
        for key in previous.iter().chain(grouped.keys()) {
            self.ensure_cached(key)?;
        }

        for key in &previous {
            if !grouped.contains_key(key) {
                self.modify(key, |container| {
                    container.remove_file(file);
                });
            }
        }
        for (key, values) in &grouped {
            self.modify(key, |container| {
                container.remove_file(file);
                for value in values {
                    container.add(file, value.clone());
                }
            });
        }

        let keys: Vec<K> = grouped.into_keys().collect();
        debug!(
            "Indexed file {} with {} keys (previously {})",
            file,
            keys.len(),
            previous.len()
        );
        if keys.is_empty() {
            self.forward.remove(&file);
        } else {
            self.forward.insert(file, keys);
        }
        self.dirty_files.insert(file);
        Ok(())
    }

    /// Drop every occurrence contributed by `file`; returns whether it had any
    pub fn remove_file(&self, file: FileId) -> Result<bool> {
        let previous = self.forward_keys(file)?;
        for key in &previous {
            self.ensure_cached(key)?;
        }
        for key in &previous {
            self.modify(key, |container| {
                container.remove_file(file);
            });
        }
        self.forward.remove(&file);
        self.dirty_files.insert(file);
        debug!("Removed file {} from {} keys", file, previous.len());
        Ok(!previous.is_empty())
    }

    /// Write every pending change to the store and flush it
    pub fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let keys: Vec<K> = self.dirty_keys.iter().map(|key| key.clone()).collect();
        for key in &keys {
            self.dirty_keys.remove(key);
            if let Err(e) = self.write_container(key) {
                self.dirty_keys.insert(key.clone());
                return Err(e);
            }
        }

        let files: Vec<FileId> = self.dirty_files.iter().map(|file| *file).collect();
        for file in &files {
            self.dirty_files.remove(file);
            if let Err(e) = self.write_forward(*file) {
                self.dirty_files.insert(*file);
                return Err(e);
            }
        }

        self.store.flush()?;
        debug!("Flushed {} keys and {} files", keys.len(), files.len());
        Ok(())
    }

    /// Forget every entry, in memory and in the store
    pub fn clear(&self) -> Result<()> {
        self.containers.clear();
        self.forward.clear();
        self.dirty_keys.clear();
        self.dirty_files.clear();
        self.store.clear()?;
        self.store.put(VERSION_KEY, &self.version.to_le_bytes())?;
        info!("Cleared index version {}", self.version);
        Ok(())
    }

    /// Bring the stored container of `key` into the cache, empty if there is none
    fn ensure_cached(&self, key: &K) -> Result<()> {
        if self.containers.contains_key(key) {
            return Ok(());
        }
        if let Entry::Vacant(entry) = self.containers.entry(key.clone()) {
            let container = self.load(key)?.unwrap_or_default();
            entry.insert(Arc::new(container));
        }
        Ok(())
    }

    /// Apply `change` to a private copy of the key's cached container and publish it
    fn modify(&self, key: &K, change: impl FnOnce(&mut ValueContainer<V>)) {
        // Only `clear` drops cached containers; starting empty matches the wiped store.
        let mut entry = self.containers.entry(key.clone()).or_default();
        change(Arc::make_mut(entry.value_mut()));
        drop(entry);
        self.dirty_keys.insert(key.clone());
    }

    fn load(&self, key: &K) -> Result<Option<ValueContainer<V>>> {
        let Some(bytes) = self.store.get(&inverted_key(key)?)? else {
            return Ok(None);
        };
        let record: ContainerRecord<V> = decode(&bytes)?;
        Ok(Some(ValueContainer::from_record(record)))
    }

    fn forward_keys(&self, file: FileId) -> Result<Vec<K>> {
        if let Some(keys) = self.forward.get(&file) {
            return Ok(keys.value().clone());
        }
        if self.dirty_files.contains(&file) {
            // Removed in memory, not yet flushed
            return Ok(Vec::new());
        }
        match self.store.get(&forward_key(file))? {
            Some(bytes) => decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn write_container(&self, key: &K) -> Result<()> {
        let store_key = inverted_key(key)?;
        let container = self
            .containers
            .get(key)
            .map(|entry| Arc::clone(entry.value()));
        match container {
            Some(container) if !container.is_empty() => {
                let bytes = encode(&container.to_record())?;
                self.store.put(&store_key, &bytes)?;
            }
            _ => self.store.remove(&store_key)?,
        }
        Ok(())
    }

    fn write_forward(&self, file: FileId) -> Result<()> {
        let keys = self.forward.get(&file).map(|keys| keys.value().clone());
        match keys {
            Some(keys) => {
                let bytes = encode(&keys)?;
                self.store.put(&forward_key(file), &bytes)?;
            }
            None => self.store.remove(&forward_key(file))?,
        }
        Ok(())
    }

    /// Cached and stored keys accepted by `key_filter`, with their containers
    fn snapshot(
        &self,
        key_filter: Option<&dyn Fn(&K) -> bool>,
    ) -> Result<Vec<(K, Arc<ValueContainer<V>>)>> {
        let accepts = |key: &K| key_filter.is_none_or(|filter| filter(key));

        let mut seen: AHashSet<K> = AHashSet::new();
        let mut snapshot = Vec::new();
        for entry in self.containers.iter() {
            seen.insert(entry.key().clone());
            if accepts(entry.key()) {
                snapshot.push((entry.key().clone(), Arc::clone(entry.value())));
            }
        }

        for store_key in self.store.keys_with_prefix(&[INVERTED_PREFIX])? {
            let key: K = decode(&store_key[1..])?;
            if seen.contains(&key) || !accepts(&key) {
                continue;
            }
            if let Some(container) = self.load(&key)? {
                snapshot.push((key, Arc::new(container)));
            }
        }
        Ok(snapshot)
    }
}

impl<K, V, S> KeyIndex<K, V> for MapIndex<K, V, S>
where
    K: IndexItem,
    V: IndexItem,
    S: KeyValueStore,
{
    fn get_data(&self, key: &K) -> Result<Arc<ValueContainer<V>>> {
        if let Some(entry) = self.containers.get(key) {
            return Ok(Arc::clone(entry.value()));
        }
        match self.containers.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                // Loaded under the entry lock, so no writer can publish in between.
                // Unknown keys are not cached; a failed load caches nothing either.
                let Some(container) = self.load(key)? else {
                    return Ok(Arc::new(ValueContainer::new()));
                };
                let container = Arc::new(container);
                entry.insert(Arc::clone(&container));
                Ok(container)
            }
        }
    }

    fn process_all_keys(
        &self,
        visitor: &mut dyn FnMut(&K) -> bool,
        scope: &dyn SearchScope,
        key_filter: Option<&dyn Fn(&K) -> bool>,
    ) -> Result<bool> {
        for (key, container) in self.snapshot(key_filter)? {
            if container.is_empty() || !container.any_file(|file| scope.contains(file)) {
                continue;
            }
            if !visitor(&key) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn inverted_key<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    let mut bytes = vec![INVERTED_PREFIX];
    bytes.extend(encode(key)?);
    Ok(bytes)
}

fn forward_key(file: FileId) -> Vec<u8> {
    let mut bytes = vec![FORWARD_PREFIX];
    bytes.extend_from_slice(&file.as_raw().to_le_bytes());
    bytes
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(StorageError::from)?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(StorageError::from)?;
    if read != bytes.len() {
        return Err(StorageError::Corrupted(format!(
            "{} trailing bytes after index record",
            bytes.len() - read
        ))
        .into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::FileSetScope;
    use crate::scope::GlobalScope;
    use crate::store::MemoryStore;
    use crate::error::StorageResult;
    use pretty_assertions::assert_eq;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use std::time::Instant;

    const A: FileId = FileId::new(1);
    const B: FileId = FileId::new(2);

    type TestIndex = MapIndex<String, u32, Arc<MemoryStore>>;

    fn open(store: &Arc<MemoryStore>) -> TestIndex {
        MapIndex::open(Arc::clone(store), 1).unwrap()
    }

    fn entries(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    fn all_keys(index: &TestIndex, scope: &dyn SearchScope) -> Vec<String> {
        let mut keys = Vec::new();
        index
            .process_all_keys(
                &mut |key| {
                    keys.push(key.clone());
                    true
                },
                scope,
                None,
            )
            .unwrap();
        keys.sort();
        keys
    }

    fn all_keys_of<S: KeyValueStore>(index: &MapIndex<String, u32, S>) -> Vec<String> {
        let mut keys = Vec::new();
        index
            .process_all_keys(
                &mut |key| {
                    keys.push(key.clone());
                    true
                },
                &GlobalScope,
                None,
            )
            .unwrap();
        keys
    }

    #[test]
    fn test_update_replaces_previous_contribution() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index.update(A, entries(&[("foo", 1), ("bar", 2)])).unwrap();
        index.update(A, entries(&[("foo", 3)])).unwrap();

        let foo = index.get_data(&"foo".to_string()).unwrap();
        assert_eq!(foo.len(), 1);
        assert!(foo.contains(&3));
        assert!(!foo.contains(&1));
        assert!(index.get_data(&"bar".to_string()).unwrap().is_empty());
        assert_eq!(all_keys(&index, &GlobalScope), vec!["foo"]);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index.update(A, entries(&[("foo", 1)])).unwrap();

        let before = index.get_data(&"foo".to_string()).unwrap();
        index.update(B, entries(&[("foo", 1)])).unwrap();
        let after = index.get_data(&"foo".to_string()).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_flush_and_reopen() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index.update(A, entries(&[("foo", 1), ("bar", 2)])).unwrap();
        index.update(B, entries(&[("foo", 1)])).unwrap();
        index.flush().unwrap();
        drop(index);

        let reopened = open(&store);
        let foo = reopened.get_data(&"foo".to_string()).unwrap();
        assert_eq!(foo.files_of(&1), &[A, B]);
        assert_eq!(
            all_keys(&reopened, &FileSetScope::new([B])),
            vec!["foo"]
        );

        // Forward entries survive too, so removal still finds the keys
        assert!(reopened.remove_file(A).unwrap());
        reopened.flush().unwrap();
        assert_eq!(all_keys(&reopened, &GlobalScope), vec!["foo"]);
        assert!(!reopened.remove_file(A).unwrap());
    }

    #[test]
    fn test_version_change_wipes_store() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index.update(A, entries(&[("foo", 1)])).unwrap();
        index.flush().unwrap();
        drop(index);

        let upgraded: TestIndex = MapIndex::open(Arc::clone(&store), 2).unwrap();
        assert_eq!(upgraded.version(), 2);
        assert!(upgraded.get_data(&"foo".to_string()).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_process_all_keys_applies_filter_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index
            .update(A, entries(&[("alpha", 1), ("beta", 2), ("gamma", 3)]))
            .unwrap();

        let mut visited = Vec::new();
        let completed = index
            .process_all_keys(
                &mut |key| {
                    visited.push(key.clone());
                    true
                },
                &GlobalScope,
                Some(&|key: &String| key.starts_with('a') || key.starts_with('g')),
            )
            .unwrap();
        visited.sort();
        assert!(completed);
        assert_eq!(visited, vec!["alpha", "gamma"]);

        let mut count = 0;
        let completed = index
            .process_all_keys(
                &mut |_| {
                    count += 1;
                    false
                },
                &GlobalScope,
                None,
            )
            .unwrap();
        assert!(!completed);
        assert_eq!(count, 1);
    }

    /// Store that parks the first armed `get` of `key` after reading its bytes
    struct GatedStore {
        inner: MemoryStore,
        key: Vec<u8>,
        armed: AtomicBool,
        parked: Barrier,
        release: Barrier,
    }

    impl KeyValueStore for GatedStore {
        fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
            let bytes = self.inner.get(key)?;
            if key == self.key.as_slice() && self.armed.swap(false, Ordering::SeqCst) {
                self.parked.wait();
                self.release.wait();
            }
            Ok(bytes)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
            self.inner.put(key, value)
        }

        fn remove(&self, key: &[u8]) -> StorageResult<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> StorageResult<Vec<Vec<u8>>> {
            self.inner.keys()
        }

        fn flush(&self) -> StorageResult<()> {
            Ok(())
        }

        fn clear(&self) -> StorageResult<()> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_slow_load_does_not_resurrect_removed_file() {
        let foo = "foo".to_string();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            key: inverted_key(&foo).unwrap(),
            armed: AtomicBool::new(false),
            parked: Barrier::new(2),
            release: Barrier::new(2),
        });
        {
            let index: MapIndex<String, u32, _> = MapIndex::open(Arc::clone(&store), 1).unwrap();
            index.update(A, entries(&[("foo", 1)])).unwrap();
            index.flush().unwrap();
        }

        let index: MapIndex<String, u32, _> = MapIndex::open(Arc::clone(&store), 1).unwrap();
        store.armed.store(true, Ordering::SeqCst);
        let removed = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| index.get_data(&foo).unwrap().len());
            store.parked.wait();

            scope.spawn(|| {
                assert!(index.remove_file(A).unwrap());
                index.flush().unwrap();
                removed.store(true, Ordering::SeqCst);
            });
            // Give the writer the chance to finish while the reader is parked.
            let deadline = Instant::now() + Duration::from_millis(200);
            while !removed.load(Ordering::SeqCst) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            store.release.wait();
            assert_eq!(reader.join().unwrap(), 1);
        });

        assert!(removed.load(Ordering::SeqCst));
        assert!(index.get_data(&foo).unwrap().is_empty());
        assert!(all_keys_of(&index).is_empty());
        assert_eq!(store.inner.get(&inverted_key(&foo).unwrap()).unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let store = Arc::new(MemoryStore::new());
        let index = open(&store);
        index.update(A, entries(&[("foo", 1)])).unwrap();
        index.flush().unwrap();
        index.clear().unwrap();

        assert!(all_keys(&index, &GlobalScope).is_empty());
        assert_eq!(store.get(VERSION_KEY).unwrap(), Some(1u32.to_le_bytes().to_vec()));
    }
}
