//! Snapshot-file store.
//!
//! The whole map lives in memory and is written out on [`FileStore::flush`]:
//!
//! ```text
//! "DIDX" | version: u16 LE | payload length: u32 LE | payload | sha256(payload)
//! payload = frame(bincode(sorted (key, value) pairs))
//! ```
//!
//! See [`crate::compression`] for the payload frame.
//!
//! A snapshot is written to a sibling temporary file first and then renamed
//! over the previous one, so readers never observe a half-written snapshot.

use super::KeyValueStore;
use crate::compression::CompressionLevel;
use crate::compression::Compressor;
use crate::config::IndexConfig;
use crate::error::StorageError;
use crate::error::StorageResult;
use sha2::Digest;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Header of a store snapshot
pub const STORE_MAGIC: &[u8] = b"DIDX";

/// Current snapshot layout version
pub const STORE_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = STORE_MAGIC.len() + 2 + 4;

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    compressor: Compressor,
    entries: RwLock<Entries>,
    dirty: AtomicBool,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty when it does not exist yet
    pub fn open(path: impl Into<PathBuf>, level: CompressionLevel) -> StorageResult<Self> {
        let path = path.into();
        let compressor = Compressor::new(level);

        let entries = if path.exists() {
            let bytes = fs::read(&path)?;
            let entries = read_snapshot(&bytes).inspect_err(|e| {
                warn!("Failed to load index snapshot {:?}: {}", path, e);
            })?;
            info!(
                "Loaded index snapshot {:?} with {} entries",
                path,
                entries.len()
            );
            entries
        } else {
            debug!("No index snapshot at {:?}, starting empty", path);
            Entries::new()
        };

        Ok(Self {
            path,
            compressor,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    /// Open the snapshot inside the configured storage directory, creating it if needed
    pub fn open_with_config(config: &IndexConfig) -> StorageResult<Self> {
        fs::create_dir_all(&config.storage_dir)?;
        Self::open(config.snapshot_path(), config.compression)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether changes are waiting for the next flush
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.write().insert(key.to_vec(), value.to_vec());
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        if self.write().remove(key).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self.read().keys().cloned().collect())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self
            .read()
            .range(prefix.to_vec()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn flush(&self) -> StorageResult<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        // Hold the read lock until the snapshot is renamed into place so a
        // concurrent writer cannot slip in between encoding and the rename.
        let entries = self.read();
        let result = write_snapshot(&self.path, &entries, &self.compressor);
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn clear(&self) -> StorageResult<()> {
        let mut entries = self.write();
        if !entries.is_empty() {
            entries.clear();
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }
}

fn write_snapshot(path: &Path, entries: &Entries, compressor: &Compressor) -> StorageResult<()> {
    let encoded = bincode::serde::encode_to_vec(entries, bincode::config::standard())?;
    let payload = compressor.pack(&encoded)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        StorageError::Corrupted(format!("snapshot payload of {} bytes", payload.len()))
    })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + DIGEST_LEN);
    bytes.extend_from_slice(STORE_MAGIC);
    bytes.extend_from_slice(&STORE_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&Sha256::digest(&payload));

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    // Write to temporary file first
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &bytes)?;

    // Atomic rename
    fs::rename(&temp_path, path)?;

    info!(
        "Flushed {} entries to {:?} ({} -> {} bytes, compressed: {})",
        entries.len(),
        path,
        encoded.len(),
        payload.len(),
        Compressor::is_compressed(&payload)
    );
    Ok(())
}

fn read_snapshot(bytes: &[u8]) -> StorageResult<Entries> {
    if bytes.len() < HEADER_LEN + DIGEST_LEN {
        return Err(StorageError::Corrupted(format!(
            "snapshot of {} bytes is shorter than its header",
            bytes.len()
        )));
    }
    if &bytes[..STORE_MAGIC.len()] != STORE_MAGIC {
        return Err(StorageError::InvalidMagic);
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != STORE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: version,
            expected: STORE_VERSION,
        });
    }

    let payload_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    if bytes.len() != HEADER_LEN + payload_len + DIGEST_LEN {
        return Err(StorageError::Corrupted(format!(
            "payload length {payload_len} does not match snapshot size {}",
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + payload_len];
    let digest = &bytes[HEADER_LEN + payload_len..];
    if Sha256::digest(payload).as_slice() != digest {
        return Err(StorageError::Corrupted("checksum mismatch".to_string()));
    }

    let decoded = Compressor::unpack(payload)?;
    let (entries, _): (Entries, _) =
        bincode::serde::decode_from_slice(&decoded, bincode::config::standard())?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::open(dir.path().join("index.didx"), CompressionLevel::Fast).unwrap()
    }

    #[test]
    fn test_reopen_after_flush() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.put(b"\x01alpha", b"one").unwrap();
        store.put(b"\x01beta", b"two").unwrap();
        store.remove(b"\x01beta").unwrap();
        assert!(store.is_dirty());
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert!(!dir.path().join("index.tmp").exists());

        let reopened = store_in(&dir);
        assert_eq!(reopened.keys().unwrap(), vec![b"\x01alpha".to_vec()]);
        assert_eq!(reopened.get(b"\x01alpha").unwrap(), Some(b"one".to_vec()));
    }

    #[test]
    fn test_snapshot_reopens_under_another_level() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.didx");
        let value = "java.lang.Object ".repeat(64);

        let store = FileStore::open(&path, CompressionLevel::Off).unwrap();
        store.put(b"\x01object", value.as_bytes()).unwrap();
        store.flush().unwrap();

        let reopened = FileStore::open(&path, CompressionLevel::Maximum).unwrap();
        assert_eq!(
            reopened.get(b"\x01object").unwrap(),
            Some(value.into_bytes())
        );
    }

    #[test]
    fn test_unflushed_writes_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.put(b"k", b"v").unwrap();
        drop(store);

        assert!(store_in(&dir).keys().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_snapshot_is_a_storage_fault() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.put(b"k", b"v").unwrap();
        store.flush().unwrap();

        let path = dir.path().join("index.didx");
        let mut bytes = fs::read(&path).unwrap();
        let middle = HEADER_LEN + 1;
        bytes[middle] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let result = FileStore::open(&path, CompressionLevel::Fast);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn test_rejects_foreign_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.didx");

        fs::write(&path, [b"NOPE".as_slice(), &[0u8; 40]].concat()).unwrap();
        assert!(matches!(
            FileStore::open(&path, CompressionLevel::Fast),
            Err(StorageError::InvalidMagic)
        ));

        fs::write(&path, b"DIDX").unwrap();
        assert!(matches!(
            FileStore::open(&path, CompressionLevel::Fast),
            Err(StorageError::Corrupted(_))
        ));

        let mut future = STORE_MAGIC.to_vec();
        future.extend_from_slice(&7u16.to_le_bytes());
        future.extend_from_slice(&[0u8; 40]);
        fs::write(&path, &future).unwrap();
        assert!(matches!(
            FileStore::open(&path, CompressionLevel::Fast),
            Err(StorageError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn test_open_with_config_creates_directory() {
        let dir = TempDir::new().unwrap();
        let config = IndexConfig {
            storage_dir: dir.path().join("nested").join("store"),
            ..IndexConfig::default()
        };
        let store = FileStore::open_with_config(&config).unwrap();
        store.put(b"k", b"v").unwrap();
        store.flush().unwrap();
        assert!(config.snapshot_path().exists());
        assert_eq!(store.path(), config.snapshot_path());
    }
}
