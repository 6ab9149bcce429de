//! Per-key multivalue container.
//!
//! Each distinct value remembers the sorted set of files it occurs in. Most
//! keys carry one or two distinct values, so those are stored inline in a
//! small vector; the third distinct value promotes the container to a hash map.

use ahash::AHashMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

/// Distinct values kept inline before promoting to a hash map
pub const INLINE_CAPACITY: usize = 2;

/// Identifier of an indexed input file
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(u32);

impl FileId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Persisted form: every distinct value with its files
pub(crate) type ContainerRecord<V> = Vec<(V, Vec<FileId>)>;

#[derive(Debug, Clone)]
enum Storage<V> {
    Inline(Vec<(V, Vec<FileId>)>),
    Map(AHashMap<V, Vec<FileId>>),
}

/// All occurrences of one key: `(file, value)` pairs without duplicates
#[derive(Debug, Clone)]
pub struct ValueContainer<V> {
    storage: Storage<V>,
    len: usize,
}

impl<V> Default for ValueContainer<V> {
    fn default() -> Self {
        Self {
            storage: Storage::Inline(Vec::new()),
            len: 0,
        }
    }
}

impl<V: Eq + Hash + Clone> ValueContainer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(file, value)` occurrences
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct values
    pub fn value_count(&self) -> usize {
        match &self.storage {
            Storage::Inline(entries) => entries.len(),
            Storage::Map(map) => map.len(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// Record that `file` contributes `value`; returns false if it already did
    pub fn add(&mut self, file: FileId, value: V) -> bool {
        let added = match &mut self.storage {
            Storage::Inline(entries) => {
                if let Some((_, files)) = entries.iter_mut().find(|(v, _)| *v == value) {
                    insert_sorted(files, file)
                } else if entries.len() < INLINE_CAPACITY {
                    entries.push((value, vec![file]));
                    true
                } else {
                    let mut map: AHashMap<V, Vec<FileId>> = entries.drain(..).collect();
                    map.insert(value, vec![file]);
                    self.storage = Storage::Map(map);
                    true
                }
            }
            Storage::Map(map) => match map.get_mut(&value) {
                Some(files) => insert_sorted(files, file),
                None => {
                    map.insert(value, vec![file]);
                    true
                }
            },
        };
        if added {
            self.len += 1;
        }
        added
    }

    /// Drop one occurrence; returns whether it was present
    pub fn remove(&mut self, file: FileId, value: &V) -> bool {
        let removed = match &mut self.storage {
            Storage::Inline(entries) => match entries.iter().position(|(v, _)| v == value) {
                Some(pos) => {
                    let removed = remove_sorted(&mut entries[pos].1, file);
                    if entries[pos].1.is_empty() {
                        entries.remove(pos);
                    }
                    removed
                }
                None => false,
            },
            Storage::Map(map) => match map.get_mut(value) {
                Some(files) => {
                    let removed = remove_sorted(files, file);
                    if files.is_empty() {
                        map.remove(value);
                    }
                    removed
                }
                None => false,
            },
        };
        if removed {
            self.len -= 1;
            self.reset_if_empty();
        }
        removed
    }

    /// Drop every occurrence contributed by `file`; returns how many were dropped
    pub fn remove_file(&mut self, file: FileId) -> usize {
        let mut removed = 0;
        match &mut self.storage {
            Storage::Inline(entries) => entries.retain_mut(|(_, files)| {
                removed += usize::from(remove_sorted(files, file));
                !files.is_empty()
            }),
            Storage::Map(map) => map.retain(|_, files| {
                removed += usize::from(remove_sorted(files, file));
                !files.is_empty()
            }),
        }
        self.len -= removed;
        self.reset_if_empty();
        removed
    }

    pub fn contains(&self, value: &V) -> bool {
        match &self.storage {
            Storage::Inline(entries) => entries.iter().any(|(v, _)| v == value),
            Storage::Map(map) => map.contains_key(value),
        }
    }

    /// Visit every `(file, value)` occurrence until `visitor` returns false.
    ///
    /// Returns false when the visit was cut short.
    pub fn for_each(&self, mut visitor: impl FnMut(FileId, &V) -> bool) -> bool {
        for (value, files) in self.entries() {
            for file in files {
                if !visitor(*file, value) {
                    return false;
                }
            }
        }
        true
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries().map(|(value, _)| value)
    }

    /// Files `value` occurs in, in ascending order
    pub fn files_of(&self, value: &V) -> &[FileId] {
        let files = match &self.storage {
            Storage::Inline(entries) => entries
                .iter()
                .find(|(v, _)| v == value)
                .map(|(_, files)| files),
            Storage::Map(map) => map.get(value),
        };
        match files {
            Some(files) => files,
            None => &[],
        }
    }

    /// Whether any occurrence lives in a file accepted by `accept`
    pub fn any_file(&self, mut accept: impl FnMut(FileId) -> bool) -> bool {
        self.entries()
            .any(|(_, files)| files.iter().any(|file| accept(*file)))
    }

    pub(crate) fn to_record(&self) -> ContainerRecord<V> {
        self.entries()
            .map(|(value, files)| (value.clone(), files.clone()))
            .collect()
    }

    /// Rebuild from a persisted record, normalizing file order and duplicates
    pub(crate) fn from_record(record: ContainerRecord<V>) -> Self {
        let mut container = Self::new();
        for (value, files) in record {
            for file in files {
                container.add(file, value.clone());
            }
        }
        container
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&V, &Vec<FileId>)> + '_> {
        match &self.storage {
            Storage::Inline(entries) => Box::new(entries.iter().map(|(v, files)| (v, files))),
            Storage::Map(map) => Box::new(map.iter()),
        }
    }

    fn reset_if_empty(&mut self) {
        if self.len == 0 && !self.is_inline() {
            self.storage = Storage::Inline(Vec::new());
        }
    }
}

fn insert_sorted(files: &mut Vec<FileId>, file: FileId) -> bool {
    match files.binary_search(&file) {
        Ok(_) => false,
        Err(pos) => {
            files.insert(pos, file);
            true
        }
    }
}

fn remove_sorted(files: &mut Vec<FileId>, file: FileId) -> bool {
    match files.binary_search(&file) {
        Ok(pos) => {
            files.remove(pos);
            true
        }
        Err(_) => false,
    }
}
