//! Declaration-name index: "find every declaration named X".
//!
//! Each indexed file contributes its descriptor tree. Classes, fields and
//! methods are indexed by name; the tree itself is encoded into the same
//! store (prefix `0x10`) and decoded again on demand through an LRU cache.

use crate::config::IndexConfig;
use crate::container::FileId;
use crate::container::ValueContainer;
use crate::error::Result;
use crate::index::KeyIndex;
use crate::map_index::MapIndex;
use crate::scope::SearchScope;
use crate::store::FileStore;
use crate::store::KeyValueStore;
use declindex_descriptor::CacheStats;
use declindex_descriptor::DescriptorCache;
use declindex_descriptor::DescriptorData;
use declindex_descriptor::DescriptorKind;
use declindex_descriptor::DescriptorTree;
use declindex_descriptor::MethodView;
use declindex_descriptor::NameInterner;
use declindex_descriptor::NodeId;
use declindex_descriptor::decode_tree;
use declindex_descriptor::encode_tree;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;

const TREE_PREFIX: u8 = 0x10;

/// A declaration inside the descriptor tree of an indexed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorRef {
    pub file: FileId,
    pub node: NodeId,
}

/// A [`DescriptorRef`] resolved against its (cached) tree
#[derive(Debug, Clone)]
pub struct ResolvedDescriptor {
    tree: Arc<DescriptorTree>,
    node: NodeId,
}

impl ResolvedDescriptor {
    pub fn tree(&self) -> &DescriptorTree {
        &self.tree
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> Option<DescriptorKind> {
        self.tree.kind(self.node)
    }

    pub fn data(&self) -> Option<&DescriptorData> {
        self.tree.data(self.node)
    }

    pub fn name(&self) -> Option<&str> {
        self.data()
            .and_then(DescriptorData::name)
            .map(|name| name.as_str())
    }

    /// Method view when the declaration is a method or annotation method
    pub fn method(&self) -> Option<MethodView<'_>> {
        self.tree.method(self.node)
    }
}

pub struct NameIndex<S> {
    names: MapIndex<String, DescriptorRef, Arc<S>>,
    store: Arc<S>,
    trees: DescriptorCache<FileId>,
    interner: Arc<NameInterner>,
}

impl NameIndex<FileStore> {
    /// Open (or create) the on-disk index described by `config`
    pub fn open_with_config(config: &IndexConfig) -> Result<Self> {
        let store = Arc::new(FileStore::open_with_config(config)?);
        Self::open(store, config.index_version, config.descriptor_cache_capacity)
    }
}

impl<S: KeyValueStore> NameIndex<S> {
    pub fn open(store: Arc<S>, version: u32, cache_capacity: usize) -> Result<Self> {
        Ok(Self {
            names: MapIndex::open(Arc::clone(&store), version)?,
            store,
            trees: DescriptorCache::new(cache_capacity),
            interner: Arc::new(NameInterner::new()),
        })
    }

    /// Interner shared by every tree this index decodes
    pub fn interner(&self) -> &Arc<NameInterner> {
        &self.interner
    }

    /// Store `tree` as the current content of `file` and index its declarations
    pub fn index_file(&self, file: FileId, tree: DescriptorTree) -> Result<()> {
        let entries: Vec<(String, DescriptorRef)> = tree
            .iter()
            .filter(|id| {
                matches!(
                    tree.kind(*id),
                    Some(
                        DescriptorKind::Class
                            | DescriptorKind::Field
                            | DescriptorKind::Method
                            | DescriptorKind::AnnotationMethod
                    )
                )
            })
            .filter_map(|id| {
                let name = tree.data(id)?.name()?;
                Some((name.to_string(), DescriptorRef { file, node: id }))
            })
            .collect();

        let bytes = encode_tree(&tree)?;
        let key = tree_key(file);
        let previous = self.store.get(&key)?;

        self.trees.invalidate(&file);
        self.store.put(&key, &bytes)?;
        let count = entries.len();
        if let Err(e) = self.names.update(file, entries) {
            // The names still point into the previous tree
            let restored = match &previous {
                Some(old) => self.store.put(&key, old),
                None => self.store.remove(&key),
            };
            if let Err(restore) = restored {
                warn!("Failed to restore descriptor tree of file {}: {}", file, restore);
            }
            return Err(e);
        }

        self.trees.insert(file, Arc::new(tree));
        debug!(
            "Indexed {} declarations of file {} ({} bytes)",
            count,
            file,
            bytes.len()
        );
        Ok(())
    }

    pub fn remove_file(&self, file: FileId) -> Result<bool> {
        self.trees.invalidate(&file);
        self.store.remove(&tree_key(file))?;
        self.names.remove_file(file)
    }

    /// Every declaration named `name`
    pub fn find(&self, name: &str) -> Result<Vec<DescriptorRef>> {
        let container = self.names.get_data(&name.to_string())?;
        let mut found = Vec::with_capacity(container.len());
        container.for_each(|_, reference| {
            found.push(*reference);
            true
        });
        found.sort();
        Ok(found)
    }

    /// Decoded tree of `file`, if it is indexed
    pub fn tree(&self, file: FileId) -> Result<Option<Arc<DescriptorTree>>> {
        if let Some(tree) = self.trees.get(&file) {
            return Ok(Some(tree));
        }
        let Some(bytes) = self.store.get(&tree_key(file))? else {
            return Ok(None);
        };
        let tree = decode_tree(&bytes, &self.interner).inspect_err(|e| {
            warn!("Failed to decode descriptor tree of file {}: {}", file, e);
        })?;
        let tree = Arc::new(tree);
        self.trees.insert(file, Arc::clone(&tree));
        Ok(Some(tree))
    }

    /// Resolve `reference` back into its declaration; `None` once the file is gone
    pub fn resolve(&self, reference: &DescriptorRef) -> Result<Option<ResolvedDescriptor>> {
        let Some(tree) = self.tree(reference.file)? else {
            return Ok(None);
        };
        if !tree.contains(reference.node) {
            return Ok(None);
        }
        Ok(Some(ResolvedDescriptor {
            tree,
            node: reference.node,
        }))
    }

    pub fn flush(&self) -> Result<()> {
        self.names.flush()
    }

    pub fn clear(&self) -> Result<()> {
        self.trees.clear();
        self.names.clear()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.trees.stats()
    }
}

impl<S: KeyValueStore> KeyIndex<String, DescriptorRef> for NameIndex<S> {
    fn get_data(&self, key: &String) -> Result<Arc<ValueContainer<DescriptorRef>>> {
        self.names.get_data(key)
    }

    fn process_all_keys(
        &self,
        visitor: &mut dyn FnMut(&String) -> bool,
        scope: &dyn SearchScope,
        key_filter: Option<&dyn Fn(&String) -> bool>,
    ) -> Result<bool> {
        self.names.process_all_keys(visitor, scope, key_filter)
    }
}

fn tree_key(file: FileId) -> Vec<u8> {
    let mut bytes = vec![TREE_PREFIX];
    bytes.extend_from_slice(&file.as_raw().to_le_bytes());
    bytes
}
