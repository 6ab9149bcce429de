//! Durable key to multivalue index over declaration descriptors.
//!
//! [`MapIndex`] maps keys to [`ValueContainer`]s of `(file, value)`
//! occurrences on top of any [`KeyValueStore`], and answers the
//! [`KeyIndex`] queries: one key's data, or every key visible in a
//! [`SearchScope`]. [`NameIndex`] specializes it for declaration names and
//! keeps the descriptor trees those names point into.

pub mod compression;
pub mod config;
pub mod container;
pub mod error;
pub mod index;
pub mod map_index;
pub mod names;
pub mod scope;
pub mod store;

pub use compression::CompressionLevel;
pub use compression::Compressor;
pub use config::IndexConfig;
pub use container::FileId;
pub use container::ValueContainer;
pub use error::IndexError;
pub use error::Result;
pub use error::StorageError;
pub use error::StorageResult;
pub use index::KeyIndex;
pub use map_index::IndexItem;
pub use map_index::MapIndex;
pub use names::DescriptorRef;
pub use names::NameIndex;
pub use names::ResolvedDescriptor;
pub use scope::FileSetScope;
pub use scope::GlobalScope;
pub use scope::SearchScope;
pub use store::FileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
