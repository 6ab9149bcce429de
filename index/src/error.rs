//! Error types for index and storage operations

use declindex_descriptor::DescriptorError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Faults raised by a backing store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Bincode encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Bincode decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Compression error: {0}")]
    Compression(String),

    /// Snapshot or record failed an integrity check
    #[error("Corrupted store: {0}")]
    Corrupted(String),

    #[error("Invalid store format: expected DIDX magic bytes")]
    InvalidMagic,

    #[error("Unsupported store version: {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config file missing or unreadable
    #[error("Failed to read configuration {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IndexError {
    /// Whether the backing store (rather than the caller) is at fault
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Descriptor(
                    DescriptorError::CorruptData(_)
                        | DescriptorError::InvalidMagic
                        | DescriptorError::UnsupportedVersion { .. }
                        | DescriptorError::Decode(_)
                )
        )
    }
}
