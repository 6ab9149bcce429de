//! Index configuration, usually loaded from `declindex.toml`.
//!
//! ```toml
//! storage_dir = "/var/cache/declindex"
//! compression = "maximum"          # "off", "fast", "balanced" or { custom = 12 }
//! descriptor_cache_capacity = 512
//! index_version = 3
//! ```
//!
//! Every key is optional; missing keys take their [`Default`] value.

use crate::compression::CompressionLevel;
use crate::error::IndexError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// File name of the store snapshot inside [`IndexConfig::storage_dir`]
pub const SNAPSHOT_FILE: &str = "index.didx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Directory holding the store snapshot
    pub storage_dir: PathBuf,
    pub compression: CompressionLevel,
    /// Decoded descriptor trees kept in memory
    pub descriptor_cache_capacity: usize,
    /// Bumping this discards every stored entry on the next open
    pub index_version: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".declindex"),
            compression: CompressionLevel::default(),
            descriptor_cache_capacity: 256,
            index_version: 1,
        }
    }
}

impl IndexConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IndexError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.storage_dir.join(SNAPSHOT_FILE)
    }

    fn validate(&self) -> Result<()> {
        if self.descriptor_cache_capacity == 0 {
            return Err(IndexError::Config(
                "descriptor_cache_capacity must be at least 1".to_string(),
            ));
        }
        if let CompressionLevel::Custom(level) = self.compression
            && !(1..=22).contains(&level)
        {
            return Err(IndexError::Config(format!(
                "compression level {level} is outside 1..=22"
            )));
        }
        Ok(())
    }
}
