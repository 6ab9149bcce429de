//! Error types for descriptor construction, navigation and decoding

use crate::tree::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Syntax error in a signature or descriptor string.
///
/// Produced by both parsers. A failure in the generic signature is recovered
/// by the builder; a failure in the raw descriptor becomes
/// [`DescriptorError::MalformedDescriptor`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset} in `{input}`")]
pub struct FormatError {
    pub input: String,
    pub offset: usize,
    pub message: String,
}

impl FormatError {
    pub fn new(input: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            offset,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The raw descriptor could not be parsed; there is nothing left to fall back to
    #[error("Malformed method descriptor: {0}")]
    MalformedDescriptor(#[source] FormatError),

    /// Parameter lookup before the parameter list child was attached
    #[error("No parameter list attached to {0:?} yet")]
    NotYetAvailable(NodeId),

    /// Parameter list exists but has no entry at the requested position
    #[error("Parameter index {index} out of range (method has {len} parameters)")]
    ParameterOutOfRange { index: usize, len: usize },

    /// The node is not a method or annotation method
    #[error("Node {0:?} is not a method descriptor")]
    NotAMethod(NodeId),

    /// Invalid magic bytes in a persisted tree
    #[error("Invalid descriptor data: expected DSCR magic bytes")]
    InvalidMagic,

    /// Persisted tree written by a format this build cannot read
    #[error("Unsupported descriptor format version: {found} (supported {min}..={max})")]
    UnsupportedVersion { found: u16, min: u16, max: u16 },

    /// Structurally invalid persisted data
    #[error("Corrupt descriptor data: {0}")]
    CorruptData(String),

    #[error("Bincode encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Bincode decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
