//! Compact structural descriptors for compiled declarations.
//!
//! A [`DescriptorTree`] summarizes one compiled file: classes, fields and
//! methods with their parameter lists, modifier lists and throws lists. Method
//! descriptors are built from a generic signature when one parses, falling back
//! to the raw descriptor otherwise (see [`codec`]), and trees are persisted in
//! a small versioned binary format (see [`format`]).

pub mod cache;
pub mod codec;
pub mod error;
pub mod flags;
pub mod format;
pub mod interner;
pub mod method;
pub mod tree;
pub mod type_ref;

pub use cache::CacheStats;
pub use cache::DescriptorCache;
pub use codec::BuiltMethod;
pub use codec::MethodSource;
pub use codec::ParseTrace;
pub use codec::SignatureSource;
pub use codec::build_method;
pub use error::DescriptorError;
pub use error::FormatError;
pub use error::Result;
pub use flags::MethodFlags;
pub use format::FORMAT_VERSION;
pub use format::decode_tree;
pub use format::encode_tree;
pub use interner::Name;
pub use interner::NameInterner;
pub use method::MethodDescriptor;
pub use method::MethodView;
pub use method::ParameterView;
pub use tree::Annotation;
pub use tree::DescriptorData;
pub use tree::DescriptorKind;
pub use tree::DescriptorNode;
pub use tree::DescriptorTree;
pub use tree::NodeId;
pub use type_ref::TypeRef;
