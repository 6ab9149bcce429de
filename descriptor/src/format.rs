//! Persisted layout of descriptor trees.
//!
//! ```text
//! "DSCR" | version: u16 LE | bincode(root record)
//! record = kind tag | flags: u8 | name: Option<str> | type ref: Option<TypeRef>
//!          | mask: u32 | annotations | types | children: [record] | default value: Option<str>
//! ```
//!
//! Version history:
//! - v1: type references carry text, array depth and the varargs bit.
//! - v2: type references also carry their type-use annotations.
//!
//! The encoder always writes [`FORMAT_VERSION`]; the decoder accepts every
//! version from [`MIN_SUPPORTED_VERSION`] on.

use crate::error::DescriptorError;
use crate::error::Result;
use crate::flags::MethodFlags;
use crate::interner::Name;
use crate::interner::NameInterner;
use crate::method::MethodDescriptor;
use crate::tree::Annotation;
use crate::tree::DescriptorData;
use crate::tree::DescriptorKind;
use crate::tree::DescriptorTree;
use crate::tree::NodeId;
use crate::type_ref::TypeRef;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header of a persisted descriptor tree
pub const DESCRIPTOR_MAGIC: &[u8] = b"DSCR";

/// Format written by this build
pub const FORMAT_VERSION: u16 = 2;

/// Oldest format this build can still read
pub const MIN_SUPPORTED_VERSION: u16 = 1;

const HEADER_LEN: usize = DESCRIPTOR_MAGIC.len() + 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TypeRefV1 {
    text: String,
    array_depth: u8,
    varargs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TypeRefV2 {
    text: String,
    array_depth: u8,
    varargs: bool,
    annotations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnnotationRecord {
    name: String,
    type_use: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record<T> {
    kind: u8,
    flags: u8,
    name: Option<String>,
    type_ref: Option<T>,
    mask: u32,
    annotations: Vec<AnnotationRecord>,
    types: Vec<T>,
    children: Vec<Record<T>>,
    default_value: Option<String>,
}

/// Conversion of a persisted type reference into the in-memory form
trait TypeRecord: Sized {
    fn into_type_ref(self, interner: &NameInterner) -> TypeRef;
}

impl TypeRecord for TypeRefV1 {
    fn into_type_ref(self, interner: &NameInterner) -> TypeRef {
        TypeRef::from_parts(
            interner.intern(&self.text),
            self.array_depth,
            self.varargs,
            Vec::new(),
        )
    }
}

impl TypeRecord for TypeRefV2 {
    fn into_type_ref(self, interner: &NameInterner) -> TypeRef {
        TypeRef::from_parts(
            interner.intern(&self.text),
            self.array_depth,
            self.varargs,
            self.annotations
                .iter()
                .map(|annotation| interner.intern(annotation))
                .collect(),
        )
    }
}

impl From<&TypeRef> for TypeRefV2 {
    fn from(value: &TypeRef) -> Self {
        Self {
            text: value.text().to_string(),
            array_depth: value.array_depth(),
            varargs: value.is_varargs(),
            annotations: value.annotations().iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Serialize `tree` in the current format
pub fn encode_tree(tree: &DescriptorTree) -> Result<Vec<u8>> {
    let record = to_record(tree, tree.root())?;
    let body = bincode::serde::encode_to_vec(&record, bincode::config::standard())?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(DESCRIPTOR_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Read a tree written by any supported format version
pub fn decode_tree(bytes: &[u8], interner: &NameInterner) -> Result<DescriptorTree> {
    let version = read_version(bytes)?;
    let body = &bytes[HEADER_LEN..];
    match version {
        1 => {
            debug!("Decoding descriptor tree written in format v1");
            decode_body::<TypeRefV1>(body, interner)
        }
        2 => decode_body::<TypeRefV2>(body, interner),
        found => Err(DescriptorError::UnsupportedVersion {
            found,
            min: MIN_SUPPORTED_VERSION,
            max: FORMAT_VERSION,
        }),
    }
}

/// Format version stored in the header of `bytes`
pub fn read_version(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < HEADER_LEN {
        return Err(DescriptorError::CorruptData(format!(
            "{} bytes is too short for a descriptor header",
            bytes.len()
        )));
    }
    if &bytes[..DESCRIPTOR_MAGIC.len()] != DESCRIPTOR_MAGIC {
        return Err(DescriptorError::InvalidMagic);
    }
    Ok(u16::from_le_bytes([bytes[4], bytes[5]]))
}

fn decode_body<T>(body: &[u8], interner: &NameInterner) -> Result<DescriptorTree>
where
    T: TypeRecord + DeserializeOwned,
{
    let (record, read): (Record<T>, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard())?;
    if read != body.len() {
        return Err(DescriptorError::CorruptData(format!(
            "{} trailing bytes after root record",
            body.len() - read
        )));
    }

    let (root_data, children) = to_data(record, interner)?;
    let mut tree = DescriptorTree::new(root_data);
    let root = tree.root();
    for child in children {
        attach(&mut tree, root, child, interner)?;
    }
    Ok(tree)
}

fn attach<T: TypeRecord>(
    tree: &mut DescriptorTree,
    parent: NodeId,
    record: Record<T>,
    interner: &NameInterner,
) -> Result<()> {
    let (data, children) = to_data(record, interner)?;
    let id = tree.add_child(parent, data);
    for child in children {
        attach(tree, id, child, interner)?;
    }
    Ok(())
}

/// Payload of `record` plus its children, not yet attached
fn to_data<T: TypeRecord>(
    record: Record<T>,
    interner: &NameInterner,
) -> Result<(DescriptorData, Vec<Record<T>>)> {
    let Record {
        kind: tag,
        flags,
        name,
        type_ref,
        mask,
        annotations,
        types,
        children,
        default_value,
    } = record;
    let kind = DescriptorKind::from_tag(tag)
        .ok_or_else(|| DescriptorError::CorruptData(format!("unknown descriptor kind {tag}")))?;
    let intern = |text: String| interner.intern(&text);
    let required_name = |name: Option<String>| {
        name.map(intern).ok_or_else(|| {
            DescriptorError::CorruptData(format!("{kind:?} record without a name"))
        })
    };
    let required_type = |type_ref: Option<T>| {
        type_ref
            .map(|ty| ty.into_type_ref(interner))
            .ok_or_else(|| DescriptorError::CorruptData(format!("{kind:?} record without a type")))
    };

    let data = match kind {
        DescriptorKind::File => DescriptorData::File {
            package: name.map(intern),
        },
        DescriptorKind::Class => DescriptorData::Class {
            qualified_name: required_name(name)?,
            flags,
        },
        DescriptorKind::Field => DescriptorData::Field {
            name: required_name(name)?,
            field_type: required_type(type_ref)?,
            flags,
            initializer: default_value,
        },
        DescriptorKind::Method | DescriptorKind::AnnotationMethod => {
            let method_flags = MethodFlags::from_bits(flags);
            if method_flags.is_annotation_method() != (kind == DescriptorKind::AnnotationMethod) {
                return Err(DescriptorError::CorruptData(format!(
                    "{kind:?} record with flags {flags:#04x}"
                )));
            }
            DescriptorData::Method(MethodDescriptor::new(
                name.map(intern),
                required_type(type_ref)?,
                method_flags,
                default_value,
            ))
        }
        DescriptorKind::ParameterList => DescriptorData::ParameterList,
        DescriptorKind::Parameter => DescriptorData::Parameter {
            name: name.map(intern),
            param_type: required_type(type_ref)?,
        },
        DescriptorKind::ModifierList => DescriptorData::ModifierList {
            mask,
            annotations: annotations
                .into_iter()
                .map(|annotation| Annotation {
                    name: interner.intern(&annotation.name),
                    type_use: annotation.type_use,
                })
                .collect(),
        },
        DescriptorKind::ThrowsList => DescriptorData::ThrowsList {
            types: types
                .into_iter()
                .map(|ty| ty.into_type_ref(interner))
                .collect(),
        },
    };
    Ok((data, children))
}

fn to_record(tree: &DescriptorTree, id: NodeId) -> Result<Record<TypeRefV2>> {
    let node = tree
        .node(id)
        .ok_or_else(|| DescriptorError::CorruptData(format!("dangling node {id:?}")))?;
    let mut record = Record {
        kind: node.kind().tag(),
        flags: 0,
        name: None,
        type_ref: None,
        mask: 0,
        annotations: Vec::new(),
        types: Vec::new(),
        children: Vec::with_capacity(node.children().len()),
        default_value: None,
    };

    match node.data() {
        DescriptorData::File { package } => {
            record.name = package.as_ref().map(Name::to_string);
        }
        DescriptorData::Class {
            qualified_name,
            flags,
        } => {
            record.name = Some(qualified_name.to_string());
            record.flags = *flags;
        }
        DescriptorData::Field {
            name,
            field_type,
            flags,
            initializer,
        } => {
            record.name = Some(name.to_string());
            record.type_ref = Some(field_type.into());
            record.flags = *flags;
            record.default_value = initializer.clone();
        }
        DescriptorData::Method(method) => {
            record.flags = method.flags().bits();
            record.name = method.name().map(str::to_string);
            record.type_ref = Some(method.raw_return_type().into());
            record.default_value = method.default_value_text();
        }
        DescriptorData::ParameterList => {}
        DescriptorData::Parameter { name, param_type } => {
            record.name = name.as_ref().map(Name::to_string);
            record.type_ref = Some(param_type.into());
        }
        DescriptorData::ModifierList { mask, annotations } => {
            record.mask = *mask;
            record.annotations = annotations
                .iter()
                .map(|annotation| AnnotationRecord {
                    name: annotation.name.to_string(),
                    type_use: annotation.type_use,
                })
                .collect();
        }
        DescriptorData::ThrowsList { types } => {
            record.types = types.iter().map(TypeRefV2::from).collect();
        }
    }

    for child in node.children() {
        record.children.push(to_record(tree, *child)?);
    }
    Ok(record)
}
