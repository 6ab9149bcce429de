//! Builds method descriptors from compiled method attributes.
//!
//! The generic signature is tried first because it carries full generic type
//! information. It is optional and maintained independently of the raw
//! descriptor, so any format error (or an arity that disagrees with the raw
//! descriptor) discards it and the raw descriptor is parsed instead. A broken
//! raw descriptor fails the whole construction.

mod generic;
mod raw;
mod reader;

use crate::error::DescriptorError;
use crate::error::FormatError;
use crate::error::Result;
use crate::flags::MethodFlags;
use crate::interner::NameInterner;
use crate::method::MethodDescriptor;
use crate::tree::Annotation;
use crate::tree::DescriptorData;
use crate::tree::DescriptorTree;
use crate::tree::NodeId;
use crate::type_ref::TypeRef;
use tracing::debug;

/// Type parameter declared by a generic signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<String>,
}

/// Output of either parser, before it is attached to a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMethod {
    pub return_type: TypeRef,
    pub parameters: Vec<TypeRef>,
    pub throws: Vec<TypeRef>,
    pub type_parameters: Vec<TypeParameter>,
}

/// Which input produced the method's types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSource {
    GenericSignature,
    RawDescriptor,
}

/// How a build went: the winning input and the generic signature error that was recovered, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrace {
    pub source: SignatureSource,
    pub recovered: Option<FormatError>,
}

/// Attributes of one compiled method, as handed over by the extractor
#[derive(Debug, Clone, Default)]
pub struct MethodSource {
    pub name: Option<String>,
    pub flags: MethodFlags,
    pub descriptor: String,
    pub generic_signature: Option<String>,
    pub parameter_names: Vec<String>,
    pub throws: Option<Vec<String>>,
    pub modifiers: u32,
    pub annotations: Vec<Annotation>,
}

impl MethodSource {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            descriptor: descriptor.into(),
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_generic_signature(mut self, signature: impl Into<String>) -> Self {
        self.generic_signature = Some(signature.into());
        self
    }

    pub fn with_parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Internal names from the `Exceptions` attribute
    pub fn with_throws<I, S>(mut self, throws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.throws = Some(throws.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Result of [`build_method`]
#[derive(Debug, Clone)]
pub struct BuiltMethod {
    pub id: NodeId,
    pub parameter_types: Vec<TypeRef>,
    pub type_parameters: Vec<TypeParameter>,
    pub trace: ParseTrace,
}

/// Parse a generic signature on its own
pub fn parse_generic_signature(signature: &str) -> std::result::Result<ParsedMethod, FormatError> {
    generic::parse_method_signature(signature)
}

/// Parse a raw method descriptor on its own
pub fn parse_raw_descriptor(descriptor: &str) -> std::result::Result<ParsedMethod, FormatError> {
    raw::parse_method_descriptor(descriptor)
}

/// Two-tier parse: generic signature if usable, raw descriptor otherwise
pub fn parse_method(source: &MethodSource) -> Result<(ParsedMethod, ParseTrace)> {
    let mut recovered = None;

    if let Some(signature) = &source.generic_signature {
        match generic::parse_method_signature(signature)
            .and_then(|parsed| check_arity(parsed, signature, &source.descriptor))
        {
            Ok(parsed) => {
                return Ok((
                    parsed,
                    ParseTrace {
                        source: SignatureSource::GenericSignature,
                        recovered: None,
                    },
                ));
            }
            Err(error) => {
                debug!(
                    "Generic signature of {:?} rejected, falling back to descriptor: {}",
                    source.name, error
                );
                recovered = Some(error);
            }
        }
    }

    let parsed = raw::parse_method_descriptor(&source.descriptor)
        .map_err(DescriptorError::MalformedDescriptor)?;
    Ok((
        parsed,
        ParseTrace {
            source: SignatureSource::RawDescriptor,
            recovered,
        },
    ))
}

/// A generic signature that disagrees with a well-formed descriptor on the
/// parameter count is treated as malformed.
fn check_arity(
    parsed: ParsedMethod,
    signature: &str,
    descriptor: &str,
) -> std::result::Result<ParsedMethod, FormatError> {
    match raw::parse_method_descriptor(descriptor) {
        Ok(raw) if raw.parameters.len() != parsed.parameters.len() => Err(FormatError::new(
            signature,
            0,
            format!(
                "signature declares {} parameters but descriptor `{}` declares {}",
                parsed.parameters.len(),
                descriptor,
                raw.parameters.len()
            ),
        )),
        _ => Ok(parsed),
    }
}

/// Parse `source` and attach the resulting method descriptor under `parent`.
///
/// Children are attached in a fixed order: modifier list, parameter list
/// (one parameter per type), throws list. Nothing is attached when the raw
/// descriptor is malformed.
pub fn build_method(
    tree: &mut DescriptorTree,
    parent: NodeId,
    interner: &NameInterner,
    source: &MethodSource,
) -> Result<BuiltMethod> {
    let (parsed, trace) = parse_method(source)?;
    let parsed_via_generic = trace.source == SignatureSource::GenericSignature;
    let flags = source.flags.with_generic_signature(parsed_via_generic);

    let mut parameter_types: Vec<TypeRef> = parsed
        .parameters
        .iter()
        .map(|ty| intern_type(interner, ty))
        .collect();
    if flags.is_varargs()
        && let Some(last) = parameter_types.pop()
    {
        parameter_types.push(last.into_varargs());
    }

    let throws: Vec<TypeRef> = if parsed.throws.is_empty() {
        source
            .throws
            .iter()
            .flatten()
            .map(|name| TypeRef::new(interner.intern(&reader::dotted(name))))
            .collect()
    } else {
        parsed
            .throws
            .iter()
            .map(|ty| intern_type(interner, ty))
            .collect()
    };

    let method = MethodDescriptor::new(
        source.name.as_deref().map(|name| interner.intern(name)),
        intern_type(interner, &parsed.return_type),
        flags,
        None,
    );
    let id = tree.add_child(parent, DescriptorData::Method(method));

    tree.add_child(
        id,
        DescriptorData::ModifierList {
            mask: source.modifiers,
            annotations: source.annotations.clone(),
        },
    );
    let list = tree.add_child(id, DescriptorData::ParameterList);
    for (index, param_type) in parameter_types.iter().enumerate() {
        tree.add_child(
            list,
            DescriptorData::Parameter {
                name: source
                    .parameter_names
                    .get(index)
                    .map(|name| interner.intern(name)),
                param_type: param_type.clone(),
            },
        );
    }
    tree.add_child(id, DescriptorData::ThrowsList { types: throws });

    Ok(BuiltMethod {
        id,
        parameter_types,
        type_parameters: parsed.type_parameters,
        trace,
    })
}

fn intern_type(interner: &NameInterner, ty: &TypeRef) -> TypeRef {
    TypeRef::from_parts(
        interner.intern(ty.text()),
        ty.array_depth(),
        ty.is_varargs(),
        ty.annotations().to_vec(),
    )
}
