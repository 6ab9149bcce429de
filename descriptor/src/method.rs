//! Method descriptors and read accessors over them

use crate::error::DescriptorError;
use crate::error::Result;
use crate::flags::MethodFlags;
use crate::interner::Name;
use crate::tree::Annotation;
use crate::tree::DescriptorData;
use crate::tree::DescriptorKind;
use crate::tree::DescriptorTree;
use crate::tree::NodeId;
use crate::type_ref::TypeRef;
use std::borrow::Cow;
use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;

/// One compiled method, summarized
#[derive(Debug)]
pub struct MethodDescriptor {
    name: Option<Name>,
    flags: MethodFlags,
    return_type: TypeRef,
    default_value: RwLock<Option<Box<str>>>,
}

impl MethodDescriptor {
    /// Build from an already packed flags byte and return type, e.g. when decoding
    pub fn new(
        name: Option<Name>,
        return_type: TypeRef,
        flags: MethodFlags,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            flags,
            return_type,
            default_value: RwLock::new(default_value.map(String::into_boxed_str)),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn name_ref(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    pub const fn flags(&self) -> MethodFlags {
        self.flags
    }

    pub const fn is_constructor(&self) -> bool {
        self.flags.is_constructor()
    }

    pub const fn is_varargs(&self) -> bool {
        self.flags.is_varargs()
    }

    pub const fn is_annotation_method(&self) -> bool {
        self.flags.is_annotation_method()
    }

    pub const fn is_deprecated(&self) -> bool {
        self.flags.is_deprecated()
    }

    pub const fn has_deprecated_annotation(&self) -> bool {
        self.flags.has_deprecated_annotation()
    }

    pub const fn is_parsed_via_generic_signature(&self) -> bool {
        self.flags.is_parsed_via_generic_signature()
    }

    /// Return type as stored, without type-use annotations applied
    pub fn raw_return_type(&self) -> &TypeRef {
        &self.return_type
    }

    pub fn default_value_text(&self) -> Option<String> {
        self.default_value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .map(str::to_string)
    }

    /// Annotation methods learn their default value after the descriptor exists
    pub fn set_default_value_text(&self, text: impl Into<String>) {
        let text: String = text.into();
        *self
            .default_value
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(text.into_boxed_str());
    }
}

/// Parameter child of a method
#[derive(Debug, Clone, Copy)]
pub struct ParameterView<'a> {
    pub id: NodeId,
    pub name: Option<&'a Name>,
    pub param_type: &'a TypeRef,
}

/// A method descriptor together with the tree it lives in
#[derive(Clone, Copy)]
pub struct MethodView<'a> {
    tree: &'a DescriptorTree,
    id: NodeId,
    method: &'a MethodDescriptor,
}

impl<'a> MethodView<'a> {
    pub(crate) fn new(tree: &'a DescriptorTree, id: NodeId, method: &'a MethodDescriptor) -> Self {
        Self { tree, id, method }
    }

    /// View the method at `id`, failing when the node is some other kind
    pub fn of(tree: &'a DescriptorTree, id: NodeId) -> Result<Self> {
        tree.method(id).ok_or(DescriptorError::NotAMethod(id))
    }

    pub const fn id(&self) -> NodeId {
        self.id
    }

    pub const fn descriptor(&self) -> &'a MethodDescriptor {
        self.method
    }

    pub fn name(&self) -> Option<&'a str> {
        self.method.name()
    }

    pub const fn flags(&self) -> MethodFlags {
        self.method.flags()
    }

    pub const fn is_constructor(&self) -> bool {
        self.method.is_constructor()
    }

    pub const fn is_varargs(&self) -> bool {
        self.method.is_varargs()
    }

    pub const fn is_annotation_method(&self) -> bool {
        self.method.is_annotation_method()
    }

    pub const fn is_deprecated(&self) -> bool {
        self.method.is_deprecated()
    }

    pub const fn has_deprecated_annotation(&self) -> bool {
        self.method.has_deprecated_annotation()
    }

    pub fn kind(&self) -> DescriptorKind {
        if self.method.is_annotation_method() {
            DescriptorKind::AnnotationMethod
        } else {
            DescriptorKind::Method
        }
    }

    pub fn default_value_text(&self) -> Option<String> {
        self.method.default_value_text()
    }

    /// Modifier mask and annotations of the attached modifier list
    pub fn modifier_list(&self) -> Option<(u32, &'a [Annotation])> {
        let id = self.tree.find_child(self.id, DescriptorKind::ModifierList)?;
        match self.tree.data(id)? {
            DescriptorData::ModifierList { mask, annotations } => Some((*mask, annotations)),
            _ => None,
        }
    }

    /// Return type; with `resolve` the modifier list's type-use annotations are applied
    pub fn return_type(&self, resolve: bool) -> Cow<'a, TypeRef> {
        let raw = self.method.raw_return_type();
        if !resolve {
            return Cow::Borrowed(raw);
        }
        match self.modifier_list() {
            Some((_, annotations)) if annotations.iter().any(|a| a.type_use) => Cow::Owned(
                raw.apply_annotations(
                    annotations
                        .iter()
                        .filter(|a| a.type_use)
                        .map(|a| &a.name),
                ),
            ),
            _ => Cow::Borrowed(raw),
        }
    }

    /// Parameter at position `index` of the first parameter list child
    pub fn find_parameter(&self, index: usize) -> Result<ParameterView<'a>> {
        let list = self
            .tree
            .find_child(self.id, DescriptorKind::ParameterList)
            .ok_or(DescriptorError::NotYetAvailable(self.id))?;
        let params = self.tree.children(list);
        let id = params
            .get(index)
            .copied()
            .ok_or(DescriptorError::ParameterOutOfRange {
                index,
                len: params.len(),
            })?;
        self.parameter(id)
            .ok_or_else(|| DescriptorError::CorruptData(format!("{id:?} is not a parameter")))
    }

    /// All parameters in declaration order
    pub fn parameters(&self) -> Result<Vec<ParameterView<'a>>> {
        let list = self
            .tree
            .find_child(self.id, DescriptorKind::ParameterList)
            .ok_or(DescriptorError::NotYetAvailable(self.id))?;
        Ok(self
            .tree
            .children(list)
            .iter()
            .filter_map(|id| self.parameter(*id))
            .collect())
    }

    fn parameter(&self, id: NodeId) -> Option<ParameterView<'a>> {
        match self.tree.data(id)? {
            DescriptorData::Parameter { name, param_type } => Some(ParameterView {
                id,
                name: name.as_ref(),
                param_type,
            }),
            _ => None,
        }
    }

    /// Declared checked exceptions; empty when no throws list is attached
    pub fn throws(&self) -> &'a [TypeRef] {
        let Some(id) = self.tree.find_child(self.id, DescriptorKind::ThrowsList) else {
            return &[];
        };
        match self.tree.data(id) {
            Some(DescriptorData::ThrowsList { types }) => types,
            _ => &[],
        }
    }

    /// One-line rendering, e.g. `varargs deprecated foo:int default=3`
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Debug for MethodView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodView")
            .field("id", &self.id)
            .field("method", self.method)
            .finish()
    }
}

impl fmt::Display for MethodView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constructor() {
            f.write_str("cons ")?;
        }
        if self.is_annotation_method() {
            f.write_str("annotation ")?;
        }
        if self.is_varargs() {
            f.write_str("varargs ")?;
        }
        if self.is_deprecated() || self.has_deprecated_annotation() {
            f.write_str("deprecated ")?;
        }
        write!(
            f,
            "{}:{}",
            self.name().unwrap_or("<anonymous>"),
            self.method.raw_return_type()
        )?;
        if let Some(default_value) = self.default_value_text() {
            write!(f, " default={}", default_value)?;
        }
        Ok(())
    }
}
