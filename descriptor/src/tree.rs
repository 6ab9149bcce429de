//! Arena-backed descriptor trees.
//!
//! Every node of a tree lives in one `Vec` and is addressed by [`NodeId`].
//! Parents own their children: dropping the tree drops every descriptor in it.
//! After construction a tree is read-only, except for the default-value cell
//! of method descriptors (see [`MethodDescriptor::set_default_value_text`]).

use crate::interner::Name;
use crate::method::MethodDescriptor;
use crate::method::MethodView;
use crate::type_ref::TypeRef;
use serde::Deserialize;
use serde::Serialize;

/// Position of a node inside its [`DescriptorTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closed set of descriptor kinds; the tag values are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    File,
    Class,
    Field,
    Method,
    AnnotationMethod,
    ParameterList,
    Parameter,
    ModifierList,
    ThrowsList,
}

impl DescriptorKind {
    pub const fn tag(self) -> u8 {
        match self {
            Self::File => 0,
            Self::Class => 1,
            Self::Field => 2,
            Self::Method => 3,
            Self::AnnotationMethod => 4,
            Self::ParameterList => 5,
            Self::Parameter => 6,
            Self::ModifierList => 7,
            Self::ThrowsList => 8,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::File,
            1 => Self::Class,
            2 => Self::Field,
            3 => Self::Method,
            4 => Self::AnnotationMethod,
            5 => Self::ParameterList,
            6 => Self::Parameter,
            7 => Self::ModifierList,
            8 => Self::ThrowsList,
            _ => return None,
        })
    }

    pub const fn is_method(self) -> bool {
        matches!(self, Self::Method | Self::AnnotationMethod)
    }
}

/// Annotation recorded on a modifier list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub name: Name,
    /// Applies to the declared type rather than the declaration
    pub type_use: bool,
}

impl Annotation {
    pub fn declaration(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            type_use: false,
        }
    }

    pub fn type_use(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            type_use: true,
        }
    }
}

/// Payload of one descriptor node
#[derive(Debug)]
pub enum DescriptorData {
    File {
        package: Option<Name>,
    },
    Class {
        qualified_name: Name,
        flags: u8,
    },
    Field {
        name: Name,
        field_type: TypeRef,
        flags: u8,
        initializer: Option<String>,
    },
    /// Method or annotation method, depending on the annotation flag
    Method(MethodDescriptor),
    ParameterList,
    Parameter {
        name: Option<Name>,
        param_type: TypeRef,
    },
    ModifierList {
        mask: u32,
        annotations: Vec<Annotation>,
    },
    ThrowsList {
        types: Vec<TypeRef>,
    },
}

impl DescriptorData {
    fn kind(&self) -> DescriptorKind {
        match self {
            Self::File { .. } => DescriptorKind::File,
            Self::Class { .. } => DescriptorKind::Class,
            Self::Field { .. } => DescriptorKind::Field,
            Self::Method(method) if method.is_annotation_method() => {
                DescriptorKind::AnnotationMethod
            }
            Self::Method(_) => DescriptorKind::Method,
            Self::ParameterList => DescriptorKind::ParameterList,
            Self::Parameter { .. } => DescriptorKind::Parameter,
            Self::ModifierList { .. } => DescriptorKind::ModifierList,
            Self::ThrowsList { .. } => DescriptorKind::ThrowsList,
        }
    }

    /// Declared name, if this kind of descriptor has one
    pub fn name(&self) -> Option<&Name> {
        match self {
            Self::Class { qualified_name, .. } => Some(qualified_name),
            Self::Field { name, .. } => Some(name),
            Self::Method(method) => method.name_ref(),
            Self::Parameter { name, .. } => name.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct DescriptorNode {
    parent: Option<NodeId>,
    kind: DescriptorKind,
    data: DescriptorData,
    children: Vec<NodeId>,
}

impl DescriptorNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn data(&self) -> &DescriptorData {
        &self.data
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Owned tree of descriptors for one file
#[derive(Debug)]
pub struct DescriptorTree {
    nodes: Vec<DescriptorNode>,
}

impl DescriptorTree {
    pub fn new(root: DescriptorData) -> Self {
        let kind = root.kind();
        Self {
            nodes: vec![DescriptorNode {
                parent: None,
                kind,
                data: root,
                children: Vec::new(),
            }],
        }
    }

    /// Tree whose root is a file descriptor
    pub fn for_file(package: Option<Name>) -> Self {
        Self::new(DescriptorData::File { package })
    }

    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Append `data` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_child(&mut self, parent: NodeId, data: DescriptorData) -> NodeId {
        assert!(
            parent.index() < self.nodes.len(),
            "parent {parent:?} is not part of this tree"
        );
        let id = NodeId(self.nodes.len() as u32);
        let kind = data.kind();
        self.nodes.push(DescriptorNode {
            parent: Some(parent),
            kind,
            data,
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&DescriptorNode> {
        self.nodes.get(id.index())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<DescriptorKind> {
        self.node(id).map(DescriptorNode::kind)
    }

    pub fn data(&self, id: NodeId) -> Option<&DescriptorData> {
        self.node(id).map(DescriptorNode::data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(DescriptorNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// First immediate child of `id` with the given kind
    pub fn find_child(&self, id: NodeId, kind: DescriptorKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.kind(*child) == Some(kind))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in depth-first pre-order, starting at the root
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![NodeId::ROOT];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev().copied());
            Some(id)
        })
    }

    /// Method view of `id`, if it is a method or annotation method
    pub fn method(&self, id: NodeId) -> Option<MethodView<'_>> {
        match self.data(id)? {
            DescriptorData::Method(method) => Some(MethodView::new(self, id, method)),
            _ => None,
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodView<'_>> + '_ {
        self.iter().filter_map(|id| self.method(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::MethodFlags;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_children_keep_insertion_order() {
        let mut tree = DescriptorTree::for_file(Some(Name::from("com.example")));
        let class = tree.add_child(
            tree.root(),
            DescriptorData::Class {
                qualified_name: Name::from("com.example.Widget"),
                flags: 0,
            },
        );
        let first = tree.add_child(
            class,
            DescriptorData::Field {
                name: Name::from("first"),
                field_type: TypeRef::new("int"),
                flags: 0,
                initializer: None,
            },
        );
        let second = tree.add_child(
            class,
            DescriptorData::Field {
                name: Name::from("second"),
                field_type: TypeRef::new("long"),
                flags: 0,
                initializer: Some("42L".to_string()),
            },
        );

        assert_eq!(tree.children(class), &[first, second]);
        assert_eq!(tree.parent(second), Some(class));
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(
            tree.iter().collect::<Vec<_>>(),
            vec![tree.root(), class, first, second]
        );
    }

    #[test]
    fn test_annotation_flag_decides_kind() {
        let mut tree = DescriptorTree::for_file(None);
        let plain = tree.add_child(
            tree.root(),
            DescriptorData::Method(MethodDescriptor::new(
                Some(Name::from("run")),
                TypeRef::void(),
                MethodFlags::default(),
                None,
            )),
        );
        let annotation = tree.add_child(
            tree.root(),
            DescriptorData::Method(MethodDescriptor::new(
                Some(Name::from("value")),
                TypeRef::new("java.lang.String"),
                MethodFlags::pack(false, false, true, false, false),
                None,
            )),
        );

        assert_eq!(tree.kind(plain), Some(DescriptorKind::Method));
        assert_eq!(tree.kind(annotation), Some(DescriptorKind::AnnotationMethod));
        assert_eq!(tree.methods().count(), 2);
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for tag in 0..=8 {
            let kind = DescriptorKind::from_tag(tag);
            assert_eq!(kind.map(DescriptorKind::tag), Some(tag));
        }
        assert_eq!(DescriptorKind::from_tag(9), None);
    }
}
