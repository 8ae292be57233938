//! The parse tree produced by the demangler.
//!
//! All nodes of one demangling session live in a `Tree`, an append-only arena
//! addressed by `NodeId`. A node is never freed on its own; dropping the tree
//! frees everything at once.

use std::fmt;

macro_rules! node_kinds {
    ($($kind:ident,)*) => {
        /// The grammar production a node was created by.
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
        pub enum Kind {
            $($kind,)*
        }

        impl Kind {
            pub const ALL: &'static [Kind] = &[$(Kind::$kind,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Kind::$kind => stringify!($kind),)*
                }
            }
        }
    }
}

node_kinds! {
    Global,
    ObjCAttribute,
    NonObjCAttribute,
    DynamicAttribute,
    DirectMethodReferenceAttribute,
    VTableAttribute,
    TypeMangling,
    Type,
    TypeList,
    Module,
    Identifier,
    LocalDeclName,
    PrivateDeclName,
    PrefixOperator,
    PostfixOperator,
    InfixOperator,
    Index,
    Structure,
    Class,
    Enum,
    Protocol,
    TypeAlias,
    Extension,
    BoundGenericStructure,
    BoundGenericClass,
    BoundGenericEnum,
    Static,
    Function,
    Variable,
    Subscript,
    Initializer,
    DefaultArgumentInitializer,
    Allocator,
    Constructor,
    Destructor,
    Deallocator,
    IVarInitializer,
    IVarDestroyer,
    Getter,
    Setter,
    GlobalGetter,
    MaterializeForSet,
    WillSet,
    DidSet,
    OwningAddressor,
    OwningMutableAddressor,
    NativeOwningAddressor,
    NativeOwningMutableAddressor,
    NativePinningAddressor,
    NativePinningMutableAddressor,
    UnsafeAddressor,
    UnsafeMutableAddressor,
    ExplicitClosure,
    ImplicitClosure,
    BuiltinTypeName,
    FunctionType,
    UncurriedFunctionType,
    ObjCBlock,
    CFunctionPointer,
    ThinFunctionType,
    AutoClosureType,
    ArgumentTuple,
    ReturnType,
    ThrowsAnnotation,
    NonVariadicTuple,
    VariadicTuple,
    TupleElement,
    TupleElementName,
    Metatype,
    ExistentialMetatype,
    ProtocolList,
    InOut,
    DynamicSelf,
    ErrorType,
    Weak,
    Unowned,
    Unmanaged,
    DependentGenericParamType,
    DependentGenericType,
    DependentGenericSignature,
    DependentGenericParamCount,
    DependentGenericConformanceRequirement,
    DependentGenericSameTypeRequirement,
    TypeMetadata,
    TypeMetadataAccessFunction,
    TypeMetadataLazyCache,
    GenericTypeMetadataPattern,
    Metaclass,
    NominalTypeDescriptor,
    FullTypeMetadata,
    ProtocolDescriptor,
    ValueWitness,
    ValueWitnessTable,
    FieldOffset,
    Directness,
    ProtocolConformance,
    ProtocolWitnessTable,
    GenericProtocolWitnessTable,
    GenericProtocolWitnessTableInstantiationFunction,
    ProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableCacheVariable,
    AssociatedTypeMetadataAccessor,
    AssociatedTypeWitnessTableAccessor,
    ProtocolWitness,
    ReabstractionThunk,
    ReabstractionThunkHelper,
    PartialApplyForwarder,
    PartialApplyObjCForwarder,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum PayloadKind {
    None,
    Text,
    Index,
}

impl Kind {
    /// The payload form every node of this kind carries.
    pub fn payload_kind(self) -> PayloadKind {
        match self {
            Kind::Module
            | Kind::Identifier
            | Kind::PrefixOperator
            | Kind::PostfixOperator
            | Kind::InfixOperator
            | Kind::TupleElementName
            | Kind::BuiltinTypeName => PayloadKind::Text,
            Kind::Index | Kind::DependentGenericParamCount | Kind::Directness => PayloadKind::Index,
            _ => PayloadKind::None,
        }
    }

    pub fn is_nominal(self) -> bool {
        match self {
            Kind::Structure | Kind::Class | Kind::Enum | Kind::Protocol | Kind::TypeAlias => true,
            _ => false,
        }
    }

    pub fn is_bound_generic(self) -> bool {
        match self {
            Kind::BoundGenericStructure | Kind::BoundGenericClass | Kind::BoundGenericEnum => true,
            _ => false,
        }
    }

    pub fn is_function_type(self) -> bool {
        match self {
            Kind::FunctionType
            | Kind::UncurriedFunctionType
            | Kind::ObjCBlock
            | Kind::CFunctionPointer
            | Kind::ThinFunctionType
            | Kind::AutoClosureType => true,
            _ => false,
        }
    }

    pub fn is_attribute(self) -> bool {
        match self {
            Kind::ObjCAttribute
            | Kind::NonObjCAttribute
            | Kind::DynamicAttribute
            | Kind::DirectMethodReferenceAttribute
            | Kind::VTableAttribute => true,
            _ => false,
        }
    }

    /// Kinds whose first child is the declaration context they live in.
    pub fn is_context(self) -> bool {
        match self {
            Kind::Structure
            | Kind::Class
            | Kind::Enum
            | Kind::Protocol
            | Kind::TypeAlias
            | Kind::Extension
            | Kind::Function
            | Kind::Variable
            | Kind::Subscript
            | Kind::Initializer
            | Kind::DefaultArgumentInitializer
            | Kind::Allocator
            | Kind::Constructor
            | Kind::Destructor
            | Kind::Deallocator
            | Kind::IVarInitializer
            | Kind::IVarDestroyer
            | Kind::Getter
            | Kind::Setter
            | Kind::GlobalGetter
            | Kind::MaterializeForSet
            | Kind::WillSet
            | Kind::DidSet
            | Kind::OwningAddressor
            | Kind::OwningMutableAddressor
            | Kind::NativeOwningAddressor
            | Kind::NativeOwningMutableAddressor
            | Kind::NativePinningAddressor
            | Kind::NativePinningMutableAddressor
            | Kind::UnsafeAddressor
            | Kind::UnsafeMutableAddressor
            | Kind::ExplicitClosure
            | Kind::ImplicitClosure
            | Kind::BoundGenericStructure
            | Kind::BoundGenericClass
            | Kind::BoundGenericEnum => true,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static lookup of a kind's display name; no tree required.
pub fn kind_name(kind: Kind) -> &'static str {
    kind.name()
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum Payload {
    None,
    Text(String),
    Index(u64),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: Kind,
    pub payload: Payload,
    pub children: Vec<NodeId>,
}

/// Only the demangler adds nodes, so every tree a caller sees is acyclic.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Tree {
        Tree {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, kind: Kind, payload: Payload, children: Vec<NodeId>) -> NodeId {
        debug_assert!(self.nodes.len() < u32::max_value() as usize);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            payload,
            children,
        });
        id
    }

    pub(crate) fn add(&mut self, kind: Kind) -> NodeId {
        debug_assert_eq!(kind.payload_kind(), PayloadKind::None);
        self.push(kind, Payload::None, Vec::new())
    }

    pub(crate) fn add_with_children(&mut self, kind: Kind, children: Vec<NodeId>) -> NodeId {
        debug_assert_eq!(kind.payload_kind(), PayloadKind::None);
        self.push(kind, Payload::None, children)
    }

    pub(crate) fn add_text<S: Into<String>>(&mut self, kind: Kind, text: S) -> NodeId {
        debug_assert_eq!(kind.payload_kind(), PayloadKind::Text);
        self.push(kind, Payload::Text(text.into()), Vec::new())
    }

    pub(crate) fn add_index(&mut self, kind: Kind, index: u64) -> NodeId {
        debug_assert_eq!(kind.payload_kind(), PayloadKind::Index);
        self.push(kind, Payload::Index(index), Vec::new())
    }

    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.as_usize()].children.push(child);
    }

    /// Wraps `inner` in a `Type` node.
    pub(crate) fn add_type(&mut self, inner: NodeId) -> NodeId {
        self.add_with_children(Kind::Type, vec![inner])
    }

    /// Node accessors index straight into the arena: `id` must have been
    /// handed out by this tree, or they panic.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.as_usize()]
    }

    pub fn kind(&self, id: NodeId) -> Kind {
        self.node(id).kind
    }

    pub fn payload_kind(&self, id: NodeId) -> PayloadKind {
        match self.node(id).payload {
            Payload::None => PayloadKind::None,
            Payload::Text(_) => PayloadKind::Text,
            Payload::Index(_) => PayloadKind::Index,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).cloned()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id).payload {
            Payload::Text(ref text) => Some(text),
            _ => None,
        }
    }

    pub fn index_value(&self, id: NodeId) -> Option<u64> {
        match self.node(id).payload {
            Payload::Index(index) => Some(index),
            _ => None,
        }
    }

    /// Structural equality of two subtrees, possibly living in different trees.
    pub fn same_subtree(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        if self as *const Tree == other as *const Tree && a == b {
            return true;
        }

        let (na, nb) = (self.node(a), other.node(b));

        na.kind == nb.kind
            && na.payload == nb.payload
            && na.children.len() == nb.children.len()
            && na
                .children
                .iter()
                .zip(nb.children.iter())
                .all(|(&ca, &cb)| self.same_subtree(ca, other, cb))
    }

    /// Two trees are equal when their roots are structurally equal.
    pub fn same_as(&self, other: &Tree) -> bool {
        match (self.root, other.root) {
            (Some(a), Some(b)) => self.same_subtree(a, other, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_unique() {
        let mut names: Vec<_> = Kind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Kind::ALL.len());
        assert_eq!(kind_name(Kind::BoundGenericStructure), "BoundGenericStructure");
    }

    #[test]
    fn payload_is_fixed_by_kind() {
        let mut tree = Tree::new();
        let module = tree.add_text(Kind::Module, "Swift");
        let index = tree.add_index(Kind::Index, 3);
        let list = tree.add_with_children(Kind::TypeList, vec![module, index]);

        assert_eq!(tree.text(module), Some("Swift"));
        assert_eq!(tree.index_value(module), None);
        assert_eq!(tree.index_value(index), Some(3));
        assert_eq!(tree.text(index), None);
        assert_eq!(tree.payload_kind(list), PayloadKind::None);
        assert_eq!(tree.child_count(list), 2);
        assert_eq!(tree.child_at(list, 1), Some(index));
        assert_eq!(tree.child_at(list, 2), None);
    }

    #[test]
    fn structural_equality_across_trees() {
        let build = |name: &str| {
            let mut tree = Tree::new();
            let module = tree.add_text(Kind::Module, "foo");
            let ident = tree.add_text(Kind::Identifier, name);
            let s = tree.add_with_children(Kind::Structure, vec![module, ident]);
            let root = tree.add_type(s);
            tree.set_root(root);
            tree
        };

        assert!(build("Bar").same_as(&build("Bar")));
        assert!(!build("Bar").same_as(&build("Baz")));
    }

    fn reaches_itself(tree: &Tree, id: NodeId, on_path: &mut Vec<NodeId>) -> bool {
        if on_path.contains(&id) {
            return true;
        }
        on_path.push(id);
        let cyclic = tree
            .children(id)
            .iter()
            .any(|&child| reaches_itself(tree, child, on_path));
        on_path.pop();
        cyclic
    }

    #[test]
    fn decoded_trees_are_acyclic() {
        for symbol in &[
            "_TtTP3foo3barS_3bas_PS1__PS1_S_3zimS0___",
            "_TFCF5types1gFT1bSb_T_L0_10Collection3zimfT_T_",
            "_TWlC3foo3barS0_S_8barrableS_",
            "_TFIvVs8_Process10_argumentsGSaSS_iU_FT_GSaSS_",
        ] {
            let tree = crate::mangled_symbol_to_tree(symbol.as_bytes()).unwrap();
            let root = tree.root().unwrap();
            assert!(!reaches_itself(&tree, root, &mut Vec::new()), "{}", symbol);
        }
    }
}
