//! Rendering a parse tree as readable text.
//!
//! Rendering is a pure function of the tree and the options. A node whose
//! shape does not match its kind prints as `<<Kind>>` and the rest of the
//! tree is rendered as usual.
//!
//! Entities are qualified by their context in one of two ways. Short names
//! take a prefix (`foo.Bar.baz`). Names of more than one word, and contexts
//! that print a type of their own, move the context behind the name
//! (`closure #1 () -> () in foo.bar() -> ()`).

use crate::ast::{Kind, NodeId, Tree};
use crate::parse::{STDLIB_MODULE, VALUE_WITNESSES};
use tracing::debug;

// Signatures declaring more parameters than this at one depth are not spelled out.
const MAX_PRINTED_PARAMS: u64 = 1 << 12;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DemangleOptions {
    pub display_module_names: bool,
    /// When off, the curried `self` (or `Self.Type`) argument of methods is dropped.
    pub display_implicit_self: bool,
    /// Print `[T]`, `[K : V]`, `T?` and `T!` for the standard library wrappers.
    pub synthesize_sugar_on_types: bool,
    pub qualify_entities: bool,
    /// Types printed after a colon (`foo.bar : Swift.Int`). Function-style
    /// types are part of the name and stay.
    pub display_entity_types: bool,
    pub show_private_discriminators: bool,
    /// When off, a function type prints only its argument labels: `(zim:_:)`.
    pub show_function_argument_types: bool,
    /// When off, a conformance prints only the conforming type.
    pub display_protocol_conformances: bool,
    pub display_extension_contexts: bool,
    pub display_where_clauses: bool,
    pub shorten_value_witness: bool,
    pub shorten_partial_apply: bool,
}

impl DemangleOptions {
    pub fn new() -> DemangleOptions {
        DemangleOptions {
            display_module_names: true,
            display_implicit_self: true,
            synthesize_sugar_on_types: false,
            qualify_entities: true,
            display_entity_types: true,
            show_private_discriminators: true,
            show_function_argument_types: true,
            display_protocol_conformances: true,
            display_extension_contexts: true,
            display_where_clauses: true,
            shorten_value_witness: false,
            shorten_partial_apply: false,
        }
    }

    /// Short names for user interfaces: `bar.bas(zim:)`.
    pub fn simplified() -> DemangleOptions {
        DemangleOptions {
            display_module_names: false,
            display_implicit_self: false,
            synthesize_sugar_on_types: true,
            qualify_entities: true,
            display_entity_types: false,
            show_private_discriminators: false,
            show_function_argument_types: false,
            display_protocol_conformances: false,
            display_extension_contexts: false,
            display_where_clauses: false,
            shorten_value_witness: true,
            shorten_partial_apply: true,
        }
    }
}

impl Default for DemangleOptions {
    fn default() -> DemangleOptions {
        DemangleOptions::new()
    }
}

pub fn render(tree: &Tree, options: &DemangleOptions) -> String {
    let mut printer = Printer {
        tree,
        options,
        out: String::new(),
    };

    if let Some(root) = tree.root() {
        printer.print(root);
    }

    printer.out
}

pub fn generic_param_name(depth: u64, index: u64) -> String {
    let mut name = String::new();
    let mut index = index;
    loop {
        name.push((b'A' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
    }

    if depth != 0 {
        name.push_str(&depth.to_string());
    }
    name
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TypePrinting {
    NoType,
    WithColon,
    FunctionStyle,
}

/// An entity node taken apart for printing.
struct Entity {
    context: NodeId,
    name: Option<NodeId>,
    /// Printed after the name, or in its place.
    extra: &'static str,
    extra_index: Option<u64>,
    ty: Option<NodeId>,
    type_printing: TypePrinting,
}

impl Entity {
    fn new(context: NodeId) -> Entity {
        Entity {
            context,
            name: None,
            extra: "",
            extra_index: None,
            ty: None,
            type_printing: TypePrinting::NoType,
        }
    }
}

struct Printer<'a> {
    tree: &'a Tree,
    options: &'a DemangleOptions,
    out: String,
}

impl<'a> Printer<'a> {
    fn print(&mut self, id: NodeId) {
        self.print_node(id, false);
    }

    /// Prints `id`. As a prefix context, an entity that cannot be written in
    /// front of a name prints nothing and is handed back, so that the caller
    /// can append it after ` in `.
    fn print_node(&mut self, id: NodeId, as_prefix_context: bool) -> Option<NodeId> {
        let tree = self.tree;

        match tree.kind(id) {
            Kind::Global => {
                for &child in tree.children(id) {
                    self.print(child);
                }
            }
            Kind::ObjCAttribute => self.out.push_str("@objc "),
            Kind::NonObjCAttribute => self.out.push_str("@nonobjc "),
            Kind::DynamicAttribute => self.out.push_str("dynamic "),
            Kind::DirectMethodReferenceAttribute => self.out.push_str("super "),
            Kind::VTableAttribute => self.out.push_str("override "),

            Kind::TypeMangling | Kind::Type | Kind::ReturnType => self.print_only_child(id),

            Kind::Module | Kind::Identifier | Kind::TupleElementName | Kind::BuiltinTypeName => {
                self.print_text(id, "")
            }
            Kind::PrefixOperator => self.print_text(id, " prefix"),
            Kind::PostfixOperator => self.print_text(id, " postfix"),
            Kind::InfixOperator => self.print_text(id, " infix"),

            Kind::Index | Kind::DependentGenericParamCount | Kind::Directness => {
                match tree.index_value(id) {
                    Some(value) => self.out.push_str(&value.to_string()),
                    None => self.placeholder(id),
                }
            }

            Kind::LocalDeclName => match *tree.children(id) {
                [discriminator, name] => match tree.index_value(discriminator) {
                    Some(discriminator) => {
                        self.print(name);
                        self.out.push_str(" #");
                        self.out.push_str(&discriminator.saturating_add(1).to_string());
                    }
                    None => self.placeholder(id),
                },
                _ => self.placeholder(id),
            },
            Kind::PrivateDeclName => match *tree.children(id) {
                [discriminator, name] => {
                    if self.options.show_private_discriminators {
                        self.out.push('(');
                        self.print(name);
                        self.out.push_str(" in ");
                        self.print(discriminator);
                        self.out.push(')');
                    } else {
                        self.print(name);
                    }
                }
                _ => self.placeholder(id),
            },

            Kind::Extension => match *tree.children(id) {
                [module, extended] | [module, extended, _] => {
                    if self.options.qualify_entities && self.options.display_extension_contexts {
                        self.out.push_str("(extension in ");
                        self.print(module);
                        self.out.push_str("):");
                    }
                    self.print(extended);
                }
                _ => self.placeholder(id),
            },

            Kind::BoundGenericStructure | Kind::BoundGenericClass | Kind::BoundGenericEnum => {
                self.print_bound_generic(id)
            }

            Kind::Static => match *tree.children(id) {
                [entity] => {
                    self.out.push_str("static ");
                    return self.print_node(entity, as_prefix_context);
                }
                _ => self.placeholder(id),
            },

            Kind::Structure
            | Kind::Class
            | Kind::Enum
            | Kind::Protocol
            | Kind::TypeAlias
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
            | Kind::ImplicitClosure => return self.print_entity(id, as_prefix_context),

            Kind::FunctionType
            | Kind::UncurriedFunctionType
            | Kind::ObjCBlock
            | Kind::CFunctionPointer
            | Kind::ThinFunctionType
            | Kind::AutoClosureType => self.print_function_type(id),
            Kind::ArgumentTuple => match *tree.children(id) {
                [ty] => {
                    if self.is_tuple(ty) {
                        self.print(ty);
                    } else {
                        self.out.push('(');
                        self.print(ty);
                        self.out.push(')');
                    }
                }
                _ => self.placeholder(id),
            },
            Kind::ThrowsAnnotation => self.out.push_str("throws"),

            Kind::NonVariadicTuple | Kind::VariadicTuple => {
                self.out.push('(');
                self.print_list(tree.children(id), ", ");
                if tree.kind(id) == Kind::VariadicTuple && tree.child_count(id) > 0 {
                    self.out.push_str("...");
                }
                self.out.push(')');
            }
            Kind::TupleElement => match *tree.children(id) {
                [name, ty] => {
                    self.print(name);
                    self.out.push_str(": ");
                    self.print(ty);
                }
                [ty] => self.print(ty),
                _ => self.placeholder(id),
            },

            Kind::Metatype => match *tree.children(id) {
                [ty] => {
                    self.print_postfix_operand(ty);
                    match self.inner_kind(ty) {
                        Some(Kind::ProtocolList) => self.out.push_str(".Protocol"),
                        _ => self.out.push_str(".Type"),
                    }
                }
                _ => self.placeholder(id),
            },
            Kind::ExistentialMetatype => match *tree.children(id) {
                [ty] => {
                    self.print_postfix_operand(ty);
                    self.out.push_str(".Type");
                }
                _ => self.placeholder(id),
            },
            Kind::ProtocolList => match *tree.children(id) {
                [protocols] if tree.child_count(protocols) == 0 => self.out.push_str("Any"),
                [protocols] => self.print_list(tree.children(protocols), " & "),
                _ => self.placeholder(id),
            },
            Kind::TypeList => self.print_list(tree.children(id), ", "),

            Kind::InOut => self.print_prefixed("inout ", id),
            Kind::DynamicSelf => self.out.push_str("Self"),
            Kind::ErrorType => self.out.push_str("<ERROR TYPE>"),
            Kind::Weak => self.print_prefixed("weak ", id),
            Kind::Unowned => self.print_prefixed("unowned ", id),
            Kind::Unmanaged => self.print_prefixed("unowned(unsafe) ", id),

            Kind::DependentGenericParamType => match *tree.children(id) {
                [depth, index] => match (tree.index_value(depth), tree.index_value(index)) {
                    (Some(depth), Some(index)) => {
                        self.out.push_str(&generic_param_name(depth, index))
                    }
                    _ => self.placeholder(id),
                },
                _ => self.placeholder(id),
            },
            Kind::DependentGenericType => match *tree.children(id) {
                [signature, ty] => {
                    self.print(signature);
                    if self.needs_space_before_type(ty) {
                        self.out.push(' ');
                    }
                    self.print(ty);
                }
                _ => self.placeholder(id),
            },
            Kind::DependentGenericSignature => self.print_generic_signature(id),
            Kind::DependentGenericConformanceRequirement => match *tree.children(id) {
                [param, constraint] => {
                    self.print(param);
                    self.out.push_str(": ");
                    self.print(constraint);
                }
                _ => self.placeholder(id),
            },
            Kind::DependentGenericSameTypeRequirement => match *tree.children(id) {
                [param, ty] => {
                    self.print(param);
                    self.out.push_str(" == ");
                    self.print(ty);
                }
                _ => self.placeholder(id),
            },

            Kind::TypeMetadata => self.print_prefixed("type metadata for ", id),
            Kind::TypeMetadataAccessFunction => {
                self.print_prefixed("type metadata accessor for ", id)
            }
            Kind::TypeMetadataLazyCache => {
                self.print_prefixed("lazy cache variable for type metadata for ", id)
            }
            Kind::GenericTypeMetadataPattern => {
                self.print_prefixed("generic type metadata pattern for ", id)
            }
            Kind::Metaclass => self.print_prefixed("metaclass for ", id),
            Kind::NominalTypeDescriptor => self.print_prefixed("nominal type descriptor for ", id),
            Kind::FullTypeMetadata => self.print_prefixed("full type metadata for ", id),
            Kind::ProtocolDescriptor => self.print_prefixed("protocol descriptor for ", id),

            Kind::ValueWitness => match *tree.children(id) {
                [witness, ty] => {
                    let name = tree
                        .index_value(witness)
                        .and_then(|w| VALUE_WITNESSES.get(w as usize))
                        .map(|&(_, name)| name);
                    match name {
                        Some(name) => {
                            self.out.push_str(name);
                            if self.options.shorten_value_witness {
                                self.out.push_str(" for ");
                            } else {
                                self.out.push_str(" value witness for ");
                            }
                            self.print(ty);
                        }
                        None => self.placeholder(id),
                    }
                }
                _ => self.placeholder(id),
            },
            Kind::ValueWitnessTable => self.print_prefixed("value witness table for ", id),
            Kind::FieldOffset => match *tree.children(id) {
                [directness, entity] => {
                    match tree.index_value(directness) {
                        Some(0) => self.out.push_str("direct field offset for "),
                        Some(1) => self.out.push_str("indirect field offset for "),
                        _ => {
                            self.placeholder(id);
                            return None;
                        }
                    }
                    self.print(entity);
                }
                _ => self.placeholder(id),
            },
            Kind::ProtocolConformance => match *tree.children(id) {
                [ty, protocol, context] => {
                    self.print(ty);
                    if self.options.display_protocol_conformances {
                        self.out.push_str(" : ");
                        self.print(protocol);
                        self.out.push_str(" in ");
                        self.print(context);
                    }
                }
                _ => self.placeholder(id),
            },
            Kind::ProtocolWitnessTable => self.print_prefixed("protocol witness table for ", id),
            Kind::GenericProtocolWitnessTable => {
                self.print_prefixed("generic protocol witness table for ", id)
            }
            Kind::GenericProtocolWitnessTableInstantiationFunction => self.print_prefixed(
                "instantiation function for generic protocol witness table for ",
                id,
            ),
            Kind::ProtocolWitnessTableAccessor => {
                self.print_prefixed("protocol witness table accessor for ", id)
            }
            Kind::LazyProtocolWitnessTableAccessor | Kind::LazyProtocolWitnessTableCacheVariable => {
                match *tree.children(id) {
                    [ty, conformance] => {
                        if tree.kind(id) == Kind::LazyProtocolWitnessTableAccessor {
                            self.out.push_str("lazy protocol witness table accessor for type ");
                        } else {
                            self.out
                                .push_str("lazy protocol witness table cache variable for type ");
                        }
                        self.print(ty);
                        self.out.push_str(" and conformance ");
                        self.print(conformance);
                    }
                    _ => self.placeholder(id),
                }
            }
            Kind::AssociatedTypeMetadataAccessor => match *tree.children(id) {
                [conformance, name] => {
                    self.out.push_str("associated type metadata accessor for ");
                    self.print(name);
                    self.out.push_str(" in ");
                    self.print(conformance);
                }
                _ => self.placeholder(id),
            },
            Kind::AssociatedTypeWitnessTableAccessor => match *tree.children(id) {
                [conformance, name, protocol] => {
                    self.out.push_str("associated type witness table accessor for ");
                    self.print(name);
                    self.out.push_str(" : ");
                    self.print(protocol);
                    self.out.push_str(" in ");
                    self.print(conformance);
                }
                _ => self.placeholder(id),
            },
            Kind::ProtocolWitness => match *tree.children(id) {
                [conformance, entity] => {
                    self.out.push_str("protocol witness for ");
                    self.print(entity);
                    self.out.push_str(" in conformance ");
                    self.print(conformance);
                }
                _ => self.placeholder(id),
            },
            Kind::ReabstractionThunk | Kind::ReabstractionThunkHelper => {
                match *tree.children(id) {
                    [from, to] => {
                        if tree.kind(id) == Kind::ReabstractionThunkHelper {
                            self.out.push_str("reabstraction thunk helper from ");
                        } else {
                            self.out.push_str("reabstraction thunk from ");
                        }
                        self.print(from);
                        self.out.push_str(" to ");
                        self.print(to);
                    }
                    _ => self.placeholder(id),
                }
            }
            Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder => {
                self.out.push_str(match tree.kind(id) {
                    _ if self.options.shorten_partial_apply => "partial apply",
                    Kind::PartialApplyForwarder => "partial apply forwarder",
                    _ => "partial apply ObjC forwarder",
                });
                match *tree.children(id) {
                    [] => {}
                    [target] => {
                        self.out.push_str(" for ");
                        self.print(target);
                    }
                    _ => self.placeholder(id),
                }
            }
        }

        None
    }

    fn placeholder(&mut self, id: NodeId) {
        let kind = self.tree.kind(id);
        debug!(
            kind = kind.name(),
            children = self.tree.child_count(id),
            "unexpected node shape"
        );
        self.out.push_str("<<");
        self.out.push_str(kind.name());
        self.out.push_str(">>");
    }

    fn print_text(&mut self, id: NodeId, suffix: &str) {
        match self.tree.text(id) {
            Some(text) => {
                self.out.push_str(text);
                self.out.push_str(suffix);
            }
            None => self.placeholder(id),
        }
    }

    fn print_only_child(&mut self, id: NodeId) {
        match *self.tree.children(id) {
            [child] => self.print(child),
            _ => self.placeholder(id),
        }
    }

    fn print_prefixed(&mut self, prefix: &str, id: NodeId) {
        match *self.tree.children(id) {
            [child] => {
                self.out.push_str(prefix);
                self.print(child);
            }
            _ => self.placeholder(id),
        }
    }

    fn print_list(&mut self, items: &[NodeId], separator: &str) {
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(separator);
            }
            self.print(item);
        }
    }

    /// Whether an entity is qualified by `context` at all.
    fn prints_context(&self, context: NodeId) -> bool {
        if !self.options.qualify_entities {
            return false;
        }

        self.tree.kind(context) != Kind::Module || self.options.display_module_names
    }

    /// The kind of the node a `Type` wrapper stands for.
    fn inner_kind(&self, ty: NodeId) -> Option<Kind> {
        self.unwrap_type(ty).map(|inner| self.tree.kind(inner))
    }

    fn unwrap_type(&self, ty: NodeId) -> Option<NodeId> {
        match (self.tree.kind(ty), self.tree.children(ty)) {
            (Kind::Type, &[inner]) => Some(inner),
            _ => None,
        }
    }

    fn is_tuple(&self, ty: NodeId) -> bool {
        match self.inner_kind(ty) {
            Some(Kind::NonVariadicTuple) | Some(Kind::VariadicTuple) => true,
            _ => false,
        }
    }

    fn needs_space_before_type(&self, ty: NodeId) -> bool {
        match self.inner_kind(ty) {
            Some(Kind::FunctionType)
            | Some(Kind::UncurriedFunctionType)
            | Some(Kind::DependentGenericType) => false,
            _ => true,
        }
    }

    /// Whether `ty`, under any generic signatures, can follow a name directly.
    fn is_function_style_type(&self, ty: NodeId) -> bool {
        let tree = self.tree;
        let mut inner = self.unwrap_type(ty);
        while let Some(generic) = inner {
            if tree.kind(generic) != Kind::DependentGenericType {
                break;
            }
            inner = tree
                .child_at(generic, 1)
                .and_then(|ty| self.unwrap_type(ty));
        }

        match inner.map(|inner| tree.kind(inner)) {
            Some(Kind::FunctionType)
            | Some(Kind::UncurriedFunctionType)
            | Some(Kind::CFunctionPointer)
            | Some(Kind::ThinFunctionType) => true,
            _ => false,
        }
    }

    fn needs_parens_as_postfix_operand(&self, ty: NodeId) -> bool {
        match self.unwrap_type(ty) {
            Some(inner) => {
                let kind = self.tree.kind(inner);
                kind.is_function_type()
                    || kind == Kind::InOut
                    || (kind == Kind::ProtocolList
                        && self
                            .tree
                            .child_at(inner, 0)
                            .map_or(false, |list| self.tree.child_count(list) > 1))
            }
            None => false,
        }
    }

    fn print_postfix_operand(&mut self, ty: NodeId) {
        if self.needs_parens_as_postfix_operand(ty) {
            self.out.push('(');
            self.print(ty);
            self.out.push(')');
        } else {
            self.print(ty);
        }
    }

    fn print_function_type(&mut self, id: NodeId) {
        let tree = self.tree;

        let (throws, args, result) = match *tree.children(id) {
            [throws, args, result] if tree.kind(throws) == Kind::ThrowsAnnotation => {
                (true, args, result)
            }
            [args, result] => (false, args, result),
            _ => return self.placeholder(id),
        };

        if tree.kind(args) != Kind::ArgumentTuple || tree.kind(result) != Kind::ReturnType {
            return self.placeholder(id);
        }

        self.out.push_str(match tree.kind(id) {
            Kind::ObjCBlock => "@convention(block) ",
            Kind::CFunctionPointer => "@convention(c) ",
            Kind::ThinFunctionType => "@convention(thin) ",
            Kind::AutoClosureType => "@autoclosure ",
            _ => "",
        });

        if !self.options.show_function_argument_types {
            return self.print_argument_labels(args);
        }

        self.print(args);
        if throws {
            self.out.push_str(" throws");
        }
        self.out.push_str(" -> ");
        self.print(result);
    }

    /// `(label:_:)` for a tuple of arguments, `(_:)` for a single one.
    fn print_argument_labels(&mut self, args: NodeId) {
        let tree = self.tree;
        let params = match tree.child_at(args, 0).and_then(|ty| self.unwrap_type(ty)) {
            Some(params) => params,
            None => return self.placeholder(args),
        };

        match tree.kind(params) {
            Kind::NonVariadicTuple | Kind::VariadicTuple => {
                self.out.push('(');
                for &element in tree.children(params) {
                    match *tree.children(element) {
                        [label, _] => self.print(label),
                        _ => self.out.push('_'),
                    }
                    self.out.push(':');
                }
                self.out.push(')');
            }
            _ => self.out.push_str("(_:)"),
        }
    }

    /// Returns the standard library name of a nominal type, if it is one.
    fn stdlib_type_name(&self, nominal: NodeId) -> Option<(Kind, &'a str)> {
        let tree = self.tree;
        match *tree.children(nominal) {
            [module, name]
                if tree.kind(module) == Kind::Module
                    && tree.text(module) == Some(STDLIB_MODULE)
                    && tree.kind(name) == Kind::Identifier =>
            {
                tree.text(name).map(|name| (tree.kind(nominal), name))
            }
            _ => None,
        }
    }

    fn print_bound_generic(&mut self, id: NodeId) {
        let tree = self.tree;

        let (nominal, args) = match *tree.children(id) {
            [nominal, args] if tree.kind(args) == Kind::TypeList => (nominal, args),
            _ => return self.placeholder(id),
        };

        if self.options.synthesize_sugar_on_types {
            let sugar = self
                .unwrap_type(nominal)
                .and_then(|inner| self.stdlib_type_name(inner));

            match (sugar, tree.children(args)) {
                (Some((Kind::Structure, "Array")), &[element]) => {
                    self.out.push('[');
                    self.print(element);
                    self.out.push(']');
                    return;
                }
                (Some((Kind::Structure, "Dictionary")), &[key, value]) => {
                    self.out.push('[');
                    self.print(key);
                    self.out.push_str(" : ");
                    self.print(value);
                    self.out.push(']');
                    return;
                }
                (Some((Kind::Enum, "Optional")), &[wrapped]) => {
                    self.print_postfix_operand(wrapped);
                    self.out.push('?');
                    return;
                }
                (Some((Kind::Enum, "ImplicitlyUnwrappedOptional")), &[wrapped]) => {
                    self.print_postfix_operand(wrapped);
                    self.out.push('!');
                    return;
                }
                _ => {}
            }
        }

        self.print(nominal);
        self.out.push('<');
        self.print(args);
        self.out.push('>');
    }

    fn print_generic_signature(&mut self, id: NodeId) {
        let tree = self.tree;
        let children = tree.children(id);

        let count_len = children
            .iter()
            .take_while(|&&c| tree.kind(c) == Kind::DependentGenericParamCount)
            .count();
        let (counts, requirements) = children.split_at(count_len);

        let counts: Option<Vec<u64>> = counts.iter().map(|&c| tree.index_value(c)).collect();
        let counts = match counts {
            Some(ref counts) if counts.iter().all(|&c| c <= MAX_PRINTED_PARAMS) => counts,
            _ => return self.placeholder(id),
        };

        self.out.push('<');
        for (depth, &count) in counts.iter().enumerate() {
            if depth > 0 {
                self.out.push_str("><");
            }
            for index in 0..count {
                if index > 0 {
                    self.out.push_str(", ");
                }
                self.out
                    .push_str(&generic_param_name(depth as u64, index));
            }
        }

        if !requirements.is_empty() && self.options.display_where_clauses {
            self.out.push_str(" where ");
            self.print_list(requirements, ", ");
        }
        self.out.push('>');
    }

    /// Drops the curried `self` argument: `(Self) -> F` becomes `F` when the
    /// argument is the entity's own context or its metatype.
    fn strip_implicit_self(&self, context: NodeId, ty: NodeId) -> NodeId {
        if self.options.display_implicit_self {
            return ty;
        }

        let tree = self.tree;
        let function = match self.unwrap_type(ty) {
            Some(function) if tree.kind(function).is_function_type() => function,
            _ => return ty,
        };

        let (args, result) = match *tree.children(function) {
            [_, args, result] | [args, result] => (args, result),
            _ => return ty,
        };

        let self_type = match tree
            .child_at(args, 0)
            .and_then(|arg| self.unwrap_type(arg))
        {
            Some(self_type) => self_type,
            None => return ty,
        };

        let is_self = tree.same_subtree(self_type, tree, context)
            || (tree.kind(self_type) == Kind::Metatype
                && tree
                    .child_at(self_type, 0)
                    .and_then(|meta| self.unwrap_type(meta))
                    .map_or(false, |inner| tree.same_subtree(inner, tree, context)));

        match tree.child_at(result, 0) {
            Some(inner)
                if is_self
                    && self
                        .inner_kind(inner)
                        .map_or(false, |kind| kind.is_function_type()) =>
            {
                inner
            }
            _ => ty,
        }
    }

    fn entity_parts(&self, id: NodeId) -> Option<Entity> {
        let tree = self.tree;
        let kind = tree.kind(id);
        let is_class = |context: NodeId| tree.kind(context) == Kind::Class;
        let index = |index: NodeId| tree.index_value(index);

        let entity = match (kind, tree.children(id)) {
            (Kind::Structure, &[context, name])
            | (Kind::Class, &[context, name])
            | (Kind::Enum, &[context, name])
            | (Kind::Protocol, &[context, name])
            | (Kind::TypeAlias, &[context, name]) => Entity {
                name: Some(name),
                ..Entity::new(context)
            },
            (Kind::Function, &[context, name, ty]) => Entity {
                name: Some(name),
                ty: Some(ty),
                type_printing: TypePrinting::FunctionStyle,
                ..Entity::new(context)
            },
            (Kind::Variable, &[context, name, ty]) => Entity {
                name: Some(name),
                ty: Some(ty),
                type_printing: TypePrinting::WithColon,
                ..Entity::new(context)
            },
            (Kind::Subscript, &[context, _, ty]) => Entity {
                extra: "subscript",
                ty: Some(ty),
                type_printing: TypePrinting::FunctionStyle,
                ..Entity::new(context)
            },
            (Kind::Allocator, &[context, ty]) => Entity {
                extra: if is_class(context) { "__allocating_init" } else { "init" },
                ty: Some(ty),
                type_printing: TypePrinting::FunctionStyle,
                ..Entity::new(context)
            },
            (Kind::Constructor, &[context, ty]) => Entity {
                extra: "init",
                ty: Some(ty),
                type_printing: TypePrinting::FunctionStyle,
                ..Entity::new(context)
            },
            (Kind::Destructor, &[context]) => Entity {
                extra: "deinit",
                ..Entity::new(context)
            },
            (Kind::Deallocator, &[context]) => Entity {
                extra: if is_class(context) { "__deallocating_deinit" } else { "deinit" },
                ..Entity::new(context)
            },
            (Kind::IVarInitializer, &[context]) => Entity {
                extra: "__ivar_initializer",
                ..Entity::new(context)
            },
            (Kind::IVarDestroyer, &[context]) => Entity {
                extra: "__ivar_destroyer",
                ..Entity::new(context)
            },
            (Kind::Initializer, &[context]) => Entity {
                extra: "variable initialization expression",
                ..Entity::new(context)
            },
            (Kind::DefaultArgumentInitializer, &[context, position]) => Entity {
                extra: "default argument ",
                extra_index: Some(index(position)?),
                ..Entity::new(context)
            },
            (Kind::ExplicitClosure, &[context, position, ty])
            | (Kind::ImplicitClosure, &[context, position, ty]) => Entity {
                extra: if kind == Kind::ExplicitClosure {
                    "closure #"
                } else {
                    "implicit closure #"
                },
                extra_index: Some(index(position)?.saturating_add(1)),
                ty: Some(ty),
                type_printing: if self.options.show_function_argument_types {
                    TypePrinting::FunctionStyle
                } else {
                    TypePrinting::NoType
                },
                ..Entity::new(context)
            },
            (_, &[context, name, ty]) if accessor_suffix(kind).is_some() => Entity {
                name: Some(name),
                extra: accessor_suffix(kind)?,
                ty: Some(ty),
                type_printing: TypePrinting::WithColon,
                ..Entity::new(context)
            },
            _ => return None,
        };

        Some(entity)
    }

    fn print_entity(&mut self, id: NodeId, as_prefix_context: bool) -> Option<NodeId> {
        let tree = self.tree;
        let entity = match self.entity_parts(id) {
            Some(entity) => entity,
            None => {
                self.placeholder(id);
                return None;
            }
        };

        // `Bar #1` reads badly after a prefix, so local names move their
        // context behind them like `closure #1` does.
        let multi_word_name = entity.extra.contains(' ')
            || entity
                .name
                .map_or(false, |name| tree.kind(name) == Kind::LocalDeclName);

        if as_prefix_context
            && (entity.type_printing != TypePrinting::NoType || multi_word_name)
        {
            return Some(id);
        }

        let mut postfix_context = None;
        if self.prints_context(entity.context) {
            if multi_word_name {
                postfix_context = Some(entity.context);
            } else {
                let before = self.out.len();
                postfix_context = self.print_node(entity.context, true);
                if self.out.len() != before {
                    self.out.push('.');
                }
            }
        }

        if let Some(name) = entity.name {
            self.print(name);
            if !entity.extra.is_empty() {
                self.out.push('.');
            }
        }
        self.out.push_str(entity.extra);
        if let Some(index) = entity.extra_index {
            self.out.push_str(&index.to_string());
        }

        if let Some(ty) = entity.ty {
            let ty = self.strip_implicit_self(entity.context, ty);

            let mut type_printing = entity.type_printing;
            if type_printing == TypePrinting::FunctionStyle && !self.is_function_style_type(ty) {
                type_printing = TypePrinting::WithColon;
            }

            match type_printing {
                TypePrinting::NoType => {}
                TypePrinting::WithColon => {
                    if self.options.display_entity_types {
                        self.out.push_str(" : ");
                        self.print(ty);
                    }
                }
                TypePrinting::FunctionStyle => {
                    if multi_word_name || self.needs_space_before_type(ty) {
                        self.out.push(' ');
                    }
                    self.print(ty);
                }
            }
        }

        match postfix_context {
            Some(context) if !as_prefix_context => {
                match tree.kind(id) {
                    Kind::Initializer | Kind::DefaultArgumentInitializer => {
                        self.out.push_str(" of ")
                    }
                    _ => self.out.push_str(" in "),
                }
                self.print(context);
                None
            }
            other => other,
        }
    }
}

fn accessor_suffix(kind: Kind) -> Option<&'static str> {
    Some(match kind {
        Kind::Getter | Kind::GlobalGetter => "getter",
        Kind::Setter => "setter",
        Kind::MaterializeForSet => "materializeForSet",
        Kind::WillSet => "willset",
        Kind::DidSet => "didset",
        Kind::OwningAddressor => "owningAddressor",
        Kind::OwningMutableAddressor => "owningMutableAddressor",
        Kind::NativeOwningAddressor => "nativeOwningAddressor",
        Kind::NativeOwningMutableAddressor => "nativeOwningMutableAddressor",
        Kind::NativePinningAddressor => "nativePinningAddressor",
        Kind::NativePinningMutableAddressor => "nativePinningMutableAddressor",
        Kind::UnsafeAddressor => "unsafeAddressor",
        Kind::UnsafeMutableAddressor => "unsafeMutableAddressor",
        _ => return None,
    })
}
