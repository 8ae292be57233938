//! Re-encoding a parse tree into the classic mangling.
//!
//! Substitution indices are derived from scratch: the remangler keeps its own
//! `SubstitutionCache` and registers nodes at exactly the points where the
//! decoder will register them when it reads the output back. Standard
//! substitutions and the `Swift`, `__ObjC` and `__C` modules are always
//! written in their short form.

use crate::ast::{Kind, NodeId, Tree};
use crate::charset;
use crate::error::{Error, Result};
use crate::parse::{
    CLANG_IMPORTER_MODULE, MAX_DEPTH, OBJC_MODULE, STANDARD_SUBSTITUTIONS, STDLIB_MODULE,
    VALUE_WITNESSES,
};
use crate::subst::SubstitutionCache;

/// Re-encodes a tree produced by `parse_symbol` (rooted at `Global`) or
/// `parse_type` (rooted at `Type`).
pub fn remangle(tree: &Tree) -> Result<String> {
    let root = match tree.root() {
        Some(root) => root,
        None => {
            return Err(Error::UnknownNodeShape {
                kind: Kind::Global,
                children: 0,
            })
        }
    };

    let mut remangler = Remangler {
        tree,
        out: String::new(),
        substitutions: SubstitutionCache::new(),
        depth: 0,
    };

    match tree.kind(root) {
        Kind::Global => remangler.mangle_top_level(root)?,
        Kind::Type => remangler.mangle_type(root)?,
        _ => return remangler.bad_shape(root),
    }

    Ok(remangler.out)
}

/// The `S<code>` letter for a standard library type, if `node` is one.
fn standard_substitution(tree: &Tree, node: NodeId) -> Option<u8> {
    let (module, name) = match *tree.children(node) {
        [module, name] => (module, name),
        _ => return None,
    };

    if tree.kind(module) != Kind::Module
        || tree.text(module) != Some(STDLIB_MODULE)
        || tree.kind(name) != Kind::Identifier
    {
        return None;
    }

    let kind = tree.kind(node);
    let name = tree.text(name)?;
    STANDARD_SUBSTITUTIONS
        .iter()
        .find(|&&(_, k, n)| k == kind && n == name)
        .map(|&(code, _, _)| code)
}

/// Parses a decimal number, accepting only the form the decoder would print.
fn canonical_number(digits: &str) -> Option<u64> {
    let n: u64 = digits.parse().ok()?;
    if n.to_string() == digits {
        Some(n)
    } else {
        None
    }
}

fn builtin_code(text: &str) -> Option<String> {
    const PREFIX: &str = "Builtin.";
    if !text.starts_with(PREFIX) {
        return None;
    }
    let name = &text[PREFIX.len()..];

    let code = match name {
        "BridgeObject" => "b".to_string(),
        "UnsafeValueBuffer" => "B".to_string(),
        "UnknownObject" => "O".to_string(),
        "NativeObject" => "o".to_string(),
        "RawPointer" => "p".to_string(),
        "Word" => "w".to_string(),
        _ if name.starts_with("FPIEEE") => format!("f{}_", canonical_number(&name[6..])?),
        _ if name.starts_with("Int") => format!("i{}_", canonical_number(&name[3..])?),
        _ if name.starts_with("Vec") => {
            let rest = &name[3..];
            let x = rest.find('x')?;
            let elements = canonical_number(&rest[..x])?;
            let element = &rest[x + 1..];

            let element = if element == "RawPointer" {
                "p".to_string()
            } else if element.starts_with("FPIEEE") {
                format!("f{}_", canonical_number(&element[6..])?)
            } else if element.starts_with("Int") {
                format!("i{}_", canonical_number(&element[3..])?)
            } else {
                return None;
            };

            format!("v{}B{}", elements, element)
        }
        _ => return None,
    };

    Some(code)
}

fn accessor_code(kind: Kind) -> Option<&'static str> {
    Some(match kind {
        Kind::Getter => "g",
        Kind::GlobalGetter => "G",
        Kind::Setter => "s",
        Kind::MaterializeForSet => "m",
        Kind::WillSet => "w",
        Kind::DidSet => "W",
        Kind::OwningMutableAddressor => "aO",
        Kind::NativeOwningMutableAddressor => "ao",
        Kind::NativePinningMutableAddressor => "ap",
        Kind::UnsafeMutableAddressor => "au",
        Kind::OwningAddressor => "lO",
        Kind::NativeOwningAddressor => "lo",
        Kind::NativePinningAddressor => "lp",
        Kind::UnsafeAddressor => "lu",
        _ => return None,
    })
}

struct Remangler<'a> {
    tree: &'a Tree,
    out: String,
    substitutions: SubstitutionCache,
    depth: usize,
}

impl<'a> Remangler<'a> {
    fn bad_shape<T>(&self, id: NodeId) -> Result<T> {
        Err(Error::UnknownNodeShape {
            kind: self.tree.kind(id),
            children: self.tree.child_count(id),
        })
    }

    // Nests at the same productions as the decoder, so every tree it accepted
    // stays within the limit here.
    fn nested<F>(&mut self, production: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(Error::DepthExceeded { limit: MAX_DEPTH });
        }

        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    /// The first byte written since `start`.
    fn first_byte_since(&self, start: usize) -> u8 {
        self.out.as_bytes().get(start).cloned().unwrap_or(0)
    }

    fn push_index(&mut self, value: u64) {
        if value > 0 {
            self.out.push_str(&(value - 1).to_string());
        }
        self.out.push('_');
    }

    fn push_length_prefixed(&mut self, text: &str) {
        self.out.push_str(&text.len().to_string());
        self.out.push_str(text);
    }

    fn index_of(&self, id: NodeId) -> Result<u64> {
        match self.tree.index_value(id) {
            Some(value) => Ok(value),
            None => self.bad_shape(id),
        }
    }

    /// Writes a short form for `id` if one exists: a standard substitution,
    /// one of the special modules, or a back reference.
    fn try_substitution(&mut self, id: NodeId) -> bool {
        let tree = self.tree;

        if let Some(code) = standard_substitution(tree, id) {
            self.out.push('S');
            self.out.push(code as char);
            return true;
        }

        if tree.kind(id) == Kind::Module {
            match tree.text(id) {
                Some(OBJC_MODULE) => {
                    self.out.push_str("So");
                    return true;
                }
                Some(CLANG_IMPORTER_MODULE) => {
                    self.out.push_str("SC");
                    return true;
                }
                _ => {}
            }
        }

        if let Some(index) = self.substitutions.lookup(tree, id) {
            self.out.push('S');
            self.push_index(index);
            return true;
        }

        false
    }

    fn mangle_top_level(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        self.out.push_str("_T");

        let body = match *tree.children(id) {
            [attribute, body] => {
                self.out.push_str(match tree.kind(attribute) {
                    Kind::ObjCAttribute => "To",
                    Kind::NonObjCAttribute => "TO",
                    Kind::DynamicAttribute => "TD",
                    Kind::DirectMethodReferenceAttribute => "Td",
                    Kind::VTableAttribute => "TV",
                    _ => return self.bad_shape(attribute),
                });
                body
            }
            [body] => body,
            _ => return self.bad_shape(id),
        };

        self.mangle_global(body)
    }

    fn mangle_global(&mut self, id: NodeId) -> Result<()> {
        self.nested(|r| r.mangle_global_impl(id))
    }

    fn mangle_global_impl(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let kind = tree.kind(id);
        let children = tree.children(id);

        let metadata = match kind {
            Kind::TypeMetadata => Some(""),
            Kind::GenericTypeMetadataPattern => Some("P"),
            Kind::TypeMetadataAccessFunction => Some("a"),
            Kind::TypeMetadataLazyCache => Some("L"),
            Kind::Metaclass => Some("m"),
            Kind::NominalTypeDescriptor => Some("n"),
            Kind::FullTypeMetadata => Some("f"),
            Kind::ProtocolDescriptor => Some("p"),
            _ => None,
        };

        if let Some(code) = metadata {
            let ty = match *children {
                [ty] => ty,
                _ => return self.bad_shape(id),
            };

            self.out.push('M');
            self.out.push_str(code);
            if kind == Kind::ProtocolDescriptor {
                return self.mangle_protocol_name(ty);
            }

            let start = self.out.len();
            self.mangle_type(ty)?;

            // A plain type metadata symbol must not read as one of the others.
            if kind == Kind::TypeMetadata {
                match self.first_byte_since(start) {
                    b'P' | b'a' | b'L' | b'm' | b'n' | b'f' | b'p' => return self.bad_shape(id),
                    _ => {}
                }
            }
            return Ok(());
        }

        match (kind, children) {
            (Kind::PartialApplyForwarder, _) | (Kind::PartialApplyObjCForwarder, _) => {
                self.out.push_str("PA");
                if kind == Kind::PartialApplyObjCForwarder {
                    self.out.push('o');
                }
                match *children {
                    [] => Ok(()),
                    [target] => {
                        self.out.push_str("__T");
                        self.mangle_global(target)
                    }
                    _ => self.bad_shape(id),
                }
            }
            (Kind::TypeMangling, &[ty]) => {
                self.out.push('t');
                self.mangle_type(ty)
            }
            (Kind::ValueWitness, &[witness, ty]) => {
                let witness = self.index_of(witness)?;
                match VALUE_WITNESSES.get(witness as usize) {
                    Some(&(code, _)) => {
                        self.out.push('w');
                        self.out.push_str(code);
                    }
                    None => return self.bad_shape(id),
                }
                self.mangle_type(ty)
            }
            (Kind::ValueWitnessTable, &[ty]) => {
                self.out.push_str("WV");
                self.mangle_type(ty)
            }
            (Kind::FieldOffset, &[directness, entity]) => {
                self.out.push_str(match self.index_of(directness)? {
                    0 => "Wvd",
                    1 => "Wvi",
                    _ => return self.bad_shape(directness),
                });
                self.mangle_entity(entity)
            }
            (Kind::ProtocolWitnessTable, &[conformance])
            | (Kind::GenericProtocolWitnessTable, &[conformance])
            | (Kind::GenericProtocolWitnessTableInstantiationFunction, &[conformance])
            | (Kind::ProtocolWitnessTableAccessor, &[conformance]) => {
                self.out.push_str(match kind {
                    Kind::ProtocolWitnessTable => "WP",
                    Kind::GenericProtocolWitnessTable => "WG",
                    Kind::GenericProtocolWitnessTableInstantiationFunction => "WI",
                    _ => "Wa",
                });
                self.mangle_protocol_conformance(conformance)
            }
            (Kind::LazyProtocolWitnessTableAccessor, &[ty, conformance])
            | (Kind::LazyProtocolWitnessTableCacheVariable, &[ty, conformance]) => {
                if kind == Kind::LazyProtocolWitnessTableAccessor {
                    self.out.push_str("Wl");
                } else {
                    self.out.push_str("WL");
                }
                self.mangle_type(ty)?;
                self.mangle_protocol_conformance(conformance)
            }
            (Kind::AssociatedTypeMetadataAccessor, &[conformance, name]) => {
                self.out.push_str("Wt");
                self.mangle_protocol_conformance(conformance)?;
                self.mangle_decl_name(name)
            }
            (Kind::AssociatedTypeWitnessTableAccessor, &[conformance, name, protocol]) => {
                self.out.push_str("WT");
                self.mangle_protocol_conformance(conformance)?;
                self.mangle_decl_name(name)?;
                self.mangle_protocol_name(protocol)
            }
            (Kind::ProtocolWitness, &[conformance, entity]) => {
                self.out.push_str("TW");
                self.mangle_protocol_conformance(conformance)?;
                self.mangle_entity(entity)
            }
            (Kind::ReabstractionThunkHelper, &[from, to])
            | (Kind::ReabstractionThunk, &[from, to]) => {
                if kind == Kind::ReabstractionThunkHelper {
                    self.out.push_str("TR");
                } else {
                    self.out.push_str("Tr");
                }
                self.mangle_type(from)?;
                self.mangle_type(to)
            }
            _ => self.mangle_entity(id),
        }
    }

    fn mangle_protocol_conformance(&mut self, id: NodeId) -> Result<()> {
        match (self.tree.kind(id), self.tree.children(id)) {
            (Kind::ProtocolConformance, &[ty, protocol, context]) => {
                self.mangle_type(ty)?;
                self.mangle_protocol_name(protocol)?;
                self.mangle_context(context)
            }
            _ => self.bad_shape(id),
        }
    }

    fn mangle_entity(&mut self, id: NodeId) -> Result<()> {
        self.nested(|r| r.mangle_entity_impl(id))
    }

    fn mangle_entity_impl(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let kind = tree.kind(id);

        if kind == Kind::Static {
            return match *tree.children(id) {
                [inner] if !tree.kind(inner).is_nominal() && tree.kind(inner) != Kind::Static => {
                    self.out.push('Z');
                    self.mangle_entity_body(inner)
                }
                _ => self.bad_shape(id),
            };
        }

        if kind.is_nominal() {
            return self.mangle_nominal(id, false);
        }

        self.mangle_entity_body(id)
    }

    fn mangle_entity_body(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let kind = tree.kind(id);

        match (kind, tree.children(id)) {
            (Kind::Function, &[context, name, ty])
            | (Kind::Variable, &[context, name, ty])
            | (Kind::Subscript, &[context, name, ty]) => {
                self.out.push(match kind {
                    Kind::Function => 'F',
                    Kind::Variable => 'v',
                    _ => 'i',
                });
                self.mangle_context(context)?;
                self.mangle_decl_name(name)?;
                self.mangle_type(ty)
            }
            (Kind::Initializer, &[context]) => {
                self.out.push('I');
                self.mangle_context(context)?;
                self.out.push('i');
                Ok(())
            }
            (Kind::DefaultArgumentInitializer, &[context, index]) => {
                let index = self.index_of(index)?;
                self.out.push('I');
                self.mangle_context(context)?;
                self.out.push('A');
                self.push_index(index);
                Ok(())
            }
            (Kind::Allocator, &[context, ty]) | (Kind::Constructor, &[context, ty]) => {
                self.out.push('F');
                self.mangle_context(context)?;
                self.out.push(if kind == Kind::Allocator { 'C' } else { 'c' });
                self.mangle_type(ty)
            }
            (Kind::Destructor, &[context])
            | (Kind::Deallocator, &[context])
            | (Kind::IVarInitializer, &[context])
            | (Kind::IVarDestroyer, &[context]) => {
                self.out.push('F');
                self.mangle_context(context)?;
                self.out.push(match kind {
                    Kind::Destructor => 'd',
                    Kind::Deallocator => 'D',
                    Kind::IVarInitializer => 'e',
                    _ => 'E',
                });
                Ok(())
            }
            (Kind::ExplicitClosure, &[context, index, ty])
            | (Kind::ImplicitClosure, &[context, index, ty]) => {
                let index = self.index_of(index)?;
                self.out.push('F');
                self.mangle_context(context)?;
                self.out
                    .push(if kind == Kind::ExplicitClosure { 'U' } else { 'u' });
                self.push_index(index);
                self.mangle_type(ty)
            }
            (_, &[context, name, ty]) => match accessor_code(kind) {
                Some(code) => {
                    self.out.push('F');
                    self.mangle_context(context)?;
                    self.out.push_str(code);
                    self.mangle_decl_name(name)?;
                    self.mangle_type(ty)
                }
                None => self.bad_shape(id),
            },
            _ => self.bad_shape(id),
        }
    }

    fn mangle_context(&mut self, id: NodeId) -> Result<()> {
        self.nested(|r| r.mangle_context_impl(id))
    }

    fn mangle_context_impl(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        match (tree.kind(id), tree.children(id)) {
            (Kind::Module, _) => self.mangle_module(id),
            (Kind::Extension, &[module, extended]) => {
                self.out.push('E');
                self.mangle_module(module)?;
                self.mangle_context(extended)
            }
            (Kind::Extension, &[module, extended, signature]) => {
                self.out.push('e');
                self.mangle_module(module)?;
                self.mangle_generic_signature(signature)?;
                self.mangle_context(extended)
            }
            (Kind::BoundGenericStructure, _)
            | (Kind::BoundGenericClass, _)
            | (Kind::BoundGenericEnum, _) => {
                self.out.push('G');
                self.mangle_bound_generic(id)
            }
            // A subscript cannot be read back as a context.
            (Kind::Subscript, _) => self.bad_shape(id),
            (kind, _) if kind.is_context() || kind == Kind::Static => self.mangle_entity(id),
            _ => self.bad_shape(id),
        }
    }

    fn mangle_module(&mut self, id: NodeId) -> Result<()> {
        if self.tree.kind(id) != Kind::Module {
            return self.bad_shape(id);
        }

        if self.tree.text(id) == Some(STDLIB_MODULE) {
            self.out.push('s');
            return Ok(());
        }

        if self.try_substitution(id) {
            return Ok(());
        }

        self.mangle_identifier(id)?;
        self.substitutions.register(id);
        Ok(())
    }

    /// `in_type_position` selects between the type grammar (which spells type
    /// aliases with `a`) and the entity grammar (which spells protocols with `P`).
    fn mangle_nominal(&mut self, id: NodeId, in_type_position: bool) -> Result<()> {
        if self.try_substitution(id) {
            return Ok(());
        }

        let letter = match self.tree.kind(id) {
            Kind::Structure => 'V',
            Kind::Enum => 'O',
            Kind::Class => 'C',
            Kind::Protocol if !in_type_position => 'P',
            Kind::TypeAlias if in_type_position => 'a',
            _ => return self.bad_shape(id),
        };

        self.out.push(letter);
        self.mangle_declaration_name(id)
    }

    fn mangle_declaration_name(&mut self, id: NodeId) -> Result<()> {
        match *self.tree.children(id) {
            [context, name] => {
                self.mangle_context(context)?;
                self.mangle_decl_name(name)?;
                self.substitutions.register(id);
                Ok(())
            }
            _ => self.bad_shape(id),
        }
    }

    fn mangle_decl_name(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        match (tree.kind(id), tree.children(id)) {
            (Kind::LocalDeclName, &[discriminator, name]) => {
                let discriminator = self.index_of(discriminator)?;
                self.out.push('L');
                self.push_index(discriminator);
                self.mangle_identifier(name)
            }
            (Kind::PrivateDeclName, &[discriminator, name]) => {
                self.out.push('P');
                self.mangle_identifier(discriminator)?;
                self.mangle_identifier(name)
            }
            _ => self.mangle_identifier(id),
        }
    }

    fn mangle_identifier(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        let text = match tree.text(id) {
            Some(text) => text,
            None => return self.bad_shape(id),
        };

        let fixity = match tree.kind(id) {
            Kind::Identifier | Kind::Module => None,
            Kind::PrefixOperator => Some('p'),
            Kind::PostfixOperator => Some('P'),
            Kind::InfixOperator => Some('i'),
            _ => return self.bad_shape(id),
        };

        let text = if fixity.is_some() {
            let mut letters = String::with_capacity(text.len());
            for c in text.chars() {
                match charset::encode_operator_char(c) {
                    Some(letter) => letters.push(letter),
                    None => return self.bad_shape(id),
                }
            }
            letters
        } else {
            text.to_owned()
        };

        let punycode = if text.is_ascii() {
            None
        } else {
            charset::encode_punycode_ident(&text)
        };

        if punycode.is_some() {
            self.out.push('X');
        }
        if let Some(fixity) = fixity {
            self.out.push('o');
            self.out.push(fixity);
        }

        // Without a punycode form the UTF-8 bytes are written as they are.
        self.push_length_prefixed(punycode.as_ref().unwrap_or(&text));
        Ok(())
    }

    fn unwrap_type(&self, ty: NodeId) -> Result<NodeId> {
        match (self.tree.kind(ty), self.tree.children(ty)) {
            (Kind::Type, &[inner]) => Ok(inner),
            _ => self.bad_shape(ty),
        }
    }

    /// Takes the `Type` wrapper of a protocol.
    fn mangle_protocol_name(&mut self, ty: NodeId) -> Result<()> {
        let tree = self.tree;
        let protocol = self.unwrap_type(ty)?;

        if tree.kind(protocol) != Kind::Protocol {
            return self.bad_shape(protocol);
        }

        if let Some(index) = self.substitutions.lookup(tree, protocol) {
            self.out.push('S');
            self.push_index(index);
            return Ok(());
        }

        let (context, name) = match *tree.children(protocol) {
            [context, name] => (context, name),
            _ => return self.bad_shape(protocol),
        };

        let short_context = if tree.kind(context) != Kind::Module {
            false
        } else if tree.text(context) == Some(STDLIB_MODULE) {
            self.out.push('s');
            true
        } else {
            self.try_substitution(context)
        };

        if !short_context {
            // `S` and `s` would be read as the protocol's own short form.
            let start = self.out.len();
            self.mangle_context(context)?;
            match self.first_byte_since(start) {
                b'S' | b's' => return self.bad_shape(protocol),
                _ => {}
            }
        }

        self.mangle_decl_name(name)?;
        self.substitutions.register(protocol);
        Ok(())
    }

    fn mangle_type(&mut self, id: NodeId) -> Result<()> {
        self.nested(|r| r.mangle_type_impl(id))
    }

    fn mangle_type_impl(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let inner = self.unwrap_type(id)?;
        let kind = tree.kind(inner);

        match (kind, tree.children(inner)) {
            (Kind::BuiltinTypeName, _) => {
                match tree.text(inner).and_then(builtin_code) {
                    Some(code) => {
                        self.out.push('B');
                        self.out.push_str(&code);
                        Ok(())
                    }
                    None => self.bad_shape(inner),
                }
            }
            (Kind::Structure, _) | (Kind::Class, _) | (Kind::Enum, _) | (Kind::TypeAlias, _) => {
                self.mangle_nominal(inner, true)
            }
            (Kind::Protocol, _) => {
                if self.try_substitution(inner) {
                    Ok(())
                } else {
                    self.bad_shape(inner)
                }
            }
            (Kind::FunctionType, _)
            | (Kind::UncurriedFunctionType, _)
            | (Kind::ObjCBlock, _)
            | (Kind::CFunctionPointer, _)
            | (Kind::AutoClosureType, _)
            | (Kind::ThinFunctionType, _) => self.mangle_function_type(inner),
            (Kind::DynamicSelf, &[ty]) => {
                self.out.push('D');
                self.mangle_type(ty)
            }
            (Kind::ErrorType, &[]) => {
                self.out.push_str("ERR");
                Ok(())
            }
            (Kind::BoundGenericStructure, _)
            | (Kind::BoundGenericClass, _)
            | (Kind::BoundGenericEnum, _) => {
                self.out.push('G');
                self.mangle_bound_generic(inner)
            }
            (Kind::Metatype, &[ty]) => {
                self.out.push('M');
                self.mangle_type(ty)
            }
            (Kind::ExistentialMetatype, &[ty]) => {
                self.out.push_str("PM");
                self.mangle_type(ty)
            }
            (Kind::ProtocolList, &[protocols]) if tree.kind(protocols) == Kind::TypeList => {
                self.out.push('P');
                for &protocol in tree.children(protocols) {
                    self.mangle_protocol_name(protocol)?;
                }
                self.out.push('_');
                Ok(())
            }
            (Kind::DependentGenericParamType, _) => {
                let (depth, index) = self.generic_param(inner)?;
                if depth == 0 && index == 0 {
                    self.out.push('x');
                } else {
                    self.out.push('q');
                    self.push_generic_param_index(depth, index);
                }
                Ok(())
            }
            (Kind::InOut, &[ty]) => {
                self.out.push('R');
                self.mangle_type(ty)
            }
            (Kind::NonVariadicTuple, elements) | (Kind::VariadicTuple, elements) => {
                self.out
                    .push(if kind == Kind::NonVariadicTuple { 'T' } else { 't' });
                for &element in elements {
                    self.mangle_tuple_element(element)?;
                }
                self.out.push('_');
                Ok(())
            }
            (Kind::DependentGenericType, &[signature, ty]) => {
                self.out.push('u');
                self.mangle_generic_signature(signature)?;
                self.mangle_type(ty)
            }
            (Kind::Weak, &[ty]) | (Kind::Unowned, &[ty]) | (Kind::Unmanaged, &[ty]) => {
                self.out.push_str(match kind {
                    Kind::Weak => "Xw",
                    Kind::Unowned => "Xo",
                    _ => "Xu",
                });
                self.mangle_type(ty)
            }
            _ => self.bad_shape(inner),
        }
    }

    fn mangle_function_type(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        let (throws, args, result) = match *tree.children(id) {
            [throws, args, result] if tree.kind(throws) == Kind::ThrowsAnnotation => {
                (true, args, result)
            }
            [args, result] => (false, args, result),
            _ => return self.bad_shape(id),
        };

        let args = match (tree.kind(args), tree.children(args)) {
            (Kind::ArgumentTuple, &[ty]) => ty,
            _ => return self.bad_shape(args),
        };
        let result = match (tree.kind(result), tree.children(result)) {
            (Kind::ReturnType, &[ty]) => ty,
            _ => return self.bad_shape(result),
        };

        self.out.push_str(match tree.kind(id) {
            Kind::FunctionType => "F",
            Kind::UncurriedFunctionType => "f",
            Kind::ObjCBlock => "b",
            Kind::CFunctionPointer => "c",
            Kind::AutoClosureType => "K",
            _ => "Xf",
        });
        if throws {
            self.out.push('z');
        }

        self.mangle_type(args)?;
        self.mangle_type(result)
    }

    fn mangle_bound_generic(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        let (nominal, args) = match *tree.children(id) {
            [nominal, args]
                if tree.kind(args) == Kind::TypeList && tree.child_count(args) > 0 =>
            {
                (self.unwrap_type(nominal)?, args)
            }
            _ => return self.bad_shape(id),
        };

        let expected = match tree.kind(id) {
            Kind::BoundGenericStructure => Kind::Structure,
            Kind::BoundGenericClass => Kind::Class,
            _ => Kind::Enum,
        };
        if tree.kind(nominal) != expected {
            return self.bad_shape(id);
        }

        self.mangle_nominal(nominal, false)?;
        for &arg in tree.children(args) {
            self.mangle_type(arg)?;
        }
        self.out.push('_');
        Ok(())
    }

    fn mangle_tuple_element(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        match (tree.kind(id), tree.children(id)) {
            (Kind::TupleElement, &[label, ty]) if tree.kind(label) == Kind::TupleElementName => {
                match tree.text(label) {
                    Some(label) => self.push_length_prefixed(label),
                    None => return self.bad_shape(label),
                }
                self.mangle_type(ty)
            }
            (Kind::TupleElement, &[ty]) => self.mangle_type(ty),
            _ => self.bad_shape(id),
        }
    }

    fn generic_param(&self, id: NodeId) -> Result<(u64, u64)> {
        match *self.tree.children(id) {
            [depth, index] => Ok((self.index_of(depth)?, self.index_of(index)?)),
            _ => self.bad_shape(id),
        }
    }

    /// generic-param-index ::= 'x' | index | 'd' index index
    fn push_generic_param_index(&mut self, depth: u64, index: u64) {
        if depth == 0 {
            if index == 0 {
                self.out.push('x');
            } else {
                self.push_index(index - 1);
            }
        } else {
            self.out.push('d');
            self.push_index(depth - 1);
            self.push_index(index);
        }
    }

    fn mangle_generic_signature(&mut self, id: NodeId) -> Result<()> {
        self.nested(|r| r.mangle_generic_signature_impl(id))
    }

    fn mangle_generic_signature_impl(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;

        if tree.kind(id) != Kind::DependentGenericSignature {
            return self.bad_shape(id);
        }

        let children = tree.children(id);
        let count_len = children
            .iter()
            .take_while(|&&c| tree.kind(c) == Kind::DependentGenericParamCount)
            .count();
        let (counts, requirements) = children.split_at(count_len);

        let counts = counts
            .iter()
            .map(|&count| self.index_of(count))
            .collect::<Result<Vec<u64>>>()?;

        // A single parameter is the default and is left implicit.
        match &counts[..] {
            [] => return self.bad_shape(id),
            [1] => {}
            counts => {
                for &count in counts {
                    if count == 0 {
                        self.out.push('z');
                    } else {
                        self.push_index(count - 1);
                    }
                }
            }
        }

        if requirements.is_empty() {
            self.out.push('r');
            return Ok(());
        }

        self.out.push('R');
        for &requirement in requirements {
            self.mangle_generic_requirement(requirement)?;
        }
        self.out.push('r');
        Ok(())
    }

    fn mangle_generic_requirement(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let kind = tree.kind(id);

        let (param, constraint) = match *tree.children(id) {
            [param, constraint]
                if kind == Kind::DependentGenericConformanceRequirement
                    || kind == Kind::DependentGenericSameTypeRequirement =>
            {
                (param, constraint)
            }
            _ => return self.bad_shape(id),
        };

        let param = self.unwrap_type(param)?;
        if tree.kind(param) != Kind::DependentGenericParamType {
            return self.bad_shape(param);
        }
        let (depth, index) = self.generic_param(param)?;
        self.push_generic_param_index(depth, index);

        if kind == Kind::DependentGenericSameTypeRequirement {
            self.out.push('z');
            return self.mangle_type(constraint);
        }

        match tree.kind(self.unwrap_type(constraint)?) {
            Kind::Protocol => self.mangle_protocol_name(constraint),
            Kind::Class => {
                let class = self.unwrap_type(constraint)?;
                if self.try_substitution(class) {
                    Ok(())
                } else {
                    self.mangle_type(constraint)
                }
            }
            _ => self.bad_shape(constraint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_symbol, parse_type};

    fn roundtrip(symbol: &str) -> String {
        let tree = match parse_symbol(symbol.as_bytes()) {
            Ok(tree) => tree,
            Err(e) => panic!("{}: {}", symbol, e),
        };
        let remangled = match remangle(&tree) {
            Ok(remangled) => remangled,
            Err(e) => panic!("{}: {}", symbol, e),
        };

        let reparsed = parse_symbol(remangled.as_bytes()).unwrap();
        assert!(tree.same_as(&reparsed), "{} -> {}", symbol, remangled);
        remangled
    }

    #[test]
    fn canonical_symbols_are_reproduced() {
        let symbols = [
            "_TtSi",
            "_TtGSaSS_",
            "_TtGSqFT_T__",
            "_TtBi32_",
            "_TtBv4Bf16_",
            "_TtBO",
            "_TtP3foo3barS_3bas_",
            "_TtTV3foo3BarS0_VS_3Baz_",
            "_TtGV3foo3BarS0__",
            "_TtV3fooL_3Bar",
            "_TtV3fooP5_DISC3Bar",
            "_TtT3fooSi3barSu_",
            "_TtbSiSu",
            "_TtXfzSiSu",
            "_TtMP_",
            "_TtPMP_",
            "_TtXwGSqC3foo3Bar_",
            "_TFC3foo3bar3basfT3zimCS_3zim_T_",
            "_TToFC3foo3bar3basfT_T_",
            "_TFC3foo3bard",
            "_TF3foog3barSi",
            "_TFC3foo3barau3bazSi",
            "_TF3foooi1pFTSiSi_Si",
            "_TF3foo2idurFxx",
            "_TtuRxs8HashablerFxx",
            "_Ttu0_R_zxrFxq_",
            "_TF8manglingX22egbpdajGbuEbxfgehfvwxnFT_T_",
            "_TWPSis8Hashables",
            "_TWlV3foo3BarS0_S_1PS_",
            "_TwalSi",
            "_TWVSi",
            "_TMnSi",
            "_TPA__TFC3foo3bar3basfT_T_",
            "_TTRSiSu",
            "_TZFV3foo3Bar3bazfT_T_",
            "_TIvV3foo3Bar1xSii",
            "_TFIvVs8_Process10_argumentsGSaSS_iU_FT_GSaSS_",
            "_TtERR",
            "_TFE3fooSi3bazfT_T_",
        ];

        for symbol in symbols.iter() {
            assert_eq!(&roundtrip(symbol), symbol);
        }
    }

    #[test]
    fn long_forms_are_shortened() {
        assert_eq!(roundtrip("_TtV5Swift3Int"), "_TtSi");
        assert_eq!(roundtrip("_TtC6__ObjC8NSObject"), "_TtCSo8NSObject");
        assert_eq!(roundtrip("_TtTV3foo3BarV3foo3Bar_"), "_TtTV3foo3BarS0__");
    }

    #[test]
    fn bare_types() {
        let tree = parse_type(b"GSqSi_").unwrap();
        assert_eq!(remangle(&tree).unwrap(), "GSqSi_");
    }

    #[test]
    fn bad_shapes_are_reported() {
        let mut tree = Tree::new();
        let module = tree.add_text(Kind::Module, "foo");
        let broken = tree.add_with_children(Kind::Structure, vec![module]);
        let ty = tree.add_type(broken);
        tree.set_root(ty);

        assert_eq!(
            remangle(&tree).unwrap_err(),
            Error::UnknownNodeShape {
                kind: Kind::Structure,
                children: 1,
            }
        );

        assert!(remangle(&Tree::new()).is_err());
    }

    #[test]
    fn modules_are_rejected_as_types() {
        let mut tree = Tree::new();
        let module = tree.add_text(Kind::Module, STDLIB_MODULE);
        let ty = tree.add_type(module);
        tree.set_root(ty);

        assert_eq!(
            remangle(&tree).unwrap_err(),
            Error::UnknownNodeShape {
                kind: Kind::Module,
                children: 0,
            }
        );
    }

    #[test]
    fn builtin_names() {
        assert_eq!(builtin_code("Builtin.Int64").unwrap(), "i64_");
        assert_eq!(builtin_code("Builtin.Vec4xRawPointer").unwrap(), "v4Bp");
        assert_eq!(builtin_code("Builtin.Vec2xInt8").unwrap(), "v2Bi8_");
        assert_eq!(builtin_code("Builtin.Int032"), None);
        assert_eq!(builtin_code("Builtin.Float"), None);
        assert_eq!(builtin_code("Int32"), None);
    }
}
