//! Recursive-descent decoder for the classic (`_T`) Swift mangling.
//!
//! Every production commits after one byte of lookahead; there is no
//! backtracking. Nodes go into the session's `Tree`, and completed
//! substitutable nodes are appended to the session's `Substitutions`.

use crate::ast::{Kind, NodeId, Tree};
use crate::charset;
use crate::error::{malformed, Error, Malformed, Result};
use crate::lexer::{self, Cursor};
use crate::subst::Substitutions;
use std::str;

/// Nesting ceiling. Globals, entities, contexts, types and generic
/// signatures each count one level.
pub const MAX_DEPTH: usize = 200;

pub const STDLIB_MODULE: &str = "Swift";
pub const OBJC_MODULE: &str = "__ObjC";
pub const CLANG_IMPORTER_MODULE: &str = "__C";

/// `S<code>` shortcuts for common standard library types. These are never
/// entered into the substitution table.
pub const STANDARD_SUBSTITUTIONS: &[(u8, Kind, &str)] = &[
    (b'a', Kind::Structure, "Array"),
    (b'b', Kind::Structure, "Bool"),
    (b'c', Kind::Structure, "UnicodeScalar"),
    (b'd', Kind::Structure, "Double"),
    (b'f', Kind::Structure, "Float"),
    (b'i', Kind::Structure, "Int"),
    (b'V', Kind::Structure, "UnsafeRawPointer"),
    (b'v', Kind::Structure, "UnsafeMutableRawPointer"),
    (b'P', Kind::Structure, "UnsafePointer"),
    (b'p', Kind::Structure, "UnsafeMutablePointer"),
    (b'q', Kind::Enum, "Optional"),
    (b'Q', Kind::Enum, "ImplicitlyUnwrappedOptional"),
    (b'R', Kind::Structure, "UnsafeBufferPointer"),
    (b'r', Kind::Structure, "UnsafeMutableBufferPointer"),
    (b'S', Kind::Structure, "String"),
    (b'u', Kind::Structure, "UInt"),
];

/// Two-letter value witness codes; a `ValueWitness` node stores the position
/// in this table.
pub const VALUE_WITNESSES: &[(&str, &str)] = &[
    ("al", "allocateBuffer"),
    ("ca", "assignWithCopy"),
    ("ta", "assignWithTake"),
    ("de", "deallocateBuffer"),
    ("xx", "destroy"),
    ("XX", "destroyBuffer"),
    ("Xx", "destroyArray"),
    ("CP", "initializeBufferWithCopyOfBuffer"),
    ("Cp", "initializeBufferWithCopy"),
    ("cp", "initializeWithCopy"),
    ("TK", "initializeBufferWithTakeOfBuffer"),
    ("Tk", "initializeBufferWithTake"),
    ("tk", "initializeWithTake"),
    ("pr", "projectBuffer"),
    ("xs", "storeExtraInhabitant"),
    ("xg", "getExtraInhabitantIndex"),
    ("Cc", "initializeArrayWithCopy"),
    ("Tt", "initializeArrayWithTakeFrontToBack"),
    ("tT", "initializeArrayWithTakeBackToFront"),
    ("ug", "getEnumTag"),
    ("up", "destructiveProjectEnumData"),
    ("ui", "destructiveInjectEnumTag"),
];

/// Decodes a complete `_T` symbol. The root is a `Global` node.
pub fn parse_symbol(mangled: &[u8]) -> Result<Tree> {
    if !lexer::is_mangled_name(mangled) {
        return Err(Error::NotMangled);
    }

    let mut parser = Parser::new(mangled);
    parser.cursor.next_if_str(lexer::MANGLING_PREFIX);
    let root = parser.demangle_top_level()?;
    parser.finish(root)
}

/// Decodes a bare type mangling such as `GSqSi_`. The root is a `Type` node.
pub fn parse_type(mangled: &[u8]) -> Result<Tree> {
    if mangled.is_empty() {
        return Err(Error::NotMangled);
    }

    let mut parser = Parser::new(mangled);
    let root = parser.demangle_type()?;
    parser.finish(root)
}

fn is_start_of_nominal_type(c: u8) -> bool {
    match c {
        b'C' | b'V' | b'O' => true,
        _ => false,
    }
}

fn is_start_of_entity(c: u8) -> bool {
    match c {
        b'F' | b'I' | b'v' | b'P' | b's' | b'Z' => true,
        c => is_start_of_nominal_type(c),
    }
}

struct Parser<'input> {
    cursor: Cursor<'input>,
    tree: Tree,
    substitutions: Substitutions,
    depth: usize,
}

impl<'input> Parser<'input> {
    fn new(input: &'input [u8]) -> Parser<'input> {
        Parser {
            cursor: Cursor::new(input),
            tree: Tree::new(),
            substitutions: Substitutions::new(),
            depth: 0,
        }
    }

    fn finish(mut self, root: NodeId) -> Result<Tree> {
        if !self.cursor.at_end() {
            return malformed(
                self.cursor.pos(),
                Malformed::TrailingBytes(self.cursor.remaining()),
            );
        }

        self.tree.set_root(root);
        Ok(self.tree)
    }

    fn nested<T, F>(&mut self, production: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(Error::DepthExceeded { limit: MAX_DEPTH });
        }

        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    /// Reports `c`, which was just consumed, as unexpected.
    fn unexpected<T>(&self, c: u8) -> Result<T> {
        malformed(
            self.cursor.pos().saturating_sub(1),
            Malformed::UnexpectedChar(c as char),
        )
    }

    fn succ(&self, n: u64) -> Result<u64> {
        match n.checked_add(1) {
            Some(n) => Ok(n),
            None => malformed(self.cursor.pos(), Malformed::Overflow),
        }
    }

    fn node(&mut self, kind: Kind, children: Vec<NodeId>) -> NodeId {
        self.tree.add_with_children(kind, children)
    }

    fn swift_module(&mut self) -> NodeId {
        self.tree.add_text(Kind::Module, STDLIB_MODULE)
    }

    fn swift_type(&mut self, kind: Kind, name: &str) -> NodeId {
        let module = self.swift_module();
        let ident = self.tree.add_text(Kind::Identifier, name);
        self.node(kind, vec![module, ident])
    }

    fn demangle_top_level(&mut self) -> Result<NodeId> {
        let global = self.tree.add(Kind::Global);

        let attribute = match (self.cursor.peek(), self.cursor.peek_at(1)) {
            (b'T', b'o') => Some(Kind::ObjCAttribute),
            (b'T', b'O') => Some(Kind::NonObjCAttribute),
            (b'T', b'D') => Some(Kind::DynamicAttribute),
            (b'T', b'd') => Some(Kind::DirectMethodReferenceAttribute),
            (b'T', b'V') => Some(Kind::VTableAttribute),
            _ => None,
        };

        if let Some(attribute) = attribute {
            self.cursor.next()?;
            self.cursor.next()?;
            let attribute = self.tree.add(attribute);
            self.tree.add_child(global, attribute);
        }

        let body = self.demangle_global()?;
        self.tree.add_child(global, body);
        Ok(global)
    }

    fn demangle_global(&mut self) -> Result<NodeId> {
        self.nested(|p| p.demangle_global_impl())
    }

    fn demangle_global_impl(&mut self) -> Result<NodeId> {
        if self.cursor.next_if(b'M') {
            let kind = match self.cursor.peek() {
                b'P' => Kind::GenericTypeMetadataPattern,
                b'a' => Kind::TypeMetadataAccessFunction,
                b'L' => Kind::TypeMetadataLazyCache,
                b'm' => Kind::Metaclass,
                b'n' => Kind::NominalTypeDescriptor,
                b'f' => Kind::FullTypeMetadata,
                b'p' => Kind::ProtocolDescriptor,
                _ => Kind::TypeMetadata,
            };

            if kind != Kind::TypeMetadata {
                self.cursor.next()?;
            }

            let ty = if kind == Kind::ProtocolDescriptor {
                self.demangle_protocol_name()?
            } else {
                self.demangle_type()?
            };
            return Ok(self.node(kind, vec![ty]));
        }

        if self.cursor.next_if_str(b"PA") {
            let kind = if self.cursor.next_if(b'o') {
                Kind::PartialApplyObjCForwarder
            } else {
                Kind::PartialApplyForwarder
            };

            let forwarder = self.tree.add(kind);
            if self.cursor.next_if_str(b"__T") {
                let target = self.demangle_global()?;
                self.tree.add_child(forwarder, target);
            }
            return Ok(forwarder);
        }

        if self.cursor.next_if(b't') {
            let ty = self.demangle_type()?;
            return Ok(self.node(Kind::TypeMangling, vec![ty]));
        }

        if self.cursor.next_if(b'w') {
            let start = self.cursor.pos();
            let code = [self.cursor.next()?, self.cursor.next()?];
            let witness = match VALUE_WITNESSES
                .iter()
                .position(|&(c, _)| c.as_bytes() == &code[..])
            {
                Some(witness) => witness,
                None => return malformed(start, Malformed::UnexpectedChar(code[0] as char)),
            };

            let witness = self.tree.add_index(Kind::Index, witness as u64);
            let ty = self.demangle_type()?;
            return Ok(self.node(Kind::ValueWitness, vec![witness, ty]));
        }

        if self.cursor.next_if(b'W') {
            return match self.cursor.next()? {
                b'V' => {
                    let ty = self.demangle_type()?;
                    Ok(self.node(Kind::ValueWitnessTable, vec![ty]))
                }
                b'v' => {
                    let directness = match self.cursor.next()? {
                        b'd' => 0,
                        b'i' => 1,
                        other => return self.unexpected(other),
                    };
                    let directness = self.tree.add_index(Kind::Directness, directness);
                    let entity = self.demangle_entity()?;
                    Ok(self.node(Kind::FieldOffset, vec![directness, entity]))
                }
                c @ b'P' | c @ b'G' | c @ b'I' | c @ b'a' => {
                    let kind = match c {
                        b'P' => Kind::ProtocolWitnessTable,
                        b'G' => Kind::GenericProtocolWitnessTable,
                        b'I' => Kind::GenericProtocolWitnessTableInstantiationFunction,
                        _ => Kind::ProtocolWitnessTableAccessor,
                    };
                    let conformance = self.demangle_protocol_conformance()?;
                    Ok(self.node(kind, vec![conformance]))
                }
                c @ b'l' | c @ b'L' => {
                    let kind = if c == b'l' {
                        Kind::LazyProtocolWitnessTableAccessor
                    } else {
                        Kind::LazyProtocolWitnessTableCacheVariable
                    };
                    let ty = self.demangle_type()?;
                    let conformance = self.demangle_protocol_conformance()?;
                    Ok(self.node(kind, vec![ty, conformance]))
                }
                b't' => {
                    let conformance = self.demangle_protocol_conformance()?;
                    let name = self.demangle_decl_name()?;
                    Ok(self.node(Kind::AssociatedTypeMetadataAccessor, vec![conformance, name]))
                }
                b'T' => {
                    let conformance = self.demangle_protocol_conformance()?;
                    let name = self.demangle_decl_name()?;
                    let protocol = self.demangle_protocol_name()?;
                    Ok(self.node(
                        Kind::AssociatedTypeWitnessTableAccessor,
                        vec![conformance, name, protocol],
                    ))
                }
                other => self.unexpected(other),
            };
        }

        if self.cursor.next_if(b'T') {
            return match self.cursor.next()? {
                b'W' => {
                    let conformance = self.demangle_protocol_conformance()?;
                    let entity = self.demangle_entity()?;
                    Ok(self.node(Kind::ProtocolWitness, vec![conformance, entity]))
                }
                c @ b'R' | c @ b'r' => {
                    let kind = if c == b'R' {
                        Kind::ReabstractionThunkHelper
                    } else {
                        Kind::ReabstractionThunk
                    };
                    let from = self.demangle_type()?;
                    let to = self.demangle_type()?;
                    Ok(self.node(kind, vec![from, to]))
                }
                other => self.unexpected(other),
            };
        }

        self.demangle_entity()
    }

    /// protocol-conformance ::= type protocol context
    fn demangle_protocol_conformance(&mut self) -> Result<NodeId> {
        let ty = self.demangle_type()?;
        let protocol = self.demangle_protocol_name()?;
        let context = self.demangle_context()?;
        Ok(self.node(Kind::ProtocolConformance, vec![ty, protocol, context]))
    }

    fn demangle_entity(&mut self) -> Result<NodeId> {
        self.nested(|p| p.demangle_entity_impl())
    }

    fn demangle_entity_impl(&mut self) -> Result<NodeId> {
        let is_static = self.cursor.next_if(b'Z');

        let basic_kind = match self.cursor.peek() {
            b'F' => Kind::Function,
            b'v' => Kind::Variable,
            b'I' => Kind::Initializer,
            b'i' => Kind::Subscript,
            _ if is_static => {
                let c = self.cursor.next()?;
                return self.unexpected(c);
            }
            _ => return self.demangle_nominal_type(),
        };
        self.cursor.next()?;

        let context = self.demangle_context()?;
        let (kind, name, has_type) = self.demangle_entity_name(basic_kind)?;

        let mut children = vec![context];
        children.extend(name);
        if has_type {
            children.push(self.demangle_type()?);
        }

        let entity = self.node(kind, children);

        Ok(if is_static {
            self.node(Kind::Static, vec![entity])
        } else {
            entity
        })
    }

    /// Returns the entity's kind, its name node if it has one, and whether a
    /// type follows.
    fn demangle_entity_name(&mut self, basic_kind: Kind) -> Result<(Kind, Option<NodeId>, bool)> {
        let special = match self.cursor.peek() {
            b'D' => Some((Kind::Deallocator, false)),
            b'd' => Some((Kind::Destructor, false)),
            b'e' => Some((Kind::IVarInitializer, false)),
            b'E' => Some((Kind::IVarDestroyer, false)),
            b'C' => Some((Kind::Allocator, true)),
            b'c' => Some((Kind::Constructor, true)),
            _ => None,
        };

        if let Some((kind, has_type)) = special {
            self.cursor.next()?;
            return Ok((kind, None, has_type));
        }

        let accessor = match self.cursor.peek() {
            b'g' => Some(Kind::Getter),
            b'G' => Some(Kind::GlobalGetter),
            b's' => Some(Kind::Setter),
            b'm' => Some(Kind::MaterializeForSet),
            b'w' => Some(Kind::WillSet),
            b'W' => Some(Kind::DidSet),
            c @ b'a' | c @ b'l' => {
                self.cursor.next()?;
                let kind = match (c, self.cursor.peek()) {
                    (b'a', b'O') => Kind::OwningMutableAddressor,
                    (b'a', b'o') => Kind::NativeOwningMutableAddressor,
                    (b'a', b'p') => Kind::NativePinningMutableAddressor,
                    (b'a', b'u') => Kind::UnsafeMutableAddressor,
                    (b'l', b'O') => Kind::OwningAddressor,
                    (b'l', b'o') => Kind::NativeOwningAddressor,
                    (b'l', b'p') => Kind::NativePinningAddressor,
                    (b'l', b'u') => Kind::UnsafeAddressor,
                    _ => {
                        let c = self.cursor.next()?;
                        return self.unexpected(c);
                    }
                };
                Some(kind)
            }
            _ => None,
        };

        if let Some(kind) = accessor {
            self.cursor.next()?;
            let name = self.demangle_decl_name()?;
            return Ok((kind, Some(name), true));
        }

        let closure = match self.cursor.peek() {
            b'U' => Some(Kind::ExplicitClosure),
            b'u' => Some(Kind::ImplicitClosure),
            _ => None,
        };

        if let Some(kind) = closure {
            self.cursor.next()?;
            let index = self.cursor.index()?;
            let index = self.tree.add_index(Kind::Index, index);
            return Ok((kind, Some(index), true));
        }

        if basic_kind == Kind::Initializer {
            return match self.cursor.next()? {
                b'A' => {
                    let index = self.cursor.index()?;
                    let index = self.tree.add_index(Kind::Index, index);
                    Ok((Kind::DefaultArgumentInitializer, Some(index), false))
                }
                b'i' => Ok((Kind::Initializer, None, false)),
                other => self.unexpected(other),
            };
        }

        let name = self.demangle_decl_name()?;
        Ok((basic_kind, Some(name), true))
    }

    fn demangle_context(&mut self) -> Result<NodeId> {
        self.nested(|p| p.demangle_context_impl())
    }

    fn demangle_context_impl(&mut self) -> Result<NodeId> {
        match self.cursor.peek() {
            b'E' => {
                self.cursor.next()?;
                let module = self.demangle_module()?;
                let extended = self.demangle_context()?;
                Ok(self.node(Kind::Extension, vec![module, extended]))
            }
            b'e' => {
                self.cursor.next()?;
                let module = self.demangle_module()?;
                let signature = self.demangle_generic_signature()?;
                let extended = self.demangle_context()?;
                Ok(self.node(Kind::Extension, vec![module, extended, signature]))
            }
            b'S' => {
                self.cursor.next()?;
                self.demangle_substitution_index()
            }
            b's' => {
                self.cursor.next()?;
                Ok(self.swift_module())
            }
            b'G' => {
                self.cursor.next()?;
                self.demangle_bound_generic_type()
            }
            c if is_start_of_entity(c) => self.demangle_entity(),
            _ => self.demangle_module(),
        }
    }

    fn demangle_module(&mut self) -> Result<NodeId> {
        if self.cursor.next_if(b's') {
            return Ok(self.swift_module());
        }

        if self.cursor.next_if(b'S') {
            let offset = self.cursor.pos();
            let module = self.demangle_substitution_index()?;
            return match self.tree.kind(module) {
                Kind::Module => Ok(module),
                other => malformed(offset, Malformed::UnexpectedKind(other)),
            };
        }

        let module = self.demangle_identifier(Some(Kind::Module))?;
        self.substitutions.register(module);
        Ok(module)
    }

    /// Everything after an `S`: a standard substitution or a table index.
    fn demangle_substitution_index(&mut self) -> Result<NodeId> {
        if self.cursor.next_if(b'o') {
            return Ok(self.tree.add_text(Kind::Module, OBJC_MODULE));
        }

        if self.cursor.next_if(b'C') {
            return Ok(self.tree.add_text(Kind::Module, CLANG_IMPORTER_MODULE));
        }

        let c = self.cursor.peek();
        if let Some(&(_, kind, name)) = STANDARD_SUBSTITUTIONS.iter().find(|s| s.0 == c) {
            self.cursor.next()?;
            return Ok(self.swift_type(kind, name));
        }

        let offset = self.cursor.pos();
        let index = self.cursor.index()?;
        self.substitutions.resolve(index, offset)
    }

    fn demangle_nominal_type(&mut self) -> Result<NodeId> {
        match self.cursor.next()? {
            b'S' => self.demangle_substitution_index(),
            b'V' => self.demangle_declaration_name(Kind::Structure),
            b'O' => self.demangle_declaration_name(Kind::Enum),
            b'C' => self.demangle_declaration_name(Kind::Class),
            b'P' => self.demangle_declaration_name(Kind::Protocol),
            other => self.unexpected(other),
        }
    }

    /// declaration-name ::= context decl-name
    fn demangle_declaration_name(&mut self, kind: Kind) -> Result<NodeId> {
        let context = self.demangle_context()?;
        let name = self.demangle_decl_name()?;
        let decl = self.node(kind, vec![context, name]);
        self.substitutions.register(decl);
        Ok(decl)
    }

    fn demangle_decl_name(&mut self) -> Result<NodeId> {
        if self.cursor.next_if(b'L') {
            let discriminator = self.cursor.index()?;
            let discriminator = self.tree.add_index(Kind::Index, discriminator);
            let name = self.demangle_identifier(None)?;
            return Ok(self.node(Kind::LocalDeclName, vec![discriminator, name]));
        }

        if self.cursor.next_if(b'P') {
            let discriminator = self.demangle_identifier(None)?;
            let name = self.demangle_identifier(None)?;
            return Ok(self.node(Kind::PrivateDeclName, vec![discriminator, name]));
        }

        self.demangle_identifier(None)
    }

    /// identifier ::= 'X'? ('o' fixity)? natural bytes
    ///
    /// Operators are only allowed when no explicit `kind` is requested.
    fn demangle_identifier(&mut self, kind: Option<Kind>) -> Result<NodeId> {
        let start = self.cursor.pos();
        let is_punycoded = self.cursor.next_if(b'X');

        let mut kind = kind;
        let is_operator = kind.is_none() && self.cursor.next_if(b'o');
        if is_operator {
            kind = Some(match self.cursor.next()? {
                b'p' => Kind::PrefixOperator,
                b'P' => Kind::PostfixOperator,
                b'i' => Kind::InfixOperator,
                other => return self.unexpected(other),
            });
        }

        let len = self.cursor.natural()?;
        let bytes = self.cursor.take(len)?;

        let text = if is_punycoded {
            match charset::decode_punycode_ident(bytes) {
                Some(text) => text,
                None => {
                    let lossy = String::from_utf8_lossy(bytes).into_owned();
                    return malformed(start, Malformed::InvalidPunycode(lossy));
                }
            }
        } else {
            match str::from_utf8(bytes) {
                Ok(text) => text.to_owned(),
                Err(_) => return malformed(start, Malformed::InvalidUtf8),
            }
        };

        let text = if is_operator {
            let mut decoded = String::with_capacity(text.len());
            for c in text.chars() {
                match charset::decode_operator_char(c) {
                    Some(op) => decoded.push(op),
                    None => return malformed(start, Malformed::InvalidOperator(c)),
                }
            }
            decoded
        } else {
            text
        };

        Ok(self.tree.add_text(kind.unwrap_or(Kind::Identifier), text))
    }

    /// Returns a `Type` node wrapping the protocol.
    fn demangle_protocol_name(&mut self) -> Result<NodeId> {
        let protocol = self.demangle_protocol_name_impl(false)?;
        Ok(self.tree.add_type(protocol))
    }

    /// With `allow_class`, a substitution may also name a class; generic
    /// requirements use that for superclass constraints.
    fn demangle_protocol_name_impl(&mut self, allow_class: bool) -> Result<NodeId> {
        if self.cursor.next_if(b'S') {
            let offset = self.cursor.pos();
            let sub = self.demangle_substitution_index()?;
            return match self.tree.kind(sub) {
                Kind::Protocol => Ok(sub),
                Kind::Module => self.demangle_protocol_name_given_context(sub),
                Kind::Class if allow_class => Ok(sub),
                other => malformed(offset, Malformed::UnexpectedKind(other)),
            };
        }

        if self.cursor.next_if(b's') {
            let stdlib = self.swift_module();
            return self.demangle_protocol_name_given_context(stdlib);
        }

        self.demangle_declaration_name(Kind::Protocol)
    }

    fn demangle_protocol_name_given_context(&mut self, context: NodeId) -> Result<NodeId> {
        let name = self.demangle_decl_name()?;
        let protocol = self.node(Kind::Protocol, vec![context, name]);
        self.substitutions.register(protocol);
        Ok(protocol)
    }

    fn demangle_type(&mut self) -> Result<NodeId> {
        let inner = self.nested(|p| p.demangle_type_impl())?;
        Ok(self.tree.add_type(inner))
    }

    fn demangle_type_impl(&mut self) -> Result<NodeId> {
        match self.cursor.next()? {
            b'B' => self.demangle_builtin_type(),
            b'a' => self.demangle_declaration_name(Kind::TypeAlias),
            b'b' => self.demangle_function_type(Kind::ObjCBlock),
            b'c' => self.demangle_function_type(Kind::CFunctionPointer),
            b'D' => {
                let ty = self.demangle_type()?;
                Ok(self.node(Kind::DynamicSelf, vec![ty]))
            }
            b'E' => {
                self.cursor.expect(b'R', "'R'")?;
                self.cursor.expect(b'R', "'R'")?;
                Ok(self.tree.add(Kind::ErrorType))
            }
            b'F' => self.demangle_function_type(Kind::FunctionType),
            b'f' => self.demangle_function_type(Kind::UncurriedFunctionType),
            b'G' => self.demangle_bound_generic_type(),
            b'K' => self.demangle_function_type(Kind::AutoClosureType),
            b'M' => {
                let ty = self.demangle_type()?;
                Ok(self.node(Kind::Metatype, vec![ty]))
            }
            b'P' => {
                if self.cursor.next_if(b'M') {
                    let ty = self.demangle_type()?;
                    return Ok(self.node(Kind::ExistentialMetatype, vec![ty]));
                }
                self.demangle_protocol_list()
            }
            b'q' => {
                let (depth, index) = self.demangle_generic_param_index()?;
                Ok(self.generic_param(depth, index))
            }
            b'x' => Ok(self.generic_param(0, 0)),
            b'R' => {
                let ty = self.demangle_type()?;
                Ok(self.node(Kind::InOut, vec![ty]))
            }
            b'S' => {
                let offset = self.cursor.pos();
                let sub = self.demangle_substitution_index()?;
                match self.tree.kind(sub) {
                    Kind::Module => malformed(offset, Malformed::UnexpectedKind(Kind::Module)),
                    _ => Ok(sub),
                }
            }
            b'T' => self.demangle_tuple(Kind::NonVariadicTuple),
            b't' => self.demangle_tuple(Kind::VariadicTuple),
            b'u' => {
                let signature = self.demangle_generic_signature()?;
                let ty = self.demangle_type()?;
                Ok(self.node(Kind::DependentGenericType, vec![signature, ty]))
            }
            b'C' => self.demangle_declaration_name(Kind::Class),
            b'V' => self.demangle_declaration_name(Kind::Structure),
            b'O' => self.demangle_declaration_name(Kind::Enum),
            b'X' => {
                let kind = match self.cursor.next()? {
                    b'w' => Kind::Weak,
                    b'o' => Kind::Unowned,
                    b'u' => Kind::Unmanaged,
                    b'f' => return self.demangle_function_type(Kind::ThinFunctionType),
                    other => return self.unexpected(other),
                };
                let ty = self.demangle_type()?;
                Ok(self.node(kind, vec![ty]))
            }
            other => self.unexpected(other),
        }
    }

    fn demangle_builtin_type(&mut self) -> Result<NodeId> {
        let name = match self.cursor.next()? {
            b'b' => "Builtin.BridgeObject".to_string(),
            b'B' => "Builtin.UnsafeValueBuffer".to_string(),
            b'O' => "Builtin.UnknownObject".to_string(),
            b'o' => "Builtin.NativeObject".to_string(),
            b'p' => "Builtin.RawPointer".to_string(),
            b'w' => "Builtin.Word".to_string(),
            b'f' => {
                let bits = self.cursor.natural()?;
                self.cursor.expect(b'_', "'_'")?;
                format!("Builtin.FPIEEE{}", bits)
            }
            b'i' => {
                let bits = self.cursor.natural()?;
                self.cursor.expect(b'_', "'_'")?;
                format!("Builtin.Int{}", bits)
            }
            b'v' => {
                let elements = self.cursor.natural()?;
                self.cursor.expect(b'B', "'B'")?;
                let element = match self.cursor.next()? {
                    b'i' => {
                        let bits = self.cursor.natural()?;
                        self.cursor.expect(b'_', "'_'")?;
                        format!("Int{}", bits)
                    }
                    b'f' => {
                        let bits = self.cursor.natural()?;
                        self.cursor.expect(b'_', "'_'")?;
                        format!("FPIEEE{}", bits)
                    }
                    b'p' => "RawPointer".to_string(),
                    other => return self.unexpected(other),
                };
                format!("Builtin.Vec{}x{}", elements, element)
            }
            other => return self.unexpected(other),
        };

        Ok(self.tree.add_text(Kind::BuiltinTypeName, name))
    }

    /// function-type ::= 'z'? type type
    fn demangle_function_type(&mut self, kind: Kind) -> Result<NodeId> {
        let throws = self.cursor.next_if(b'z');
        let args = self.demangle_type()?;
        let result = self.demangle_type()?;

        let mut children = Vec::with_capacity(3);
        if throws {
            children.push(self.tree.add(Kind::ThrowsAnnotation));
        }
        children.push(self.node(Kind::ArgumentTuple, vec![args]));
        children.push(self.node(Kind::ReturnType, vec![result]));

        Ok(self.node(kind, children))
    }

    /// bound-generic-type ::= nominal-type type+ '_'
    fn demangle_bound_generic_type(&mut self) -> Result<NodeId> {
        let offset = self.cursor.pos();
        let nominal = self.demangle_nominal_type()?;

        let kind = match self.tree.kind(nominal) {
            Kind::Structure => Kind::BoundGenericStructure,
            Kind::Class => Kind::BoundGenericClass,
            Kind::Enum => Kind::BoundGenericEnum,
            other => return malformed(offset, Malformed::UnexpectedKind(other)),
        };

        let args = self.tree.add(Kind::TypeList);
        while !self.cursor.next_if(b'_') {
            let arg = self.demangle_type()?;
            self.tree.add_child(args, arg);
        }

        if self.tree.child_count(args) == 0 {
            return malformed(self.cursor.pos(), Malformed::EmptyList);
        }

        let nominal = self.tree.add_type(nominal);
        Ok(self.node(kind, vec![nominal, args]))
    }

    fn demangle_protocol_list(&mut self) -> Result<NodeId> {
        let protocols = self.tree.add(Kind::TypeList);
        while !self.cursor.next_if(b'_') {
            let protocol = self.demangle_protocol_name()?;
            self.tree.add_child(protocols, protocol);
        }
        Ok(self.node(Kind::ProtocolList, vec![protocols]))
    }

    /// tuple ::= (label? type)* '_'
    fn demangle_tuple(&mut self, kind: Kind) -> Result<NodeId> {
        let tuple = self.tree.add(kind);

        while !self.cursor.next_if(b'_') {
            let mut children = Vec::with_capacity(2);
            if self.cursor.peek().is_ascii_digit() {
                children.push(self.demangle_identifier(Some(Kind::TupleElementName))?);
            }
            children.push(self.demangle_type()?);

            let element = self.node(Kind::TupleElement, children);
            self.tree.add_child(tuple, element);
        }

        Ok(tuple)
    }

    /// generic-param-index ::= 'x' | index | 'd' index index
    fn demangle_generic_param_index(&mut self) -> Result<(u64, u64)> {
        if self.cursor.next_if(b'd') {
            let depth = self.cursor.index()?;
            let depth = self.succ(depth)?;
            let index = self.cursor.index()?;
            Ok((depth, index))
        } else if self.cursor.next_if(b'x') {
            Ok((0, 0))
        } else {
            let index = self.cursor.index()?;
            Ok((0, self.succ(index)?))
        }
    }

    fn generic_param(&mut self, depth: u64, index: u64) -> NodeId {
        let depth = self.tree.add_index(Kind::Index, depth);
        let index = self.tree.add_index(Kind::Index, index);
        self.node(Kind::DependentGenericParamType, vec![depth, index])
    }

    fn demangle_generic_signature(&mut self) -> Result<NodeId> {
        self.nested(|p| p.demangle_generic_signature_impl())
    }

    /// generic-signature ::= (count)* ('r' | 'R' requirement* 'r')
    fn demangle_generic_signature_impl(&mut self) -> Result<NodeId> {
        let signature = self.tree.add(Kind::DependentGenericSignature);

        let mut has_counts = false;
        while self.cursor.peek() != b'R' && self.cursor.peek() != b'r' {
            let count = if self.cursor.next_if(b'z') {
                0
            } else {
                let index = self.cursor.index()?;
                self.succ(index)?
            };

            let count = self.tree.add_index(Kind::DependentGenericParamCount, count);
            self.tree.add_child(signature, count);
            has_counts = true;
        }

        // No counts means exactly one parameter.
        if !has_counts {
            let count = self.tree.add_index(Kind::DependentGenericParamCount, 1);
            self.tree.add_child(signature, count);
        }

        if self.cursor.next_if(b'r') {
            return Ok(signature);
        }

        self.cursor.expect(b'R', "'R'")?;
        while !self.cursor.next_if(b'r') {
            let requirement = self.demangle_generic_requirement()?;
            self.tree.add_child(signature, requirement);
        }

        Ok(signature)
    }

    fn demangle_generic_requirement(&mut self) -> Result<NodeId> {
        let (depth, index) = self.demangle_generic_param_index()?;
        let param = self.generic_param(depth, index);
        let constrained = self.tree.add_type(param);

        if self.cursor.next_if(b'z') {
            let ty = self.demangle_type()?;
            return Ok(self.node(
                Kind::DependentGenericSameTypeRequirement,
                vec![constrained, ty],
            ));
        }

        let constraint = if self.cursor.peek() == b'C' {
            self.demangle_type()?
        } else {
            let protocol = self.demangle_protocol_name_impl(true)?;
            self.tree.add_type(protocol)
        };

        Ok(self.node(
            Kind::DependentGenericConformanceRequirement,
            vec![constrained, constraint],
        ))
    }
}
