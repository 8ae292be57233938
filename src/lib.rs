//! A demangler for classic (`_T`) Swift symbols.
//!
//! `try_demangle` decodes a symbol into a `Tree`, `render` turns the tree into
//! readable text and `remangle` encodes it again. The string helpers at the
//! bottom of this file bundle these steps for callers that only want text.

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod ast;
pub mod charset;
pub mod error;
pub mod lexer;
pub mod mangle;
pub mod parse;
pub mod pretty;
mod subst;

#[cfg(test)]
mod quickcheck_testing;

pub use crate::ast::{kind_name, Kind, NodeId, PayloadKind, Tree};
pub use crate::error::{Error, Malformed};
pub use crate::mangle::remangle;
pub use crate::pretty::{render, DemangleOptions};

use std::sync::Once;
use tracing::debug;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber for debug output.
///
/// Does nothing unless `RUST_LOG` is set, e.g. `RUST_LOG=swift_demangle_rs=debug`.
/// Calling it more than once is harmless.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Decodes a `_T` symbol, reporting why it was rejected.
pub fn mangled_symbol_to_tree(symbol: &[u8]) -> Result<Tree, Error> {
    parse::parse_symbol(symbol)
}

fn log_rejection(input: &[u8], error: &Error) {
    if *error != Error::NotMangled {
        debug!(
            input = %String::from_utf8_lossy(input),
            %error,
            "rejected mangled name"
        );
    }
}

/// Decodes a `_T` symbol. Plain text and malformed symbols both yield `None`.
pub fn try_demangle(symbol: &[u8]) -> Option<Tree> {
    match parse::parse_symbol(symbol) {
        Ok(tree) => Some(tree),
        Err(error) => {
            log_rejection(symbol, &error);
            None
        }
    }
}

/// Decodes a bare type mangling such as `GSqSi_`.
pub fn try_demangle_type(mangled: &[u8]) -> Option<Tree> {
    match parse::parse_type(mangled) {
        Ok(tree) => Some(tree),
        Err(error) => {
            log_rejection(mangled, &error);
            None
        }
    }
}

/// The full rendering, with sugar for the standard library wrapper types.
pub fn demangle_symbol_as_string(symbol: &[u8]) -> Option<String> {
    let options = DemangleOptions {
        synthesize_sugar_on_types: true,
        ..DemangleOptions::new()
    };
    try_demangle(symbol).map(|tree| render(&tree, &options))
}

pub fn simplified_demangled_name(symbol: &[u8]) -> Option<String> {
    try_demangle(symbol).map(|tree| render(&tree, &DemangleOptions::simplified()))
}

/// The module the symbol's entity (or type) is declared in.
pub fn module_name_of(symbol: &[u8]) -> Option<String> {
    let tree = try_demangle(symbol)?;
    let global = tree.root()?;

    let mut node = tree
        .children(global)
        .iter()
        .cloned()
        .find(|&child| !tree.kind(child).is_attribute())?;

    loop {
        match tree.kind(node) {
            Kind::Module => return tree.text(node).map(str::to_owned),
            Kind::TypeMangling | Kind::Type | Kind::Static => node = tree.child_at(node, 0)?,
            kind if kind.is_context() => node = tree.child_at(node, 0)?,
            _ => return None,
        }
    }
}

/// Whether the symbol refers to code called with the Swift calling
/// convention. Metadata accessors, witnesses and `@objc` entry points are not.
pub fn has_swift_calling_convention(symbol: &[u8]) -> bool {
    let tree = match try_demangle(symbol) {
        Some(tree) => tree,
        None => return false,
    };

    let global = match tree.root() {
        Some(global) => global,
        None => return false,
    };

    let first = match tree.child_at(global, 0) {
        Some(first) => first,
        None => return false,
    };

    match tree.kind(first) {
        Kind::ObjCAttribute
        | Kind::TypeMetadataAccessFunction
        | Kind::ValueWitness
        | Kind::ProtocolWitnessTableAccessor
        | Kind::GenericProtocolWitnessTableInstantiationFunction
        | Kind::LazyProtocolWitnessTableAccessor
        | Kind::AssociatedTypeMetadataAccessor
        | Kind::AssociatedTypeWitnessTableAccessor => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_helpers() {
        assert_eq!(demangle_symbol_as_string(b"_TtSi").unwrap(), "Swift.Int");
        assert_eq!(demangle_symbol_as_string(b"_TtGSaSS_").unwrap(), "[Swift.String]");
        assert_eq!(demangle_symbol_as_string(b"hello"), None);
        assert_eq!(demangle_symbol_as_string(b""), None);
        assert_eq!(demangle_symbol_as_string(b"_TtC3foo10Bar"), None);

        assert_eq!(
            simplified_demangled_name(b"_TFC3foo3bar3basfS0_FT_T_").unwrap(),
            "bar.bas()"
        );
        assert_eq!(
            simplified_demangled_name(b"_TFC3foo3bar3basfT3zimCS_3zim_T_").unwrap(),
            "bar.bas(zim:)"
        );
        assert_eq!(
            simplified_demangled_name(b"_TWPC3foo3barS_8barrableS_").unwrap(),
            "protocol witness table for bar"
        );
    }

    #[test]
    fn bare_types() {
        let tree = try_demangle_type(b"GSqSi_").unwrap();
        assert_eq!(render(&tree, &DemangleOptions::simplified()), "Int?");
        assert!(try_demangle_type(b"").is_none());
        assert!(try_demangle_type(b"GSqSi").is_none());
    }

    #[test]
    fn errors_are_typed() {
        assert_eq!(mangled_symbol_to_tree(b"hello").unwrap_err(), Error::NotMangled);
        match mangled_symbol_to_tree(b"_TtS_") {
            Err(Error::MalformedGrammar { .. }) => {}
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn module_names() {
        assert_eq!(module_name_of(b"_TtSi").unwrap(), "Swift");
        assert_eq!(module_name_of(b"_TFC3foo3bar3basfT_T_").unwrap(), "foo");
        assert_eq!(module_name_of(b"_TToFC3foo3bar3basfT_T_").unwrap(), "foo");
        assert_eq!(module_name_of(b"_TZFV3foo3Bar3bazfT_T_").unwrap(), "foo");
        assert_eq!(module_name_of(b"_TFE3fooSi3bazfT_T_").unwrap(), "foo");
        assert_eq!(module_name_of(b"_TtSiSi"), None);
        assert_eq!(module_name_of(b"_TMSi"), None);
    }

    #[test]
    fn calling_convention() {
        assert!(has_swift_calling_convention(b"_TFC3foo3bar3basfT_T_"));
        assert!(has_swift_calling_convention(b"_TtSi"));
        assert!(!has_swift_calling_convention(b"_TToFC3foo3bar3basfT_T_"));
        assert!(!has_swift_calling_convention(b"_TMaSi"));
        assert!(!has_swift_calling_convention(b"_TwalSi"));
        assert!(!has_swift_calling_convention(b"hello"));
    }

    #[test]
    fn tree_introspection() {
        let tree = try_demangle(b"_TtBi32_").unwrap();
        let global = tree.root().unwrap();
        assert_eq!(tree.kind(global), Kind::Global);
        assert_eq!(tree.payload_kind(global), PayloadKind::None);

        let mangling = tree.child_at(global, 0).unwrap();
        let ty = tree.child_at(mangling, 0).unwrap();
        let builtin = tree.child_at(ty, 0).unwrap();
        assert_eq!(kind_name(tree.kind(builtin)), "BuiltinTypeName");
        assert_eq!(tree.payload_kind(builtin), PayloadKind::Text);
        assert_eq!(tree.text(builtin), Some("Builtin.Int32"));
        assert_eq!(tree.child_count(builtin), 0);
    }

    #[test]
    fn remangle_through_the_public_api() {
        let tree = try_demangle(b"_TtV5Swift3Int").unwrap();
        assert_eq!(remangle(&tree).unwrap(), "_TtSi");
    }
}
