//! Random `_T` manglings, spelled out in long form.
//!
//! Nothing generated here uses back references, so every string is valid on
//! its own. The decoder is what introduces sharing; the encoder then has to
//! find it again.

use crate::parse::VALUE_WITNESSES;
use quickcheck::{Arbitrary, Gen};
use rand::Rng;
use std::cmp;

const MAX_NESTING: usize = 4;

/// A well-formed `_Tt` symbol.
#[derive(Clone, Debug)]
pub struct TypeSymbol(pub String);

/// A well-formed `_T` symbol for an entity, a witness or a metadata record.
#[derive(Clone, Debug)]
pub struct GlobalSymbol(pub String);

/// Arbitrary bytes behind a `_T` prefix.
#[derive(Clone, Debug)]
pub struct NoisySymbol(pub Vec<u8>);

impl Arbitrary for TypeSymbol {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        let nesting = cmp::min(MAX_NESTING, g.size() / 10 + 1);
        let mut out = String::from("_Tt");
        generate_type(g, &mut out, nesting);
        TypeSymbol(out)
    }
}

impl Arbitrary for GlobalSymbol {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        let nesting = cmp::min(MAX_NESTING, g.size() / 10 + 1);
        let mut out = String::from("_T");
        match g.next_u32() % 8 {
            0 => out.push_str(*g.choose(&["PA__T", "PAo__T"]).unwrap()),
            1 => out.push_str(*g.choose(&["To", "TO", "TD", "Td", "TV"]).unwrap()),
            _ => {}
        }
        generate_global(g, &mut out, nesting);
        GlobalSymbol(out)
    }
}

impl Arbitrary for NoisySymbol {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        let size = cmp::max(1, g.size());
        let len = g.gen_range(0, size);
        let mut bytes = b"_T".to_vec();
        for _ in 0..len {
            // Mostly grammar letters and digits so that decoding gets somewhere.
            let byte = match g.next_u32() % 4 {
                0 => *g.choose(b"0123456789_").unwrap(),
                1 | 2 => *g.choose(b"BCFGMOPRSTVXabfiopqrstuvwxz").unwrap(),
                3 => g.gen::<u8>(),
                _ => unreachable!(),
            };
            bytes.push(byte);
        }
        NoisySymbol(bytes)
    }
}

static IDENTS_ASCII: &[&str] = &[
    "foo", "Bar", "baz_qux", "Int", "String", "Array", "Optional", "Dictionary", "a", "Z9",
];

static IDENTS_UNICODE: &[&str] = &["ρυστ", "铁锈", "Schrödinger", "Ünicode", "∀x"];

static MODULES: &[&str] = &["foo", "Swift", "bar_baz", "M"];

// Protocols stay out of the standard library so that `s` never has to
// compete with a spelled-out `Swift` context.
static PROTOCOL_MODULES: &[&str] = &["foo", "bar_baz", "M"];

fn push_ident(out: &mut String, ident: &str) {
    out.push_str(&ident.len().to_string());
    out.push_str(ident);
}

fn generate_ident<G: Gen>(g: &mut G, out: &mut String) {
    if g.next_u32() % 5 == 0 {
        let ident = *g.choose(IDENTS_UNICODE).unwrap();
        let encoded = crate::charset::encode_punycode_ident(ident).unwrap();
        out.push('X');
        push_ident(out, &encoded);
    } else {
        push_ident(out, *g.choose(IDENTS_ASCII).unwrap());
    }
}

fn generate_decl_name<G: Gen>(g: &mut G, out: &mut String) {
    match g.next_u32() % 6 {
        0 => {
            out.push('L');
            out.push_str(*g.choose(&["_", "0_", "4_"]).unwrap());
            generate_ident(g, out);
        }
        1 => {
            out.push('P');
            push_ident(out, "_DISC");
            generate_ident(g, out);
        }
        _ => generate_ident(g, out),
    }
}

fn generate_nominal<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    out.push(*g.choose(&['V', 'C', 'O']).unwrap());
    if nesting > 1 && g.next_u32() % 4 == 0 {
        generate_nominal(g, out, nesting - 1);
    } else {
        push_ident(out, *g.choose(MODULES).unwrap());
    }
    generate_decl_name(g, out);
}

fn generate_protocol<G: Gen>(g: &mut G, out: &mut String) {
    push_ident(out, *g.choose(PROTOCOL_MODULES).unwrap());
    generate_decl_name(g, out);
}

fn generate_tuple<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    out.push('T');
    for _ in 0..g.gen_range(0, 4) {
        if g.next_u32() % 3 == 0 {
            push_ident(out, *g.choose(&["x", "label", "to"]).unwrap());
        }
        generate_type(g, out, nesting - 1);
    }
    out.push('_');
}

fn generate_type<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    if nesting == 0 {
        match g.next_u32() % 3 {
            0 => generate_nominal(g, out, 1),
            1 => out.push_str(*g.choose(&["Bi32_", "Bf64_", "Bo", "Bp", "Bw"]).unwrap()),
            2 => out.push_str(*g.choose(&["x", "q_", "T_"]).unwrap()),
            _ => unreachable!(),
        }
        return;
    }

    match g.next_u32() % 11 {
        0 | 1 => generate_nominal(g, out, nesting),
        2 => out.push_str(*g.choose(&["Bi8_", "Bi64_", "Bf32_", "Bv4Bi8_", "BO", "Bb"]).unwrap()),
        3 => generate_tuple(g, out, nesting),
        4 => {
            out.push('F');
            if g.next_u32() % 3 == 0 {
                out.push('z');
            }
            generate_tuple(g, out, nesting);
            generate_type(g, out, nesting - 1);
        }
        5 => {
            out.push('M');
            generate_type(g, out, nesting - 1);
        }
        6 => {
            out.push('G');
            generate_nominal(g, out, nesting);
            for _ in 0..g.gen_range(1, 3) {
                generate_type(g, out, nesting - 1);
            }
            out.push('_');
        }
        7 => {
            out.push('P');
            for _ in 0..g.gen_range(0, 3) {
                generate_protocol(g, out);
            }
            out.push('_');
        }
        8 => {
            out.push_str(*g.choose(&["R", "Xw", "Xo", "Xu", "PM"]).unwrap());
            generate_type(g, out, nesting - 1);
        }
        9 => out.push_str(*g.choose(&["x", "q_", "qd__"]).unwrap()),
        10 => {
            out.push(*g.choose(&['b', 'c', 'K']).unwrap());
            generate_tuple(g, out, nesting);
            generate_type(g, out, nesting - 1);
        }
        _ => unreachable!(),
    }
}

fn generate_module<G: Gen>(g: &mut G, out: &mut String) {
    push_ident(out, *g.choose(MODULES).unwrap());
}

fn generate_global<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    match g.next_u32() % 15 {
        0..=4 => generate_entity(g, out, nesting),
        5 => {
            // Plain `M` is only safe because nominals never start with a
            // metadata letter.
            out.push_str(*g.choose(&["M", "MP", "Ma", "ML", "Mm", "Mn", "Mf"]).unwrap());
            generate_nominal(g, out, nesting);
        }
        6 => {
            out.push_str("Mp");
            generate_protocol(g, out);
        }
        7 => {
            out.push('w');
            out.push_str(g.choose(VALUE_WITNESSES).unwrap().0);
            generate_type(g, out, nesting - 1);
        }
        8 => {
            out.push_str("WV");
            generate_type(g, out, nesting - 1);
        }
        9 => {
            out.push_str(*g.choose(&["WP", "WG", "WI", "Wa"]).unwrap());
            generate_conformance(g, out);
        }
        10 => {
            out.push_str(*g.choose(&["Wl", "WL"]).unwrap());
            generate_nominal(g, out, 1);
            generate_conformance(g, out);
        }
        11 => {
            out.push_str("Wt");
            generate_conformance(g, out);
            generate_decl_name(g, out);
        }
        12 => {
            out.push_str("TW");
            generate_conformance(g, out);
            generate_function(g, out, nesting);
        }
        13 => {
            out.push_str(*g.choose(&["TR", "Tr"]).unwrap());
            generate_type(g, out, nesting - 1);
            generate_type(g, out, nesting - 1);
        }
        14 => {
            out.push_str(*g.choose(&["Wvd", "Wvi"]).unwrap());
            generate_entity(g, out, nesting);
        }
        _ => unreachable!(),
    }
}

fn generate_conformance<G: Gen>(g: &mut G, out: &mut String) {
    generate_nominal(g, out, 1);
    generate_protocol(g, out);
    generate_module(g, out);
}

fn generate_entity<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    if g.next_u32() % 6 == 0 {
        out.push('Z');
    }

    match g.next_u32() % 9 {
        0 | 1 => generate_function(g, out, nesting),
        2 => {
            out.push('v');
            generate_context(g, out, nesting);
            generate_decl_name(g, out);
            generate_type(g, out, nesting - 1);
        }
        3 => {
            out.push('i');
            generate_context(g, out, nesting);
            generate_decl_name(g, out);
            generate_function_type(g, out, nesting);
        }
        4 => {
            out.push('F');
            generate_context(g, out, nesting);
            let accessors = ["g", "G", "s", "m", "w", "W", "au", "aO", "lo", "lp"];
            out.push_str(*g.choose(&accessors).unwrap());
            generate_decl_name(g, out);
            generate_type(g, out, nesting - 1);
        }
        5 => {
            out.push('F');
            generate_context(g, out, nesting);
            out.push(*g.choose(&['U', 'u']).unwrap());
            out.push_str(*g.choose(&["_", "0_", "3_"]).unwrap());
            generate_function_type(g, out, nesting);
        }
        6 => {
            out.push_str("Iv");
            generate_context(g, out, nesting);
            generate_decl_name(g, out);
            generate_type(g, out, nesting - 1);
            out.push('i');
        }
        7 => {
            out.push('I');
            generate_function(g, out, nesting);
            out.push('A');
            out.push_str(*g.choose(&["_", "0_"]).unwrap());
        }
        8 => {
            out.push('F');
            generate_nominal(g, out, nesting);
            match g.next_u32() % 3 {
                0 => {
                    out.push(*g.choose(&['C', 'c']).unwrap());
                    generate_function_type(g, out, nesting);
                }
                _ => out.push(*g.choose(&['D', 'd', 'e', 'E']).unwrap()),
            }
        }
        _ => unreachable!(),
    }
}

fn generate_function<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    out.push('F');
    generate_context(g, out, nesting);
    if g.next_u32() % 6 == 0 {
        out.push_str(*g.choose(&["oi1p", "op1s", "oP2qq", "oi2ee"]).unwrap());
    } else {
        generate_decl_name(g, out);
    }
    generate_function_type(g, out, nesting);
}

fn generate_function_type<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    if g.next_u32() % 3 == 0 {
        out.push('u');
        generate_generic_signature(g, out, nesting);
    }
    out.push('F');
    if g.next_u32() % 4 == 0 {
        out.push('z');
    }
    generate_tuple(g, out, nesting);
    generate_type(g, out, nesting - 1);
}

/// Subscripts are left out: they cannot be read back as a context.
fn generate_context<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    if nesting <= 1 {
        generate_module(g, out);
        return;
    }

    match g.next_u32() % 7 {
        0 | 1 => generate_module(g, out),
        2 => generate_nominal(g, out, nesting - 1),
        3 => {
            out.push('P');
            generate_protocol(g, out);
        }
        4 => {
            out.push('E');
            generate_module(g, out);
            generate_nominal(g, out, nesting - 1);
        }
        5 => {
            out.push('e');
            generate_module(g, out);
            generate_generic_signature(g, out, nesting - 1);
            generate_nominal(g, out, nesting - 1);
        }
        6 => generate_function(g, out, nesting - 1),
        _ => unreachable!(),
    }
}

fn generate_generic_signature<G: Gen>(g: &mut G, out: &mut String, nesting: usize) {
    out.push_str(*g.choose(&["", "z", "0_", "z_"]).unwrap());

    let requirements = g.gen_range(0, 3);
    if requirements == 0 {
        out.push('r');
        return;
    }

    out.push('R');
    for _ in 0..requirements {
        out.push_str(*g.choose(&["x", "_", "d__"]).unwrap());
        match g.next_u32() % 3 {
            0 => {
                out.push('z');
                generate_type(g, out, nesting - 1);
            }
            1 => {
                out.push('C');
                generate_module(g, out);
                generate_decl_name(g, out);
            }
            2 => generate_protocol(g, out),
            _ => unreachable!(),
        }
    }
    out.push('r');
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::StdThreadGen;

    #[test]
    fn generated_types_decode() {
        let g = &mut StdThreadGen::new(40);
        for _ in 0..200 {
            let TypeSymbol(symbol) = TypeSymbol::arbitrary(g);
            if let Err(e) = crate::parse::parse_symbol(symbol.as_bytes()) {
                panic!("{}: {}", symbol, e);
            }
        }
    }

    #[test]
    fn generated_globals_decode() {
        let g = &mut StdThreadGen::new(40);
        for _ in 0..200 {
            let GlobalSymbol(symbol) = GlobalSymbol::arbitrary(g);
            if let Err(e) = crate::parse::parse_symbol(symbol.as_bytes()) {
                panic!("{}: {}", symbol, e);
            }
        }
    }
}
