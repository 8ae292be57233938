use crate::pretty::{render, DemangleOptions};
use crate::{parse, remangle};

mod arbitrary;

use self::arbitrary::{GlobalSymbol, NoisySymbol, TypeSymbol};

fn remangled_symbol_decodes_to_same_tree(symbol: &str) -> bool {
    let tree = match parse::parse_symbol(symbol.as_bytes()) {
        Ok(tree) => tree,
        Err(e) => panic!("{}: {}", symbol, e),
    };

    let remangled = match remangle(&tree) {
        Ok(remangled) => remangled,
        Err(e) => panic!("{}: {}", symbol, e),
    };

    match parse::parse_symbol(remangled.as_bytes()) {
        Ok(reparsed) => {
            if !reparsed.same_as(&tree) {
                panic!("Re-parsed symbol differs from original.\n\
                        original:  {}\n\
                        remangled: {}\n\
                        expected:  {:?}\n\
                        actual:    {:?}\n",
                        symbol,
                        remangled,
                        tree,
                        reparsed)
            } else {
                true
            }
        }
        Err(e) => {
            panic!("{} (from {}): {}", remangled, symbol, e)
        }
    }
}

fn remangling_is_a_fixed_point(symbol: &str) -> bool {
    let tree = parse::parse_symbol(symbol.as_bytes()).unwrap();
    let once = remangle(&tree).unwrap();
    let twice = remangle(&parse::parse_symbol(once.as_bytes()).unwrap()).unwrap();

    if once != twice {
        panic!("original:  {}\n\
                once:      {}\n\
                twice:     {}\n",
                symbol,
                once,
                twice)
    }

    true
}

fn rendering_survives_remangling(symbol: &str, options: &DemangleOptions) -> bool {
    let tree = parse::parse_symbol(symbol.as_bytes()).unwrap();
    let remangled = remangle(&tree).unwrap();
    let reparsed = parse::parse_symbol(remangled.as_bytes()).unwrap();

    let expected = render(&tree, options);
    let actual = render(&reparsed, options);
    if expected != actual {
        panic!("expected:  {}\n\
                actual:    {}\n\
                original:  {}\n\
                remangled: {}\n",
                expected,
                actual,
                symbol,
                remangled)
    }

    true
}

quickcheck! {
    fn decoding_noise_does_not_crash(symbol: NoisySymbol) -> bool {
        if let Ok(tree) = parse::parse_symbol(&symbol.0) {
            render(&tree, &DemangleOptions::new());
            render(&tree, &DemangleOptions::simplified());
        }
        true
    }
}

quickcheck! {
    fn remangled_type_decodes_to_same_tree(symbol: TypeSymbol) -> bool {
        remangled_symbol_decodes_to_same_tree(&symbol.0)
    }
}

quickcheck! {
    fn remangled_global_decodes_to_same_tree(symbol: GlobalSymbol) -> bool {
        remangled_symbol_decodes_to_same_tree(&symbol.0)
    }
}

quickcheck! {
    fn type_remangling_is_a_fixed_point(symbol: TypeSymbol) -> bool {
        remangling_is_a_fixed_point(&symbol.0)
    }
}

quickcheck! {
    fn global_remangling_is_a_fixed_point(symbol: GlobalSymbol) -> bool {
        remangling_is_a_fixed_point(&symbol.0)
    }
}

quickcheck! {
    fn type_rendering_survives_remangling(symbol: TypeSymbol) -> bool {
        let options = DemangleOptions {
            synthesize_sugar_on_types: true,
            ..DemangleOptions::new()
        };
        rendering_survives_remangling(&symbol.0, &options)
    }
}

quickcheck! {
    fn global_rendering_survives_remangling(symbol: GlobalSymbol) -> bool {
        rendering_survives_remangling(&symbol.0, &DemangleOptions::simplified())
    }
}
