use std::io::{self, BufRead, Write};

use swift_demangle_rs::{init_tracing, remangle, render, try_demangle, DemangleOptions};

struct Config {
    options: DemangleOptions,
    remangle: bool,
    symbols: Vec<String>,
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config {
        options: DemangleOptions {
            synthesize_sugar_on_types: true,
            ..DemangleOptions::new()
        },
        remangle: false,
        symbols: Vec::new(),
    };

    for arg in std::env::args().skip(1) {
        match &arg[..] {
            "-s" | "--simplified" => config.options = DemangleOptions::simplified(),
            "--remangle" => config.remangle = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
            _ => config.symbols.push(arg),
        }
    }

    Ok(config)
}

/// Unrecognized input is echoed back unchanged.
fn demangle_line(config: &Config, symbol: &str) -> String {
    let tree = match try_demangle(symbol.as_bytes()) {
        Some(tree) => tree,
        None => return symbol.to_owned(),
    };

    if config.remangle {
        match remangle(&tree) {
            Ok(remangled) => remangled,
            Err(e) => format!("{} ; {}", symbol, e),
        }
    } else {
        render(&tree, &config.options)
    }
}

fn main() {
    init_tracing();

    let config = match parse_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("usage: swift-demangle [-s|--simplified] [--remangle] [symbol...]");
            std::process::exit(2);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !config.symbols.is_empty() {
        for symbol in &config.symbols {
            if writeln!(out, "{}", demangle_line(&config, symbol)).is_err() {
                return;
            }
        }
        return;
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        };

        if writeln!(out, "{}", demangle_line(&config, line.trim())).is_err() {
            return;
        }
    }
}
