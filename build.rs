use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

fn main() {
    let test_case_definitions_path = Path::new("src").join("demangling_test_data.txt");
    println!("cargo:rerun-if-changed={}", test_case_definitions_path.display());

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("generated_tests.rs");
    let mut output = File::create(&dest_path).unwrap();

    let test_case_definitions = BufReader::new(File::open(test_case_definitions_path).unwrap());

    let mut title = String::new();
    let mut case_in_group = 0;

    for line in test_case_definitions.lines().map(|l| l.unwrap()) {
        if line.starts_with('#') {
            title = line[1..]
                .trim()
                .replace(" ", "_")
                .replace("/", "_")
                .replace(",", "_")
                .replace("-", "_");
            case_in_group = 0;
            continue;
        }

        if !line.starts_with("_T") || title.is_empty() {
            continue;
        }

        let end_of_mangled_name = line.find(' ').unwrap();
        let mangled = &line[..end_of_mangled_name];
        let demangled = line[end_of_mangled_name + 1..].trim();

        writeln!(output, "#[test] #[allow(non_snake_case)] fn {}_{}() {{", title, case_in_group).unwrap();
        writeln!(output, "  let demangled_expected = {:?};", demangled).unwrap();
        writeln!(output, "  let demangled_actual = crate::demangle_symbol_as_string(b{:?}).unwrap();", mangled).unwrap();
        writeln!(output, "  assert_eq!(demangled_expected, demangled_actual);").unwrap();
        writeln!(output, "  let tree = crate::try_demangle(b{:?}).unwrap();", mangled).unwrap();
        writeln!(output, "  let remangled = crate::remangle(&tree).unwrap();").unwrap();
        writeln!(output, "  assert_eq!(crate::try_demangle(remangled.as_bytes()).map(|t| t.same_as(&tree)), Some(true));").unwrap();
        writeln!(output, "}}").unwrap();

        case_in_group += 1;
    }
}
