#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_computed::{is_placeholder, parse, resolve_columns};
use formula_table::{ColumnSchema, Schema, ScalarKind};

/// Keep the harness bounded; deeply nested inputs recurse in the parser.
const MAX_FUZZ_FORMULA_CHARS: usize = 1_024;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_FORMULA_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn schema() -> Schema {
    Schema::new(vec![
        ColumnSchema::new("a", ScalarKind::Int),
        ColumnSchema::new("Sales Tax", ScalarKind::Float),
        ColumnSchema::new("say \"hi\"", ScalarKind::Str),
        ColumnSchema::new("", ScalarKind::Bool),
    ])
    .expect("static schema is valid")
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FUZZ_FORMULA_CHARS);

    // Parsing raw text must never panic, whatever it contains.
    let _ = parse(formula);

    let Ok(resolved) = resolve_columns(formula, &schema()) else {
        return;
    };

    // Every placeholder is distinct and maps to a distinct column.
    for (i, (placeholder, column)) in resolved.column_ids.iter().enumerate() {
        assert!(is_placeholder(placeholder), "{placeholder}");
        for (other_placeholder, other_column) in &resolved.column_ids[i + 1..] {
            assert_ne!(placeholder, other_placeholder);
            assert_ne!(column, other_column);
        }
    }

    // Quoted references are gone from the resolved text, so any identifier the parser sees is
    // either a declared placeholder or something that was never a column reference.
    if let Ok(expr) = parse(&resolved.parsed_expression) {
        let mut seen = Vec::new();
        expr.for_each_identifier(&mut |ident| seen.push(ident.to_string()));
        for ident in seen.iter().filter(|ident| is_placeholder(ident)) {
            assert!(
                resolved.column_ids.iter().any(|(p, _)| p == ident),
                "undeclared placeholder {ident} in {:?}",
                resolved.parsed_expression
            );
        }
    }
});
