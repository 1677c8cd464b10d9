#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_computed::{ChangedRow, ComputeEngine, ComputeOptions};
use formula_table::{ColumnSchema, DataTable, Scalar, ScalarKind};

const MAX_EVAL_FORMULA_CHARS: usize = 512;
const MAX_INPUT_BYTES: usize = MAX_EVAL_FORMULA_CHARS * 4; // max UTF-8 bytes per char
const ROWS: i64 = 16;

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn table() -> DataTable {
    let mut table = DataTable::new(vec![
        ColumnSchema::new("a", ScalarKind::Int),
        ColumnSchema::new("x", ScalarKind::Float),
        ColumnSchema::new("s", ScalarKind::Str),
        ColumnSchema::new("t", ScalarKind::DateTime),
        ColumnSchema::new("f", ScalarKind::Bool),
    ])
    .expect("static schema is valid");
    for i in 0..ROWS {
        let row = if i % 5 == 4 {
            vec![
                Scalar::Null(ScalarKind::Int),
                Scalar::Null(ScalarKind::Float),
                Scalar::Null(ScalarKind::Str),
                Scalar::Null(ScalarKind::DateTime),
                Scalar::Null(ScalarKind::Bool),
            ]
        } else {
            vec![
                Scalar::Int(i - 8),
                Scalar::Float(i as f64 * 0.5 - 3.0),
                Scalar::from("abcdefghijklmnop".get(..i as usize).unwrap_or("")),
                Scalar::DateTime(i * 86_400_000),
                Scalar::Bool(i % 2 == 0),
            ]
        };
        table.push_row(row).expect("row matches schema");
    }
    table
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let selector = data[0];
    let data = &data[1..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_EVAL_FORMULA_CHARS);

    let engine = ComputeEngine::new(ComputeOptions {
        check_type_stability: selector & 1 == 0,
        log_timings: false,
    });
    let mut table = table();
    let Ok(expr) = engine.resolve_and_infer(formula, &table.schema()) else {
        return;
    };

    let before = table.clone();
    if engine.materialize(&expr, &mut table).is_err() {
        // A failed pass must not leave a partially written column behind.
        assert_eq!(table, before);
        return;
    }

    let out = table.column(expr.expression()).expect("materialized column exists");
    for value in out.iter() {
        assert!(value.is_null() || value.kind() == expr.dtype());
    }

    // Recomputing a row with unchanged inputs reproduces the materialized value.
    let row = usize::from(selector >> 1) % ROWS as usize;
    let authoritative = table.clone();
    let mut working = table.clone();
    engine
        .update(&expr, &authoritative, &mut working, &[ChangedRow::updated(row)])
        .expect("inputs are unchanged, so the row evaluated before");
    let (left, right) = (working.get(expr.expression(), row), table.get(expr.expression(), row));
    match (left, right) {
        (Some(Scalar::Float(l)), Some(Scalar::Float(r))) => assert!(l == r || (l.is_nan() && r.is_nan())),
        (l, r) => assert_eq!(l, r),
    }
});
