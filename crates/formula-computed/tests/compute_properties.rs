#![cfg(not(target_arch = "wasm32"))]

use formula_computed::{ChangedRow, ComputeEngine, ComputedExpression};
use formula_table::{ColumnSchema, DataTable, Scalar, ScalarKind};
use proptest::prelude::*;

const FORMULAS: &[&str] = &[
    r#""a" + "b""#,
    r#""a" * 3 - "b""#,
    r#""a" / ("b" * "b" + 1)"#,
    r#"if("a" > "b", "a", "b")"#,
    r#"abs("a" - "b") % 7"#,
    r#""x" * "a" + 0.25"#,
    r#"concat("s", '-', "a")"#,
    r#"length("s") + coalesce("a", -1)"#,
    r#""a" > 0 and "s" != ''"#,
    r#"max("a", "b", 0)"#,
];

fn arb_int() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        8 => (-1000i64..1000).prop_map(Scalar::Int),
        1 => Just(Scalar::Null(ScalarKind::Int)),
    ]
}

fn arb_row() -> impl Strategy<Value = Vec<Scalar>> {
    (
        arb_int(),
        arb_int(),
        prop_oneof![
            (-1.0e6f64..1.0e6).prop_map(Scalar::Float),
            Just(Scalar::Null(ScalarKind::Float)),
        ],
        "[a-z]{0,6}".prop_map(Scalar::from),
    )
        .prop_map(|(a, b, x, s)| vec![a, b, x, s])
}

fn build_table(rows: &[Vec<Scalar>]) -> DataTable {
    let mut table = DataTable::new(vec![
        ColumnSchema::new("a", ScalarKind::Int),
        ColumnSchema::new("b", ScalarKind::Int),
        ColumnSchema::new("x", ScalarKind::Float),
        ColumnSchema::new("s", ScalarKind::Str),
    ])
    .unwrap();
    for row in rows {
        table.push_row(row.clone()).unwrap();
    }
    table
}

fn register(engine: &ComputeEngine, formula: &str, table: &DataTable) -> ComputedExpression {
    engine.resolve_and_infer(formula, &table.schema()).unwrap()
}

fn output(table: &DataTable, expr: &ComputedExpression) -> Vec<Scalar> {
    table.column(expr.expression()).unwrap().to_values()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_row_matches_the_inferred_type(
        rows in prop::collection::vec(arb_row(), 0..24),
        formula in prop::sample::select(FORMULAS),
    ) {
        let engine = ComputeEngine::default();
        let mut table = build_table(&rows);
        let expr = register(&engine, formula, &table);
        engine.materialize(&expr, &mut table).unwrap();
        for value in output(&table, &expr) {
            prop_assert!(value.is_null() || value.kind() == expr.dtype(), "{value:?}");
        }
    }

    #[test]
    fn full_recompute_matches_materialize(
        rows in prop::collection::vec(arb_row(), 0..24),
        formula in prop::sample::select(FORMULAS),
    ) {
        let engine = ComputeEngine::default();
        let mut materialized = build_table(&rows);
        let expr = register(&engine, formula, &materialized);
        engine.materialize(&expr, &mut materialized).unwrap();

        let authoritative = build_table(&rows);
        let mut working = authoritative.clone();
        engine.update(&expr, &authoritative, &mut working, &[]).unwrap();

        prop_assert_eq!(output(&working, &expr), output(&materialized, &expr));
    }

    #[test]
    fn recompute_of_unchanged_rows_agrees(
        rows in prop::collection::vec(arb_row(), 1..24),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..8),
        formula in prop::sample::select(FORMULAS),
    ) {
        let engine = ComputeEngine::default();
        let mut table = build_table(&rows);
        let expr = register(&engine, formula, &table);
        engine.materialize(&expr, &mut table).unwrap();
        let before = output(&table, &expr);

        let authoritative = table.clone();
        let changed: Vec<ChangedRow> = picks
            .iter()
            .map(|pick| ChangedRow::updated(pick.index(rows.len())))
            .collect();
        engine.update(&expr, &authoritative, &mut table, &changed).unwrap();

        prop_assert_eq!(output(&table, &expr), before);
    }

    #[test]
    fn materialize_is_idempotent(
        rows in prop::collection::vec(arb_row(), 0..24),
        formula in prop::sample::select(FORMULAS),
    ) {
        let engine = ComputeEngine::default();
        let mut table = build_table(&rows);
        let expr = register(&engine, formula, &table);
        engine.materialize(&expr, &mut table).unwrap();
        let once = table.clone();
        engine.materialize(&expr, &mut table).unwrap();
        prop_assert_eq!(table, once);
    }

    #[test]
    fn distinct_columns_never_share_a_slot(
        rows in prop::collection::vec(arb_row(), 1..24),
    ) {
        let engine = ComputeEngine::default();
        let mut table = build_table(&rows);
        let expr = register(&engine, r#"concat("a", '|', "b")"#, &table);
        engine.materialize(&expr, &mut table).unwrap();

        for (row, value) in output(&table, &expr).into_iter().enumerate() {
            let part = |v: &Scalar| if v.is_null() { String::new() } else { v.to_string() };
            let expected = format!("{}|{}", part(&rows[row][0]), part(&rows[row][1]));
            prop_assert_eq!(value, Scalar::from(expected));
        }
    }
}
