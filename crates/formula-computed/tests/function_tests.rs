use formula_computed::{
    iter_function_specs, lookup_function, ComputeEngine, ComputeError, VAR_ARGS,
};
use formula_table::{ColumnSchema, DataTable, Scalar, ScalarKind};
use pretty_assertions::assert_eq;

fn events() -> DataTable {
    let mut table = DataTable::new(vec![
        ColumnSchema::new("when", ScalarKind::DateTime),
        ColumnSchema::new("label", ScalarKind::Str),
        ColumnSchema::new("score", ScalarKind::Float),
    ])
    .unwrap();
    // 2021-03-04 05:06:07 UTC and 1999-12-31 23:59:59 UTC
    table
        .push_row(vec![
            Scalar::DateTime(1_614_834_367_000),
            "  Launch ".into(),
            2.25.into(),
        ])
        .unwrap();
    table
        .push_row(vec![
            Scalar::DateTime(946_684_799_000),
            Scalar::Null(ScalarKind::Str),
            Scalar::Null(ScalarKind::Float),
        ])
        .unwrap();
    table
}

fn eval(formula: &str) -> Result<Vec<Scalar>, ComputeError> {
    let mut table = events();
    let engine = ComputeEngine::default();
    let expr = engine.resolve_and_infer(formula, &table.schema())?;
    engine.materialize(&expr, &mut table)?;
    Ok(table.column(formula).unwrap().to_values())
}

#[test]
fn date_parts() {
    assert_eq!(
        eval(r#"year("when") * 10000 + month("when") * 100 + day("when")"#).unwrap(),
        vec![Scalar::Int(20210304), Scalar::Int(19991231)]
    );
    assert_eq!(
        eval(r#"hour("when") * 3600 + minute("when") * 60 + second("when")"#).unwrap(),
        vec![Scalar::Int(18367), Scalar::Int(86399)]
    );
}

#[test]
fn datetime_arithmetic_and_construction() {
    assert_eq!(
        eval(r#""when" - date(1999, 12, 31)"#).unwrap(),
        vec![Scalar::Int(1_614_834_367_000 - 946_598_400_000), Scalar::Int(86_399_000)]
    );
    assert_eq!(
        eval(r#""when" + 1000 > date(2000, 1, 1)"#).unwrap(),
        vec![Scalar::Bool(true), Scalar::Bool(false)]
    );
}

#[test]
fn text_functions_with_nulls() {
    assert_eq!(
        eval(r#"lower(trim("label"))"#).unwrap(),
        vec![Scalar::from("launch"), Scalar::Null(ScalarKind::Str)]
    );
    assert_eq!(
        eval(r#"concat(trim("label"), ':', "score")"#).unwrap(),
        vec![Scalar::from("Launch:2.25"), Scalar::from(":")]
    );
    assert_eq!(
        eval(r#"contains(upper("label"), 'LAUNCH')"#).unwrap(),
        vec![Scalar::Bool(true), Scalar::Null(ScalarKind::Bool)]
    );
}

#[test]
fn conversions_and_null_handling() {
    assert_eq!(
        eval(r#"coalesce("score", 0.0) * 2"#).unwrap(),
        vec![Scalar::Float(4.5), Scalar::Float(0.0)]
    );
    assert_eq!(
        eval(r#"is_null("label")"#).unwrap(),
        vec![Scalar::Bool(false), Scalar::Bool(true)]
    );
    assert_eq!(
        eval(r#"to_integer("score")"#).unwrap(),
        vec![Scalar::Int(2), Scalar::Null(ScalarKind::Int)]
    );
    assert_eq!(
        eval(r#"to_string(round("score", 1))"#).unwrap(),
        vec![Scalar::from("2.3"), Scalar::Null(ScalarKind::Str)]
    );
}

#[test]
fn wrong_argument_types_are_reported_at_registration() {
    let err = eval(r#"year("label")"#).unwrap_err();
    assert!(matches!(err, ComputeError::Compile { .. }), "{err}");
    assert!(err.to_string().contains("year() expects a datetime"), "{err}");
}

#[test]
fn registry_exposes_the_builtins() {
    let names: Vec<&str> = iter_function_specs().map(|spec| spec.name).collect();
    for expected in [
        "abs", "sqrt", "pow", "exp", "ln", "log10", "floor", "ceil", "round", "min", "max",
        "upper", "lower", "length", "concat", "trim", "contains", "year", "month", "day", "hour",
        "minute", "second", "date", "is_null", "coalesce", "to_float", "to_integer",
        "to_string",
    ] {
        assert!(names.contains(&expected), "missing built-in {expected}");
    }
    let concat = lookup_function("CONCAT").unwrap();
    assert_eq!((concat.min_args, concat.max_args), (1, VAR_ARGS));
}
