use formula_table::{ColumnSchema, DataTable, Scalar, ScalarKind, TableError};
use pretty_assertions::assert_eq;

fn numbers() -> DataTable {
    let mut table = DataTable::new(vec![
        ColumnSchema::new("a", ScalarKind::Int),
        ColumnSchema::new("b", ScalarKind::Float),
    ])
    .unwrap();
    table.push_row(vec![1.into(), 1.5.into()]).unwrap();
    table.push_row(vec![2.into(), Scalar::NONE]).unwrap();
    table
}

#[test]
fn schema_reports_names_and_kinds_in_order() {
    let table = numbers();
    let schema = table.schema();
    assert_eq!(
        schema.columns(),
        &[
            ColumnSchema::new("a", ScalarKind::Int),
            ColumnSchema::new("b", ScalarKind::Float),
        ]
    );
    assert_eq!(schema.column_kind("b"), Some(ScalarKind::Float));
    assert_eq!(schema.column_kind("z"), None);
}

#[test]
fn duplicate_schema_columns_are_rejected() {
    let err = DataTable::new(vec![
        ColumnSchema::new("a", ScalarKind::Int),
        ColumnSchema::new("a", ScalarKind::Str),
    ])
    .unwrap_err();
    assert_eq!(err, TableError::DuplicateColumn("a".into()));
}

#[test]
fn push_row_is_all_or_nothing() {
    let mut table = numbers();
    let err = table
        .push_row(vec![3.into(), Scalar::from("oops")])
        .unwrap_err();
    assert!(matches!(err, TableError::ColumnTypeMismatch { .. }));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column("a").unwrap().len(), 2);

    let err = table.push_row(vec![3.into()]).unwrap_err();
    assert_eq!(
        err,
        TableError::SchemaMismatch {
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn add_column_is_get_or_create() {
    let mut table = numbers();
    table
        .add_column("out", ScalarKind::Int)
        .unwrap()
        .set(0, Scalar::Int(9))
        .unwrap();
    assert_eq!(table.column("out").unwrap().len(), 2);

    // Asking again returns the same column with its contents intact.
    let again = table.add_column("out", ScalarKind::Int).unwrap();
    assert_eq!(again.get(0), Scalar::Int(9));

    let err = table.add_column("out", ScalarKind::Str).unwrap_err();
    assert!(matches!(err, TableError::ColumnTypeMismatch { .. }));
}

#[test]
fn set_past_the_end_grows_every_column() {
    let mut table = numbers();
    table.set("a", 3, Scalar::Int(4)).unwrap();
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.get("b", 3), Some(Scalar::Null(ScalarKind::Float)));
    assert_eq!(table.get("a", 2), Some(Scalar::Null(ScalarKind::Int)));
    assert_eq!(
        table.set("nope", 0, Scalar::Int(1)).unwrap_err(),
        TableError::UnknownColumn("nope".into())
    );
}

#[test]
fn bound_columns_survive_writes_to_the_table() {
    let mut table = numbers();
    let bound = table.column("a").unwrap();
    table.set("a", 0, Scalar::Int(100)).unwrap();

    // The binding still sees the values from when it was taken.
    assert_eq!(bound.get(0), Scalar::Int(1));
    assert_eq!(table.get("a", 0), Some(Scalar::Int(100)));
}

#[test]
fn remove_column_reindexes_the_rest() {
    let mut table = numbers();
    table.add_column("c", ScalarKind::Bool).unwrap();
    assert!(table.remove_column("a").is_some());
    assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["b", "c"]);
    assert_eq!(table.get("c", 0), Some(Scalar::Null(ScalarKind::Bool)));
    assert_eq!(table.get("b", 0), Some(Scalar::Float(1.5)));
}

#[test]
fn scalar_kinds_serialize_lowercase() {
    let json = serde_json::to_string(&ScalarKind::DateTime).unwrap();
    assert_eq!(json, "\"datetime\"");
}

#[test]
fn writes_past_the_row_limit_are_rejected_without_growing() {
    let mut table = numbers();
    for row in [usize::MAX, formula_table::MAX_ROWS] {
        assert_eq!(
            table.set("a", row, Scalar::Int(1)).unwrap_err(),
            TableError::RowOutOfBounds {
                row,
                max_rows: formula_table::MAX_ROWS,
            }
        );
    }
    assert_eq!(table.row_count(), 2);
    assert_eq!(table, numbers());
}
