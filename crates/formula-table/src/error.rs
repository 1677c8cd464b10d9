use crate::types::ScalarKind;

pub type TableResult<T> = Result<T, TableError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column {column} has type {expected}, cannot store a value of type {actual}")]
    ColumnTypeMismatch {
        column: String,
        expected: ScalarKind,
        actual: ScalarKind,
    },

    #[error("column length mismatch for {column}: expected {expected} rows, got {actual}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("row {row} is past the maximum table size of {max_rows} rows")]
    RowOutOfBounds { row: usize, max_rows: usize },

    #[error("schema mismatch: expected {expected} values, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },
}
