use formula_table::{ScalarKind, TableError};

pub type ComputeResult<T> = Result<T, ComputeError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    #[error("unknown column \"{column}\" referenced in expression `{formula}`")]
    Reference { column: String, formula: String },

    #[error("failed to compile expression `{formula}`: {message}")]
    Compile { message: String, formula: String },

    #[error("failed to evaluate expression `{formula}` at row {row}: {message}")]
    Eval {
        row: usize,
        message: String,
        formula: String,
    },

    #[error(
        "expression `{formula}` produced a {actual} value at row {row} but its inferred type is {expected}"
    )]
    TypeInstability {
        formula: String,
        row: usize,
        expected: ScalarKind,
        actual: ScalarKind,
    },

    #[error("row {row} is out of bounds for a table extent of {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },

    #[error("computed column `{0}` already exists")]
    DuplicateExpression(String),

    #[error("unknown computed column `{0}`")]
    UnknownExpression(String),

    #[error("computed column `{column}` is still referenced by `{dependent}`")]
    DependentExpression { column: String, dependent: String },

    #[error("computed column `{0}` cannot be written directly")]
    ReadOnlyColumn(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl ComputeError {
    pub(crate) fn compile(message: impl Into<String>, formula: &str) -> Self {
        ComputeError::Compile {
            message: message.into(),
            formula: formula.to_string(),
        }
    }

    /// Report a compile error against the formula the user wrote rather than its resolved form.
    pub(crate) fn attribute_to(self, formula: &str) -> Self {
        match self {
            ComputeError::Compile {
                message,
                formula: resolved,
            } if resolved != formula => ComputeError::Compile {
                message: format!("{message} (resolved as `{resolved}`)"),
                formula: formula.to_string(),
            },
            other => other,
        }
    }
}
