use crate::column::{check_row, Column};
use crate::error::{TableError, TableResult};
use crate::types::{Scalar, ScalarKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ScalarKind,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered column names and kinds, with lookup by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> TableResult<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), idx).is_some() {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column_kind(&self, name: &str) -> Option<ScalarKind> {
        self.position(name).map(|idx| self.columns[idx].kind)
    }
}

/// An in-memory table of equally long columns.
///
/// Columns are held behind `Arc` so a reader can bind a column for the duration of one pass
/// without borrowing the table; writers go through [`DataTable::column_mut`], which copies a
/// column only if such a binding is still alive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<Arc<Column>>,
    column_index: HashMap<String, usize>,
    rows: usize,
}

impl DataTable {
    pub fn new(schema: Vec<ColumnSchema>) -> TableResult<Self> {
        let mut table = Self::default();
        for column in schema {
            if table.column_index.contains_key(&column.name) {
                return Err(TableError::DuplicateColumn(column.name));
            }
            table.insert_column(Column::new(column.name, column.kind));
        }
        Ok(table)
    }

    pub fn from_columns(columns: Vec<Column>) -> TableResult<Self> {
        let mut table = Self::default();
        let rows = columns.first().map(Column::len).unwrap_or(0);
        for column in columns {
            if table.column_index.contains_key(column.name()) {
                return Err(TableError::DuplicateColumn(column.name().to_string()));
            }
            if column.len() != rows {
                return Err(TableError::ColumnLengthMismatch {
                    column: column.name().to_string(),
                    expected: rows,
                    actual: column.len(),
                });
            }
            table.insert_column(column);
        }
        table.rows = rows;
        Ok(table)
    }

    fn insert_column(&mut self, column: Column) {
        self.column_index
            .insert(column.name().to_string(), self.columns.len());
        self.columns.push(Arc::new(column));
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name())
    }

    pub fn schema(&self) -> Schema {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnSchema::new(c.name(), c.kind()))
            .collect();
        Schema {
            columns,
            index: self.column_index.clone(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Shared handle to a column. The handle stays valid even if the table later replaces or
    /// drops the column.
    pub fn column(&self, name: &str) -> Option<Arc<Column>> {
        let idx = *self.column_index.get(name)?;
        Some(Arc::clone(&self.columns[idx]))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        let idx = *self.column_index.get(name)?;
        Some(Arc::make_mut(&mut self.columns[idx]))
    }

    /// Get the named column, creating it (filled with nulls) if it does not exist yet.
    pub fn add_column(&mut self, name: &str, kind: ScalarKind) -> TableResult<&mut Column> {
        if let Some(&idx) = self.column_index.get(name) {
            let existing = self.columns[idx].kind();
            if existing != kind {
                return Err(TableError::ColumnTypeMismatch {
                    column: name.to_string(),
                    expected: existing,
                    actual: kind,
                });
            }
            return Ok(Arc::make_mut(&mut self.columns[idx]));
        }

        let idx = self.columns.len();
        self.insert_column(Column::with_nulls(name, kind, self.rows));
        Ok(Arc::make_mut(&mut self.columns[idx]))
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Arc<Column>> {
        let idx = self.column_index.remove(name)?;
        let removed = self.columns.remove(idx);
        for slot in self.column_index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Append one row. `values` must cover every column in order.
    pub fn push_row(&mut self, values: Vec<Scalar>) -> TableResult<()> {
        if values.len() != self.columns.len() {
            return Err(TableError::SchemaMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        check_row(self.rows)?;
        for (column, value) in self.columns.iter().zip(&values) {
            if !value.is_null() && value.kind() != column.kind() {
                return Err(TableError::ColumnTypeMismatch {
                    column: column.name().to_string(),
                    expected: column.kind(),
                    actual: value.kind(),
                });
            }
        }

        for (column, value) in self.columns.iter_mut().zip(values) {
            Arc::make_mut(column).push(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Grow every column with nulls so the table has at least `rows` rows.
    pub fn ensure_row_count(&mut self, rows: usize) {
        if rows <= self.rows {
            return;
        }
        for column in &mut self.columns {
            Arc::make_mut(column).resize(rows);
        }
        self.rows = rows;
    }

    pub fn get(&self, column: &str, row: usize) -> Option<Scalar> {
        let idx = *self.column_index.get(column)?;
        Some(self.columns[idx].get(row))
    }

    /// Write one cell. Writing past the last row grows the whole table with nulls.
    pub fn set(&mut self, column: &str, row: usize, value: Scalar) -> TableResult<()> {
        let idx = *self
            .column_index
            .get(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        let kind = self.columns[idx].kind();
        if !value.is_null() && value.kind() != kind {
            return Err(TableError::ColumnTypeMismatch {
                column: column.to_string(),
                expected: kind,
                actual: value.kind(),
            });
        }
        check_row(row)?;
        self.ensure_row_count(row + 1);
        Arc::make_mut(&mut self.columns[idx]).set(row, value)
    }
}
