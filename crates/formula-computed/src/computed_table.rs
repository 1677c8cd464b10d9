use std::collections::BTreeSet;

use crate::compute::{ChangedRow, ComputeEngine};
use crate::error::{ComputeError, ComputeResult};
use crate::expression::ComputedExpression;
use crate::options::ComputeOptions;
use formula_table::{DataTable, Scalar, TableError};

/// One base-column cell write for [`ComputedTable::update_cells`].
#[derive(Clone, Debug, PartialEq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: String,
    pub value: Scalar,
}

impl CellUpdate {
    pub fn new(row: usize, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            row,
            column: column.into(),
            value: value.into(),
        }
    }
}

/// A [`DataTable`] together with the computed columns registered on it.
///
/// Every mutation is applied to a working copy of the table, then each computed column is
/// recomputed for the touched rows in registration order. The copy replaces the table only when
/// all of that succeeded, so a failed call leaves the table unchanged.
#[derive(Clone, Debug)]
pub struct ComputedTable {
    table: DataTable,
    expressions: Vec<ComputedExpression>,
    engine: ComputeEngine,
}

impl ComputedTable {
    pub fn new(table: DataTable, options: ComputeOptions) -> Self {
        Self {
            table,
            expressions: Vec::new(),
            engine: ComputeEngine::new(options),
        }
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn into_table(self) -> DataTable {
        self.table
    }

    pub fn engine(&self) -> &ComputeEngine {
        &self.engine
    }

    /// Registered expressions in registration order.
    pub fn expressions(&self) -> &[ComputedExpression] {
        &self.expressions
    }

    pub fn expression(&self, formula: &str) -> Option<&ComputedExpression> {
        self.expressions.iter().find(|e| e.expression() == formula)
    }

    pub fn is_computed(&self, column: &str) -> bool {
        self.expression(column).is_some()
    }

    /// Register `formula` and materialize it as a new column.
    pub fn add_computed_column(&mut self, formula: &str) -> ComputeResult<&ComputedExpression> {
        self.check_new_output(formula)?;
        let expression = self.engine.resolve_and_infer(formula, &self.table.schema())?;
        self.attach(expression)
    }

    /// Reattach a previously registered expression (for example one loaded from disk) and
    /// recompute its column in full.
    pub fn restore_computed_column(
        &mut self,
        expression: ComputedExpression,
    ) -> ComputeResult<&ComputedExpression> {
        self.check_new_output(expression.expression())?;
        self.attach(expression)
    }

    /// Drop a computed column. Fails if another computed column reads it.
    pub fn remove_computed_column(&mut self, formula: &str) -> ComputeResult<ComputedExpression> {
        let idx = self
            .expressions
            .iter()
            .position(|e| e.expression() == formula)
            .ok_or_else(|| ComputeError::UnknownExpression(formula.to_string()))?;
        if let Some(dependent) = self.expressions.iter().find(|e| e.references(formula)) {
            return Err(ComputeError::DependentExpression {
                column: formula.to_string(),
                dependent: dependent.expression().to_string(),
            });
        }
        self.table.remove_column(formula);
        Ok(self.expressions.remove(idx))
    }

    /// Append rows of base-column values, in base-column order. Computed cells are derived.
    pub fn append_rows(&mut self, rows: Vec<Vec<Scalar>>) -> ComputeResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut working = self.table.clone();
        let first = working.row_count();
        let layout: Vec<Option<_>> = working
            .column_names()
            .map(|name| self.expression(name).map(ComputedExpression::dtype))
            .collect();
        let base_columns = layout.iter().filter(|slot| slot.is_none()).count();

        for row in rows {
            if row.len() != base_columns {
                return Err(TableError::SchemaMismatch {
                    expected: base_columns,
                    actual: row.len(),
                }
                .into());
            }
            let mut values = row.into_iter();
            let full = layout
                .iter()
                .map(|slot| match slot {
                    Some(dtype) => Scalar::Null(*dtype),
                    None => values.next().unwrap_or_default(),
                })
                .collect();
            working.push_row(full)?;
        }

        let changed: Vec<ChangedRow> = (first..working.row_count())
            .map(ChangedRow::inserted)
            .collect();
        self.recompute_and_commit(working, &changed)
    }

    /// Write base-column cells. Writing past the last row appends rows.
    pub fn update_cells(&mut self, updates: Vec<CellUpdate>) -> ComputeResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut working = self.table.clone();
        let existing_rows = working.row_count();
        let mut touched = BTreeSet::new();
        for update in updates {
            if self.is_computed(&update.column) {
                return Err(ComputeError::ReadOnlyColumn(update.column));
            }
            working.set(&update.column, update.row, update.value)?;
            touched.insert(update.row);
        }

        // Rows skipped over by a write past the end are new as well.
        let mut changed: Vec<ChangedRow> = touched
            .into_iter()
            .filter(|&row| row < existing_rows)
            .map(ChangedRow::updated)
            .collect();
        changed.extend((existing_rows..working.row_count()).map(ChangedRow::inserted));
        self.recompute_and_commit(working, &changed)
    }

    /// Recompute every computed column over the whole table.
    pub fn refresh(&mut self) -> ComputeResult<()> {
        let working = self.table.clone();
        self.recompute_and_commit(working, &[])
    }

    fn check_new_output(&self, formula: &str) -> ComputeResult<()> {
        if self.is_computed(formula) {
            return Err(ComputeError::DuplicateExpression(formula.to_string()));
        }
        if self.table.has_column(formula) {
            return Err(TableError::DuplicateColumn(formula.to_string()).into());
        }
        Ok(())
    }

    fn attach(&mut self, expression: ComputedExpression) -> ComputeResult<&ComputedExpression> {
        // `materialize` writes nothing unless every row evaluated.
        self.engine.materialize(&expression, &mut self.table)?;
        log::debug!(
            "registered computed column `{}` ({})",
            expression.expression(),
            expression.dtype()
        );
        self.expressions.push(expression);
        let idx = self.expressions.len() - 1;
        Ok(&self.expressions[idx])
    }

    fn recompute_and_commit(
        &mut self,
        mut working: DataTable,
        changed: &[ChangedRow],
    ) -> ComputeResult<()> {
        for expression in &self.expressions {
            self.engine
                .update(expression, &self.table, &mut working, changed)?;
        }
        self.table = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_table::{ColumnSchema, ScalarKind};

    fn host() -> ComputedTable {
        let mut table = DataTable::new(vec![
            ColumnSchema::new("a", ScalarKind::Int),
            ColumnSchema::new("b", ScalarKind::Int),
        ])
        .unwrap();
        table.push_row(vec![Scalar::Int(1), Scalar::Int(10)]).unwrap();
        ComputedTable::new(table, ComputeOptions::default())
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut host = host();
        host.add_computed_column(r#""a" + 1"#).unwrap();
        assert_eq!(
            host.add_computed_column(r#""a" + 1"#).unwrap_err(),
            ComputeError::DuplicateExpression(r#""a" + 1"#.into())
        );
        assert_eq!(
            host.add_computed_column("a").unwrap_err(),
            ComputeError::Table(TableError::DuplicateColumn("a".into()))
        );
    }

    #[test]
    fn computed_cells_cannot_be_written() {
        let mut host = host();
        host.add_computed_column(r#""a" + 1"#).unwrap();
        let err = host
            .update_cells(vec![CellUpdate::new(0, r#""a" + 1"#, 5)])
            .unwrap_err();
        assert_eq!(err, ComputeError::ReadOnlyColumn(r#""a" + 1"#.into()));
        assert_eq!(host.table().get("a", 0), Some(Scalar::Int(1)));
    }

    #[test]
    fn refresh_recomputes_everything() {
        let mut host = host();
        host.add_computed_column(r#""a" * "b""#).unwrap();
        host.refresh().unwrap();
        assert_eq!(
            host.table().get(r#""a" * "b""#, 0),
            Some(Scalar::Int(10))
        );
    }
}
