//! Batch (`materialize`) and incremental (`update`) evaluation of computed expressions.
//!
//! Both passes follow the same shape: bind every placeholder to its source column once, compile
//! the resolved formula strictly, evaluate the requested rows into a buffer, and only then write
//! the buffer into the output column. A failing row therefore leaves the output column exactly as
//! it was before the pass.
use std::sync::Arc;
use std::time::Instant;

use crate::compiler::{CompiledFormula, Compiler, SymbolTable};
use crate::error::{ComputeError, ComputeResult};
use crate::expression::ComputedExpression;
use crate::options::ComputeOptions;
use formula_table::{Column, DataTable, Scalar};

/// One row touched by a table update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChangedRow {
    pub index: usize,
    /// Whether the row existed before the update (an update) or not (an append).
    pub existed: bool,
}

impl ChangedRow {
    pub fn inserted(index: usize) -> Self {
        Self {
            index,
            existed: false,
        }
    }

    pub fn updated(index: usize) -> Self {
        Self {
            index,
            existed: true,
        }
    }
}

/// Entry point for type inference and evaluation passes. Holds no state besides its options;
/// every pass builds its own compiler, symbol table and column bindings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputeEngine {
    options: ComputeOptions,
}

impl ComputeEngine {
    pub fn new(options: ComputeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ComputeOptions {
        &self.options
    }

    /// Evaluate `expression` for every row of `table` and write the output column, creating it
    /// if needed.
    pub fn materialize(
        &self,
        expression: &ComputedExpression,
        table: &mut DataTable,
    ) -> ComputeResult<()> {
        let start = Instant::now();
        let rows = table.row_count();

        let values = {
            let mut pass = EvaluationPass::bind(expression, table, &self.options)?;
            let mut values = Vec::with_capacity(rows);
            for row in 0..rows {
                values.push(pass.evaluate(row)?);
            }
            pass.finish();
            values
        };

        let output = table.add_column(expression.expression(), expression.dtype())?;
        output.reserve(rows);
        for (row, value) in values.into_iter().enumerate() {
            output.set(row, value)?;
        }

        if self.options.log_timings {
            log::debug!(
                "[compute] `{}`: {rows} rows in {:?}",
                expression.expression(),
                start.elapsed()
            );
        }
        Ok(())
    }

    /// Re-evaluate `expression` in `working` for the rows in `changed_rows`, or for every row of
    /// `authoritative` when the list is empty.
    ///
    /// Every column of `working` is grown with nulls to cover the rows written: the authoritative
    /// extent for an empty list, otherwise the highest changed row. Nothing is written unless
    /// every listed row evaluated.
    pub fn update(
        &self,
        expression: &ComputedExpression,
        authoritative: &DataTable,
        working: &mut DataTable,
        changed_rows: &[ChangedRow],
    ) -> ComputeResult<()> {
        let start = Instant::now();
        let extent = authoritative.row_count();
        let limit = extent.max(working.row_count());
        if let Some(bad) = changed_rows.iter().find(|row| row.index >= limit) {
            return Err(ComputeError::RowOutOfBounds {
                row: bad.index,
                rows: limit,
            });
        }

        let results = {
            let mut pass = EvaluationPass::bind(expression, working, &self.options)?;
            let results = if changed_rows.is_empty() {
                (0..extent)
                    .map(|row| pass.evaluate(row).map(|value| (row, value)))
                    .collect::<ComputeResult<Vec<_>>>()?
            } else {
                changed_rows
                    .iter()
                    .map(|changed| {
                        pass.evaluate(changed.index)
                            .map(|value| (changed.index, value))
                    })
                    .collect::<ComputeResult<Vec<_>>>()?
            };
            pass.finish();
            results
        };

        let needed = results.iter().map(|(row, _)| row + 1).max().unwrap_or(0);
        working.ensure_row_count(needed);
        let output = working.add_column(expression.expression(), expression.dtype())?;
        output.reserve(extent.max(needed));
        for (row, value) in results {
            output.set(row, value)?;
        }

        if self.options.log_timings {
            let inserted = changed_rows.iter().filter(|row| !row.existed).count();
            log::debug!(
                "[recompute] `{}`: {} rows ({} changed, {} inserted) in {:?}",
                expression.expression(),
                if changed_rows.is_empty() {
                    extent
                } else {
                    changed_rows.len()
                },
                changed_rows.len() - inserted,
                inserted,
                start.elapsed()
            );
        }
        Ok(())
    }
}

struct ColumnBinding {
    slot: usize,
    column: Arc<Column>,
}

/// Compiled formula plus column bindings, scoped to a single pass.
struct EvaluationPass<'e> {
    expression: &'e ComputedExpression,
    compiled: CompiledFormula,
    bindings: Vec<ColumnBinding>,
    check_type_stability: bool,
    nulled_rows: usize,
}

impl<'e> EvaluationPass<'e> {
    fn bind(
        expression: &'e ComputedExpression,
        table: &DataTable,
        options: &ComputeOptions,
    ) -> ComputeResult<Self> {
        let mut symbols = SymbolTable::with_capacity(expression.column_ids().len());
        let mut columns = Vec::with_capacity(expression.column_ids().len());
        for (placeholder, name) in expression.column_ids() {
            let column = table.column(name).ok_or_else(|| ComputeError::Reference {
                column: name.clone(),
                formula: expression.expression().to_string(),
            })?;
            log::trace!(
                "binding {placeholder} -> \"{name}\" ({}, {} rows)",
                column.kind(),
                column.len()
            );
            let slot = symbols.add_variable(placeholder.as_str(), column.kind().null());
            columns.push(ColumnBinding { slot, column });
        }

        let compiled = Compiler::strict()
            .compile(expression.parsed_expression(), symbols)
            .map_err(|e| e.attribute_to(expression.expression()))?;

        Ok(Self {
            expression,
            compiled,
            bindings: columns,
            check_type_stability: options.check_type_stability,
            nulled_rows: 0,
        })
    }

    fn evaluate(&mut self, row: usize) -> ComputeResult<Scalar> {
        for binding in &self.bindings {
            self.compiled.set(binding.slot, binding.column.get(row));
        }

        let value = self.compiled.value().map_err(|e| ComputeError::Eval {
            row,
            message: e.to_string(),
            formula: self.expression.expression().to_string(),
        })?;

        let dtype = self.expression.dtype();
        if value.is_null() || value.kind() == dtype {
            return Ok(value);
        }
        if self.check_type_stability {
            return Err(ComputeError::TypeInstability {
                formula: self.expression.expression().to_string(),
                row,
                expected: dtype,
                actual: value.kind(),
            });
        }
        self.nulled_rows += 1;
        Ok(Scalar::Null(dtype))
    }

    fn finish(self) {
        if self.nulled_rows > 0 {
            log::warn!(
                "`{}` produced {} value(s) that are not {}; wrote nulls instead",
                self.expression.expression(),
                self.nulled_rows,
                self.expression.dtype()
            );
        }
    }
}
