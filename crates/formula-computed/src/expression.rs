use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::compiler::{Compiler, SymbolTable};
use crate::compute::ComputeEngine;
use crate::error::{ComputeError, ComputeResult};
use crate::resolver::resolve_columns;
use formula_table::{Schema, ScalarKind};

/// A formula resolved against a schema and typed by a single inference evaluation.
///
/// Immutable once built: a schema change that invalidates it requires building a new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedExpression {
    expression: String,
    parsed_expression: String,
    column_ids: Vec<(String, String)>,
    dtype: ScalarKind,
}

impl ComputedExpression {
    /// The formula as authored. Also the name of the output column.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn parsed_expression(&self) -> &str {
        &self.parsed_expression
    }

    /// `(placeholder, column name)` pairs in order of first reference.
    pub fn column_ids(&self) -> &[(String, String)] {
        &self.column_ids
    }

    pub fn dtype(&self) -> ScalarKind {
        self.dtype
    }

    /// Distinct source columns the formula reads.
    pub fn input_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.column_ids.iter().map(|(_, column)| column.as_str())
    }

    pub fn references(&self, column: &str) -> bool {
        self.input_columns().any(|name| name == column)
    }
}

impl ComputeEngine {
    /// Resolve column references in `formula` and infer its result type.
    pub fn resolve_and_infer(
        &self,
        formula: &str,
        schema: &Schema,
    ) -> ComputeResult<ComputedExpression> {
        let resolved = resolve_columns(formula, schema)?;
        self.precompute(
            &resolved.expression,
            &resolved.parsed_expression,
            resolved.column_ids,
            schema,
        )
    }

    /// Type inference: compile permissively and evaluate once with every placeholder bound to
    /// the zero value of its column's kind. When that evaluation fails, it is retried with every
    /// placeholder bound to a null of its column's kind, so a formula that only fails on zeros
    /// (`date("y", "m", "d")`) still registers.
    pub fn precompute(
        &self,
        expression: &str,
        parsed_expression: &str,
        column_ids: Vec<(String, String)>,
        schema: &Schema,
    ) -> ComputeResult<ComputedExpression> {
        let start = Instant::now();

        if column_ids.iter().any(|(_, column)| column == expression) {
            return Err(ComputeError::compile(
                "expression cannot reference its own output column",
                expression,
            ));
        }

        let mut symbols = SymbolTable::with_capacity(column_ids.len());
        let mut slots = Vec::with_capacity(column_ids.len());
        for (placeholder, column) in &column_ids {
            let kind = schema
                .column_kind(column)
                .ok_or_else(|| ComputeError::Reference {
                    column: column.clone(),
                    formula: expression.to_string(),
                })?;
            slots.push((symbols.add_variable(placeholder.as_str(), kind.default_value()), kind));
        }

        let mut compiled = Compiler::permissive()
            .compile(parsed_expression, symbols)
            .map_err(|e| e.attribute_to(expression))?;
        if !compiled.auto_declared().is_empty() {
            return Err(ComputeError::compile(
                format!(
                    "unknown symbols in expression: {}",
                    compiled.auto_declared().join(", ")
                ),
                expression,
            ));
        }

        let value = match compiled.value() {
            Ok(value) => value,
            Err(on_zeros) => {
                for &(slot, kind) in &slots {
                    compiled.set(slot, kind.null());
                }
                let value = compiled.value().map_err(|_| {
                    ComputeError::compile(format!("type inference failed: {on_zeros}"), expression)
                })?;
                log::debug!("[precompute] `{expression}` inferred from nulls ({on_zeros})");
                value
            }
        };
        let dtype = value.kind();

        if self.options().log_timings {
            log::debug!(
                "[precompute] `{expression}` -> {dtype} in {:?}",
                start.elapsed()
            );
        }

        Ok(ComputedExpression {
            expression: expression.to_string(),
            parsed_expression: parsed_expression.to_string(),
            column_ids,
            dtype,
        })
    }
}
