#![forbid(unsafe_code)]

//! Computed columns for [`formula_table`] tables.
//!
//! A formula such as `"price" * "quantity"` goes through four stages:
//!
//! 1. [`resolve_columns`] rewrites quoted column references into placeholder identifiers.
//! 2. [`ComputeEngine::precompute`] compiles the result permissively and evaluates it once on
//!    zero values to infer its result kind, producing a [`ComputedExpression`].
//! 3. [`ComputeEngine::materialize`] evaluates every row and writes the output column.
//! 4. [`ComputeEngine::update`] re-evaluates only the rows named by a list of [`ChangedRow`]s.
//!
//! [`ComputedTable`] wires these together for a table that owns its computed columns.

mod compiler;
mod compute;
mod computed_table;
mod error;
mod expression;
mod functions;
mod options;
mod parser;
mod program;
mod resolver;
mod runtime;

pub use compiler::{CompileMode, CompiledFormula, Compiler, SymbolTable};
pub use compute::{ChangedRow, ComputeEngine};
pub use computed_table::{CellUpdate, ComputedTable};
pub use error::{ComputeError, ComputeResult};
pub use expression::ComputedExpression;
pub use functions::{iter_function_specs, lookup_function, FunctionSpec, VAR_ARGS};
pub use options::ComputeOptions;
pub use parser::{
    is_reserved_word, parse, BinaryOp, Expr, ParseError, UnaryOp, MAX_NESTING_DEPTH, RESERVED_WORDS,
};
pub use program::{Instruction, OpCode, Program, Vm};
pub use resolver::{is_placeholder, placeholder, resolve_columns, ResolvedFormula, PLACEHOLDER_PREFIX};
pub use runtime::{apply_binary, apply_unary, binary_result_kind, compare_scalars, EvalError, EvalResult};
