//! Lowers parsed formulas to [`Program`]s bound to a [`SymbolTable`].
//!
//! A [`Compiler`] runs in one of two modes. The strict compiler is used for compute passes and
//! rejects any identifier the symbol table does not declare. The permissive compiler is used for
//! validation and type inference: unknown identifiers are declared on the fly as untyped
//! ([`Scalar::NONE`]) symbols and reported through [`CompiledFormula::auto_declared`], so callers
//! can decide what to do with them instead of failing on the first one.
use std::collections::HashMap;

use crate::error::{ComputeError, ComputeResult};
use crate::functions::lookup_function;
use crate::parser::{self, BinaryOp, Expr};
use crate::program::{Instruction, OpCode, Program, Vm};
use crate::runtime::EvalResult;
use formula_table::Scalar;

/// Parsed trees stay well below this; it bounds hand-built trees passed to
/// [`Compiler::compile_expr`].
const MAX_TREE_DEPTH: usize = 4 * parser::MAX_NESTING_DEPTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileMode {
    Permissive,
    Strict,
}

/// Named variables a formula can read. Each variable owns a slot whose value can be overwritten
/// between evaluations without recompiling.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    values: Vec<Scalar>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Declare `name` with an initial value and return its slot. Re-declaring a name overwrites
    /// its value and keeps the slot.
    pub fn add_variable(&mut self, name: impl Into<String>, value: Scalar) -> usize {
        let name = name.into();
        if let Some(&slot) = self.index.get(&name) {
            self.values[slot] = value;
            return slot;
        }
        let slot = self.names.len();
        self.index.insert(name.clone(), slot);
        self.names.push(name);
        self.values.push(value);
        slot
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, slot: usize) -> Option<&Scalar> {
        self.values.get(slot)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Compiler {
    mode: CompileMode,
}

impl Compiler {
    pub fn new(mode: CompileMode) -> Self {
        Self { mode }
    }

    pub fn permissive() -> Self {
        Self::new(CompileMode::Permissive)
    }

    pub fn strict() -> Self {
        Self::new(CompileMode::Strict)
    }

    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Parse and compile `formula` against `symbols`.
    pub fn compile(&self, formula: &str, symbols: SymbolTable) -> ComputeResult<CompiledFormula> {
        let expr = parser::parse(formula).map_err(|e| ComputeError::compile(e.to_string(), formula))?;
        self.compile_expr(formula, &expr, symbols)
    }

    /// Compile an already parsed expression. `formula` is only used in error messages.
    pub fn compile_expr(
        &self,
        formula: &str,
        expr: &Expr,
        symbols: SymbolTable,
    ) -> ComputeResult<CompiledFormula> {
        let mut lowering = Lowering {
            mode: self.mode,
            formula,
            program: Program::default(),
            symbols,
            auto_declared: Vec::new(),
            depth: 0,
        };
        lowering.expr(expr)?;
        let Lowering {
            program,
            symbols,
            auto_declared,
            ..
        } = lowering;

        if !auto_declared.is_empty() {
            log::debug!(
                "auto-declared {} unknown symbol(s) in `{formula}`: {}",
                auto_declared.len(),
                auto_declared.join(", ")
            );
        }

        Ok(CompiledFormula {
            formula: formula.to_string(),
            program,
            symbols,
            auto_declared,
            vm: Vm::with_capacity(8),
        })
    }
}

struct Lowering<'f> {
    mode: CompileMode,
    formula: &'f str,
    program: Program,
    symbols: SymbolTable,
    auto_declared: Vec<String>,
    depth: usize,
}

impl Lowering<'_> {
    fn error(&self, message: impl Into<String>) -> ComputeError {
        ComputeError::compile(message, self.formula)
    }

    fn operand(&self, index: usize, what: &str) -> ComputeResult<u32> {
        u32::try_from(index)
            .ok()
            .filter(|&v| v <= Instruction::MAX_OPERAND)
            .ok_or_else(|| self.error(format!("expression has too many {what}")))
    }

    fn emit(&mut self, op: OpCode, a: u32, b: u32) -> usize {
        self.program.instrs.push(Instruction::new(op, a, b));
        self.program.instrs.len() - 1
    }

    /// Point the jump at `at` to the next instruction to be emitted.
    fn patch(&mut self, at: usize) -> ComputeResult<()> {
        let target = self.operand(self.program.instrs.len(), "instructions")?;
        if let Some(inst) = self.program.instrs.get_mut(at) {
            *inst = inst.with_a(target);
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> ComputeResult<()> {
        if self.depth >= MAX_TREE_DEPTH {
            return Err(self.error("expression is nested too deeply"));
        }
        self.depth += 1;
        let lowered = self.lower(expr);
        self.depth -= 1;
        lowered
    }

    fn lower(&mut self, expr: &Expr) -> ComputeResult<()> {
        match expr {
            Expr::Literal(value) => {
                let idx = self.operand(self.program.consts.len(), "constants")?;
                self.program.consts.push(value.clone());
                self.emit(OpCode::PushConst, idx, 0);
            }
            Expr::Identifier(name) => {
                let slot = match self.symbols.slot(name) {
                    Some(slot) => slot,
                    None if self.mode == CompileMode::Permissive => {
                        self.auto_declared.push(name.clone());
                        self.symbols.add_variable(name.as_str(), Scalar::NONE)
                    }
                    None => {
                        return Err(self.error(format!("unknown symbol in expression: {name}")))
                    }
                };
                let slot = self.operand(slot, "symbols")?;
                self.emit(OpCode::LoadSlot, slot, 0);
            }
            Expr::Call { name, args } if name.eq_ignore_ascii_case("if") => {
                let [cond, then, otherwise] = args.as_slice() else {
                    return Err(self.error(format!(
                        "if() takes exactly 3 arguments, got {}",
                        args.len()
                    )));
                };
                self.expr(cond)?;
                let to_else = self.emit(OpCode::JumpUnlessTrue, 0, 0);
                self.expr(then)?;
                let to_end = self.emit(OpCode::Jump, 0, 0);
                self.patch(to_else)?;
                self.expr(otherwise)?;
                self.patch(to_end)?;
            }
            Expr::Call { name, args } => {
                let spec = lookup_function(name)
                    .ok_or_else(|| self.error(format!("unknown function: {name}")))?;
                if !spec.accepts_arity(args.len()) {
                    let expected = if spec.min_args == spec.max_args {
                        spec.min_args.to_string()
                    } else {
                        format!("{} to {}", spec.min_args, spec.max_args)
                    };
                    return Err(self.error(format!(
                        "{}() takes {expected} argument(s), got {}",
                        spec.name,
                        args.len()
                    )));
                }
                for arg in args {
                    self.expr(arg)?;
                }
                let func = self.operand(self.program.funcs.len(), "function calls")?;
                let argc = self.operand(args.len(), "arguments")?;
                self.program.funcs.push(spec);
                self.emit(OpCode::CallFunc, func, argc);
            }
            Expr::UnaryOp { op, expr } => {
                self.expr(expr)?;
                self.emit(OpCode::unary(*op), 0, 0);
            }
            Expr::BinaryOp { op, left, right } => {
                // `and`/`or` skip the right operand once the left one decides the result.
                let short_circuit = match op {
                    BinaryOp::And => Some(OpCode::JumpIfFalse),
                    BinaryOp::Or => Some(OpCode::JumpIfTrue),
                    _ => None,
                };
                self.expr(left)?;
                let skip = short_circuit.map(|jump| self.emit(jump, 0, 0));
                self.expr(right)?;
                self.emit(OpCode::binary(*op), 0, 0);
                if let Some(skip) = skip {
                    self.patch(skip)?;
                }
            }
        }
        Ok(())
    }
}

/// A formula compiled against its own copy of a [`SymbolTable`].
///
/// Evaluation reads the current slot values; [`CompiledFormula::set`] rebinds a slot between
/// evaluations.
#[derive(Clone, Debug)]
pub struct CompiledFormula {
    formula: String,
    program: Program,
    symbols: SymbolTable,
    auto_declared: Vec<String>,
    vm: Vm,
}

impl CompiledFormula {
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Identifiers the permissive compiler declared because the symbol table lacked them.
    pub fn auto_declared(&self) -> &[String] {
        &self.auto_declared
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.symbols.slot(name)
    }

    /// Overwrite the value bound to `slot`. Slots come from [`CompiledFormula::slot`]; an unknown
    /// slot is ignored.
    pub fn set(&mut self, slot: usize, value: Scalar) {
        debug_assert!(slot < self.symbols.values.len(), "slot {slot} out of range");
        if let Some(current) = self.symbols.values.get_mut(slot) {
            *current = value;
        }
    }

    pub fn value(&mut self) -> EvalResult {
        self.vm.eval(&self.program, &self.symbols.values)
    }
}
