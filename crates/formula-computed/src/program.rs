use crate::functions::FunctionSpec;
use crate::parser::{BinaryOp, UnaryOp};
use crate::runtime::{apply_binary, apply_unary, EvalError, EvalResult};
use formula_table::Scalar;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    PushConst = 0,
    LoadSlot = 1,
    Neg = 2,
    Not = 3,
    Add = 4,
    Sub = 5,
    Mul = 6,
    Div = 7,
    Mod = 8,
    Pow = 9,
    Eq = 10,
    Ne = 11,
    Lt = 12,
    Le = 13,
    Gt = 14,
    Ge = 15,
    And = 16,
    Or = 17,
    CallFunc = 18,
    /// Unconditional jump to `a`.
    Jump = 19,
    /// Pops the condition and jumps to `a` unless it is `true`. Nulls take the jump.
    JumpUnlessTrue = 20,
    /// Jumps to `a` if the top of the stack is `false`, leaving it in place.
    JumpIfFalse = 21,
    /// Jumps to `a` if the top of the stack is `true`, leaving it in place.
    JumpIfTrue = 22,
}

impl OpCode {
    const ALL: [OpCode; 23] = [
        OpCode::PushConst,
        OpCode::LoadSlot,
        OpCode::Neg,
        OpCode::Not,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Pow,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::And,
        OpCode::Or,
        OpCode::CallFunc,
        OpCode::Jump,
        OpCode::JumpUnlessTrue,
        OpCode::JumpIfFalse,
        OpCode::JumpIfTrue,
    ];

    pub fn binary(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Subtract => OpCode::Sub,
            BinaryOp::Multiply => OpCode::Mul,
            BinaryOp::Divide => OpCode::Div,
            BinaryOp::Modulo => OpCode::Mod,
            BinaryOp::Power => OpCode::Pow,
            BinaryOp::Equals => OpCode::Eq,
            BinaryOp::NotEquals => OpCode::Ne,
            BinaryOp::Less => OpCode::Lt,
            BinaryOp::LessEquals => OpCode::Le,
            BinaryOp::Greater => OpCode::Gt,
            BinaryOp::GreaterEquals => OpCode::Ge,
            BinaryOp::And => OpCode::And,
            BinaryOp::Or => OpCode::Or,
        }
    }

    pub fn unary(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Negate => OpCode::Neg,
            UnaryOp::Not => OpCode::Not,
        }
    }

    fn as_binary(self) -> Option<BinaryOp> {
        Some(match self {
            OpCode::Add => BinaryOp::Add,
            OpCode::Sub => BinaryOp::Subtract,
            OpCode::Mul => BinaryOp::Multiply,
            OpCode::Div => BinaryOp::Divide,
            OpCode::Mod => BinaryOp::Modulo,
            OpCode::Pow => BinaryOp::Power,
            OpCode::Eq => BinaryOp::Equals,
            OpCode::Ne => BinaryOp::NotEquals,
            OpCode::Lt => BinaryOp::Less,
            OpCode::Le => BinaryOp::LessEquals,
            OpCode::Gt => BinaryOp::Greater,
            OpCode::Ge => BinaryOp::GreaterEquals,
            OpCode::And => BinaryOp::And,
            OpCode::Or => BinaryOp::Or,
            _ => return None,
        })
    }
}

/// Packed instruction:
/// - bits 56..63: opcode
/// - bits 28..55: operand a
/// - bits 0..27: operand b
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction(u64);

impl Instruction {
    pub const MAX_OPERAND: u32 = (1 << 28) - 1;

    #[inline]
    pub fn new(op: OpCode, a: u32, b: u32) -> Self {
        debug_assert!(a <= Self::MAX_OPERAND);
        debug_assert!(b <= Self::MAX_OPERAND);
        Instruction(((op as u64) << 56) | ((a as u64) << 28) | (b as u64))
    }

    #[inline]
    pub fn op(self) -> OpCode {
        // Instructions are only built through `new`, so the tag is always in range.
        let tag = ((self.0 >> 56) & 0xFF) as usize;
        OpCode::ALL[tag.min(OpCode::ALL.len() - 1)]
    }

    #[inline]
    pub fn a(self) -> u32 {
        ((self.0 >> 28) & 0x0FFF_FFFF) as u32
    }

    #[inline]
    pub fn b(self) -> u32 {
        (self.0 & 0x0FFF_FFFF) as u32
    }

    /// Rewrite operand `a`, used to patch forward jumps.
    pub(crate) fn with_a(self, a: u32) -> Self {
        Instruction::new(self.op(), a, self.b())
    }
}

/// A compiled formula: flat instruction stream plus its constant and function tables.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub(crate) instrs: Vec<Instruction>,
    pub(crate) consts: Vec<Scalar>,
    pub(crate) funcs: Vec<&'static FunctionSpec>,
}

impl Program {
    pub fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    pub fn consts(&self) -> &[Scalar] {
        &self.consts
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Vm {
    stack: Vec<Scalar>,
}

impl Vm {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn with_capacity(stack: usize) -> Self {
        Self {
            stack: Vec::with_capacity(stack),
        }
    }

    /// Run `program` against the current slot values.
    pub fn eval(&mut self, program: &Program, slots: &[Scalar]) -> EvalResult {
        self.stack.clear();
        let mut pc = 0usize;
        while let Some(inst) = program.instrs.get(pc).copied() {
            pc += 1;
            match inst.op() {
                OpCode::PushConst => {
                    let v = program
                        .consts
                        .get(inst.a() as usize)
                        .cloned()
                        .ok_or_else(|| EvalError::new("constant index out of range"))?;
                    self.stack.push(v);
                }
                OpCode::LoadSlot => {
                    let v = slots
                        .get(inst.a() as usize)
                        .cloned()
                        .ok_or_else(|| EvalError::new("symbol slot out of range"))?;
                    self.stack.push(v);
                }
                OpCode::Neg | OpCode::Not => {
                    let op = if inst.op() == OpCode::Neg {
                        UnaryOp::Negate
                    } else {
                        UnaryOp::Not
                    };
                    let v = self.pop()?;
                    self.stack.push(apply_unary(op, &v)?);
                }
                OpCode::CallFunc => {
                    let spec = program
                        .funcs
                        .get(inst.a() as usize)
                        .copied()
                        .ok_or_else(|| EvalError::new("function index out of range"))?;
                    let argc = inst.b() as usize;
                    let start = self
                        .stack
                        .len()
                        .checked_sub(argc)
                        .ok_or_else(|| EvalError::new("evaluation stack underflow"))?;
                    let result = (spec.implementation)(&self.stack[start..])?;
                    self.stack.truncate(start);
                    self.stack.push(result);
                }
                OpCode::Jump => pc = inst.a() as usize,
                OpCode::JumpUnlessTrue => match self.pop()? {
                    Scalar::Bool(true) => {}
                    Scalar::Bool(false) | Scalar::Null(_) => pc = inst.a() as usize,
                    other => {
                        return Err(EvalError::new(format!(
                            "if() condition must be a boolean, got {}",
                            other.kind()
                        )))
                    }
                },
                OpCode::JumpIfFalse => {
                    if matches!(self.stack.last(), Some(Scalar::Bool(false))) {
                        pc = inst.a() as usize;
                    }
                }
                OpCode::JumpIfTrue => {
                    if matches!(self.stack.last(), Some(Scalar::Bool(true))) {
                        pc = inst.a() as usize;
                    }
                }
                op => {
                    let op = op
                        .as_binary()
                        .ok_or_else(|| EvalError::new(format!("unexpected opcode {op:?}")))?;
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(apply_binary(op, &left, &right)?);
                }
            }
        }
        self.pop()
    }

    fn pop(&mut self) -> EvalResult {
        self.stack
            .pop()
            .ok_or_else(|| EvalError::new("evaluation stack underflow"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_packing_roundtrips_operands() {
        let inst = Instruction::new(OpCode::CallFunc, Instruction::MAX_OPERAND, 3);
        assert_eq!(inst.op(), OpCode::CallFunc);
        assert_eq!(inst.a(), Instruction::MAX_OPERAND);
        assert_eq!(inst.b(), 3);
        assert_eq!(inst.with_a(7).a(), 7);
        assert_eq!(inst.with_a(7).op(), OpCode::CallFunc);
    }

    #[test]
    fn opcode_table_matches_discriminants() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }

    #[test]
    fn evaluates_a_hand_built_program() {
        // slot0 * 2 + 1
        let program = Program {
            instrs: vec![
                Instruction::new(OpCode::LoadSlot, 0, 0),
                Instruction::new(OpCode::PushConst, 0, 0),
                Instruction::new(OpCode::Mul, 0, 0),
                Instruction::new(OpCode::PushConst, 1, 0),
                Instruction::new(OpCode::Add, 0, 0),
            ],
            consts: vec![Scalar::Int(2), Scalar::Int(1)],
            funcs: Vec::new(),
        };
        let mut vm = Vm::new();
        assert_eq!(vm.eval(&program, &[Scalar::Int(20)]).unwrap(), Scalar::Int(41));
        assert!(vm.eval(&Program::default(), &[]).is_err());
    }
}
