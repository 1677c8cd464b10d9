//! Operator semantics shared by the VM and the built-in functions.
//!
//! Every operator has a result kind that depends only on its operand kinds, so a null operand
//! yields `Null(result_kind)` rather than an untyped missing value. This keeps a formula's
//! inferred type stable across rows that contain nulls.
use crate::parser::{BinaryOp, UnaryOp};
use formula_table::{Scalar, ScalarKind};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type EvalResult = Result<Scalar, EvalError>;

pub(crate) fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Power => "^",
        BinaryOp::Equals => "==",
        BinaryOp::NotEquals => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEquals => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEquals => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

/// Result kind of `left op right`, or an error when the operator does not apply.
pub fn binary_result_kind(
    op: BinaryOp,
    left: ScalarKind,
    right: ScalarKind,
) -> Result<ScalarKind, EvalError> {
    use ScalarKind::*;

    let numeric_or_none = |k: ScalarKind| k.is_numeric() || k == None;
    let kind = match op {
        BinaryOp::Add => match (left, right) {
            (Int, Int) => Some(Int),
            (Str, Str) | (Str, None) | (None, Str) => Some(Str),
            (DateTime, Int) | (Int, DateTime) | (DateTime, None) | (None, DateTime) => {
                Some(DateTime)
            }
            (l, r) if l.is_numeric() && r.is_numeric() => Some(Float),
            (None, k) | (k, None) if numeric_or_none(k) => Some(k),
            _ => Option::None,
        },
        BinaryOp::Subtract => match (left, right) {
            (Int, Int) => Some(Int),
            (DateTime, DateTime) => Some(Int),
            (DateTime, Int) | (DateTime, None) => Some(DateTime),
            (l, r) if l.is_numeric() && r.is_numeric() => Some(Float),
            (None, k) | (k, None) if numeric_or_none(k) => Some(k),
            _ => Option::None,
        },
        BinaryOp::Multiply => match (left, right) {
            (Int, Int) => Some(Int),
            (l, r) if l.is_numeric() && r.is_numeric() => Some(Float),
            (None, k) | (k, None) if numeric_or_none(k) => Some(k),
            _ => Option::None,
        },
        BinaryOp::Divide | BinaryOp::Modulo | BinaryOp::Power => {
            (numeric_or_none(left) && numeric_or_none(right)).then_some(Float)
        }
        BinaryOp::Equals | BinaryOp::NotEquals => Some(Bool),
        BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals => {
            let comparable = left == None
                || right == None
                || left == right
                || (left.is_numeric() && right.is_numeric());
            comparable.then_some(Bool)
        }
        BinaryOp::And | BinaryOp::Or => {
            let logical = |k: ScalarKind| k == Bool || k == None;
            (logical(left) && logical(right)).then_some(Bool)
        }
    };

    kind.ok_or_else(|| {
        EvalError::new(format!(
            "operator `{}` does not apply to {left} and {right}",
            op_symbol(op)
        ))
    })
}

pub fn apply_unary(op: UnaryOp, value: &Scalar) -> Result<Scalar, EvalError> {
    match (op, value) {
        (UnaryOp::Negate, Scalar::Int(v)) => Ok(Scalar::Int(v.wrapping_neg())),
        (UnaryOp::Negate, Scalar::Float(v)) => Ok(Scalar::Float(-v)),
        (UnaryOp::Negate, Scalar::Null(kind)) if kind.is_numeric() || *kind == ScalarKind::None => {
            Ok(Scalar::Null(*kind))
        }
        (UnaryOp::Not, Scalar::Bool(v)) => Ok(Scalar::Bool(!v)),
        (UnaryOp::Not, Scalar::Null(ScalarKind::Bool | ScalarKind::None)) => {
            Ok(Scalar::Null(ScalarKind::Bool))
        }
        (UnaryOp::Negate, other) => Err(EvalError::new(format!(
            "cannot negate a {} value",
            other.kind()
        ))),
        (UnaryOp::Not, other) => Err(EvalError::new(format!(
            "`not` requires a boolean, got {}",
            other.kind()
        ))),
    }
}

pub fn apply_binary(op: BinaryOp, left: &Scalar, right: &Scalar) -> Result<Scalar, EvalError> {
    let kind = binary_result_kind(op, left.kind(), right.kind())?;

    // Three-valued logic: a definite `false` (for `and`) or `true` (for `or`) wins over null.
    match op {
        BinaryOp::And => {
            if matches!(left, Scalar::Bool(false)) || matches!(right, Scalar::Bool(false)) {
                return Ok(Scalar::Bool(false));
            }
        }
        BinaryOp::Or => {
            if matches!(left, Scalar::Bool(true)) || matches!(right, Scalar::Bool(true)) {
                return Ok(Scalar::Bool(true));
            }
        }
        _ => {}
    }

    if left.is_null() || right.is_null() {
        return Ok(Scalar::Null(kind));
    }

    let value = match op {
        BinaryOp::Add => match (left, right) {
            (Scalar::Int(a), Scalar::Int(b)) => Scalar::Int(a.wrapping_add(*b)),
            (Scalar::Str(a), Scalar::Str(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Scalar::Str(Arc::from(joined))
            }
            (Scalar::DateTime(t), Scalar::Int(ms)) | (Scalar::Int(ms), Scalar::DateTime(t)) => {
                Scalar::DateTime(t.wrapping_add(*ms))
            }
            _ => float_op(left, right, |a, b| a + b)?,
        },
        BinaryOp::Subtract => match (left, right) {
            (Scalar::Int(a), Scalar::Int(b)) => Scalar::Int(a.wrapping_sub(*b)),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => Scalar::Int(a.wrapping_sub(*b)),
            (Scalar::DateTime(t), Scalar::Int(ms)) => Scalar::DateTime(t.wrapping_sub(*ms)),
            _ => float_op(left, right, |a, b| a - b)?,
        },
        BinaryOp::Multiply => match (left, right) {
            (Scalar::Int(a), Scalar::Int(b)) => Scalar::Int(a.wrapping_mul(*b)),
            _ => float_op(left, right, |a, b| a * b)?,
        },
        BinaryOp::Divide => float_op(left, right, |a, b| a / b)?,
        BinaryOp::Modulo => float_op(left, right, |a, b| a % b)?,
        BinaryOp::Power => float_op(left, right, f64::powf)?,
        BinaryOp::Equals => Scalar::Bool(scalars_equal(left, right)),
        BinaryOp::NotEquals => Scalar::Bool(!scalars_equal(left, right)),
        BinaryOp::Less => Scalar::Bool(compare_scalars(left, right) == Some(Ordering::Less)),
        BinaryOp::LessEquals => Scalar::Bool(matches!(
            compare_scalars(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Greater => {
            Scalar::Bool(compare_scalars(left, right) == Some(Ordering::Greater))
        }
        BinaryOp::GreaterEquals => Scalar::Bool(matches!(
            compare_scalars(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        // Both operands are non-null and neither is a deciding value.
        BinaryOp::And => Scalar::Bool(true),
        BinaryOp::Or => Scalar::Bool(false),
    };
    debug_assert_eq!(value.kind(), kind, "{op:?} produced an unexpected kind");
    Ok(value)
}

fn float_op(left: &Scalar, right: &Scalar, f: impl FnOnce(f64, f64) -> f64) -> EvalResult {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(Scalar::Float(f(a, b))),
        _ => Err(EvalError::new(format!(
            "expected numbers, got {} and {}",
            left.kind(),
            right.kind()
        ))),
    }
}

/// Ordering between two non-null scalars of comparable kinds. Int and Float compare numerically.
pub fn compare_scalars(left: &Scalar, right: &Scalar) -> Option<Ordering> {
    match (left, right) {
        (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
        (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
        (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
        (Scalar::DateTime(a), Scalar::DateTime(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

fn scalars_equal(left: &Scalar, right: &Scalar) -> bool {
    compare_scalars(left, right) == Some(Ordering::Equal)
}
