use formula_table::{Scalar, ScalarKind};

use super::{FunctionSpec, VAR_ARGS};
use crate::runtime::{EvalError, EvalResult};

inventory::submit! {
    FunctionSpec {
        name: "is_null",
        min_args: 1,
        max_args: 1,
        implementation: is_null_fn,
    }
}

fn is_null_fn(args: &[Scalar]) -> EvalResult {
    Ok(Scalar::Bool(args[0].is_null()))
}

inventory::submit! {
    FunctionSpec {
        name: "coalesce",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: coalesce_fn,
    }
}

/// First non-null argument. When every argument is null the last one is returned, so the result
/// keeps a kind.
fn coalesce_fn(args: &[Scalar]) -> EvalResult {
    let mut kind = ScalarKind::None;
    for arg in args {
        let arg_kind = arg.kind();
        if arg_kind != ScalarKind::None && kind != ScalarKind::None && arg_kind != kind {
            return Err(EvalError::new(format!(
                "coalesce() arguments must share a kind, got {kind} and {arg_kind}"
            )));
        }
        if arg_kind != ScalarKind::None {
            kind = arg_kind;
        }
    }
    Ok(args
        .iter()
        .find(|arg| !arg.is_null())
        .cloned()
        .unwrap_or(Scalar::Null(kind)))
}

inventory::submit! {
    FunctionSpec {
        name: "to_float",
        min_args: 1,
        max_args: 1,
        implementation: to_float_fn,
    }
}

/// Strings that do not parse become null.
fn to_float_fn(args: &[Scalar]) -> EvalResult {
    let value = match &args[0] {
        Scalar::Null(_) => None,
        Scalar::Int(v) => Some(*v as f64),
        Scalar::Float(v) => Some(*v),
        Scalar::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        Scalar::Str(s) => s.trim().parse::<f64>().ok(),
        Scalar::DateTime(ms) => Some(*ms as f64),
    };
    Ok(value.map_or(Scalar::Null(ScalarKind::Float), Scalar::Float))
}

inventory::submit! {
    FunctionSpec {
        name: "to_integer",
        min_args: 1,
        max_args: 1,
        implementation: to_integer_fn,
    }
}

/// Floats truncate toward zero; non-finite floats and unparseable strings become null.
fn to_integer_fn(args: &[Scalar]) -> EvalResult {
    let value = match &args[0] {
        Scalar::Null(_) => None,
        Scalar::Int(v) => Some(*v),
        Scalar::Float(v) if v.is_finite() => Some(v.trunc() as i64),
        Scalar::Float(_) => None,
        Scalar::Bool(v) => Some(i64::from(*v)),
        Scalar::Str(s) => s.trim().parse::<i64>().ok(),
        Scalar::DateTime(ms) => Some(*ms),
    };
    Ok(value.map_or(Scalar::Null(ScalarKind::Int), Scalar::Int))
}

inventory::submit! {
    FunctionSpec {
        name: "to_string",
        min_args: 1,
        max_args: 1,
        implementation: to_string_fn,
    }
}

fn to_string_fn(args: &[Scalar]) -> EvalResult {
    Ok(match &args[0] {
        Scalar::Null(_) => Scalar::Null(ScalarKind::Str),
        Scalar::Str(s) => Scalar::Str(s.clone()),
        other => Scalar::from(other.to_string()),
    })
}

#[allow(dead_code)]
pub(super) fn __force_link() {}
