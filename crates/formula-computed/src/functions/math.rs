use std::cmp::Ordering;

use formula_table::{Scalar, ScalarKind};

use super::{is_numeric_null, type_error, FunctionSpec, VAR_ARGS};
use crate::runtime::{EvalError, EvalResult};

macro_rules! float_fn {
    ($name:literal, $func:ident, $op:expr) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: 1,
                max_args: 1,
                implementation: $func,
            }
        }

        fn $func(args: &[Scalar]) -> EvalResult {
            unary_float($name, &args[0], $op)
        }
    };
}

float_fn!("sqrt", sqrt_fn, f64::sqrt);
float_fn!("exp", exp_fn, f64::exp);
float_fn!("ln", ln_fn, f64::ln);
float_fn!("log10", log10_fn, f64::log10);

fn unary_float(name: &str, value: &Scalar, op: fn(f64) -> f64) -> EvalResult {
    if is_numeric_null(value) {
        return Ok(Scalar::Null(ScalarKind::Float));
    }
    value
        .as_f64()
        .map(|v| Scalar::Float(op(v)))
        .ok_or_else(|| type_error(name, "a number", value))
}

/// Int stays Int, Float stays Float.
fn same_kind(
    name: &str,
    value: &Scalar,
    int_op: fn(i64) -> i64,
    float_op: fn(f64) -> f64,
) -> EvalResult {
    match value {
        Scalar::Int(v) => Ok(Scalar::Int(int_op(*v))),
        Scalar::Float(v) => Ok(Scalar::Float(float_op(*v))),
        v if is_numeric_null(v) => Ok(v.clone()),
        v => Err(type_error(name, "a number", v)),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "abs",
        min_args: 1,
        max_args: 1,
        implementation: abs_fn,
    }
}

fn abs_fn(args: &[Scalar]) -> EvalResult {
    same_kind("abs", &args[0], i64::wrapping_abs, f64::abs)
}

inventory::submit! {
    FunctionSpec {
        name: "floor",
        min_args: 1,
        max_args: 1,
        implementation: floor_fn,
    }
}

fn floor_fn(args: &[Scalar]) -> EvalResult {
    same_kind("floor", &args[0], |v| v, f64::floor)
}

inventory::submit! {
    FunctionSpec {
        name: "ceil",
        min_args: 1,
        max_args: 1,
        implementation: ceil_fn,
    }
}

fn ceil_fn(args: &[Scalar]) -> EvalResult {
    same_kind("ceil", &args[0], |v| v, f64::ceil)
}

inventory::submit! {
    FunctionSpec {
        name: "round",
        min_args: 1,
        max_args: 2,
        implementation: round_fn,
    }
}

/// `round(x)` keeps the kind of `x`; `round(x, digits)` always yields a float.
fn round_fn(args: &[Scalar]) -> EvalResult {
    let Some(digits) = args.get(1) else {
        return same_kind("round", &args[0], |v| v, f64::round);
    };
    if is_numeric_null(&args[0]) || is_numeric_null(digits) {
        return Ok(Scalar::Null(ScalarKind::Float));
    }
    let value = args[0]
        .as_f64()
        .ok_or_else(|| type_error("round", "a number", &args[0]))?;
    let digits = digits
        .as_i64()
        .ok_or_else(|| type_error("round", "an integer digit count", digits))?;
    let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or_default();
    let scale = 10f64.powi(digits);
    Ok(Scalar::Float((value * scale).round() / scale))
}

inventory::submit! {
    FunctionSpec {
        name: "pow",
        min_args: 2,
        max_args: 2,
        implementation: pow_fn,
    }
}

fn pow_fn(args: &[Scalar]) -> EvalResult {
    if args.iter().any(is_numeric_null) {
        return Ok(Scalar::Null(ScalarKind::Float));
    }
    match (args[0].as_f64(), args[1].as_f64()) {
        (Some(base), Some(exp)) => Ok(Scalar::Float(base.powf(exp))),
        (None, _) => Err(type_error("pow", "a number", &args[0])),
        (_, None) => Err(type_error("pow", "a number", &args[1])),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "min",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: min_fn,
    }
}

fn min_fn(args: &[Scalar]) -> EvalResult {
    extremum("min", args, Ordering::Less)
}

inventory::submit! {
    FunctionSpec {
        name: "max",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: max_fn,
    }
}

fn max_fn(args: &[Scalar]) -> EvalResult {
    extremum("max", args, Ordering::Greater)
}

/// Integer when every argument is an integer, float otherwise. Any null argument makes the
/// result null.
fn extremum(name: &str, args: &[Scalar], wanted: Ordering) -> EvalResult {
    let mut all_int = true;
    for arg in args {
        match arg {
            Scalar::Int(_) | Scalar::Null(ScalarKind::Int | ScalarKind::None) => {}
            Scalar::Float(_) | Scalar::Null(ScalarKind::Float) => all_int = false,
            other => return Err(type_error(name, "numbers", other)),
        }
    }
    let kind = if all_int {
        ScalarKind::Int
    } else {
        ScalarKind::Float
    };
    if args.iter().any(Scalar::is_null) {
        return Ok(Scalar::Null(kind));
    }

    let best = if all_int {
        args.iter()
            .filter_map(Scalar::as_i64)
            .reduce(|best, v| if v.cmp(&best) == wanted { v } else { best })
            .map(Scalar::Int)
    } else {
        args.iter()
            .filter_map(Scalar::as_f64)
            .reduce(|best, v| {
                if v.partial_cmp(&best) == Some(wanted) {
                    v
                } else {
                    best
                }
            })
            .map(Scalar::Float)
    };
    best.ok_or_else(|| EvalError::new(format!("{name}() needs at least one argument")))
}

#[allow(dead_code)]
pub(super) fn __force_link() {}
