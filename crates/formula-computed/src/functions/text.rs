use std::sync::Arc;

use formula_table::{Scalar, ScalarKind};

use super::{is_null_for, type_error, FunctionSpec, VAR_ARGS};
use crate::runtime::EvalResult;

fn map_str(name: &str, value: &Scalar, kind: ScalarKind, f: impl FnOnce(&str) -> Scalar) -> EvalResult {
    if is_null_for(value, ScalarKind::Str) {
        return Ok(Scalar::Null(kind));
    }
    value
        .as_str()
        .map(f)
        .ok_or_else(|| type_error(name, "a string", value))
}

inventory::submit! {
    FunctionSpec {
        name: "upper",
        min_args: 1,
        max_args: 1,
        implementation: upper_fn,
    }
}

fn upper_fn(args: &[Scalar]) -> EvalResult {
    map_str("upper", &args[0], ScalarKind::Str, |s| Scalar::from(s.to_uppercase()))
}

inventory::submit! {
    FunctionSpec {
        name: "lower",
        min_args: 1,
        max_args: 1,
        implementation: lower_fn,
    }
}

fn lower_fn(args: &[Scalar]) -> EvalResult {
    map_str("lower", &args[0], ScalarKind::Str, |s| Scalar::from(s.to_lowercase()))
}

inventory::submit! {
    FunctionSpec {
        name: "trim",
        min_args: 1,
        max_args: 1,
        implementation: trim_fn,
    }
}

fn trim_fn(args: &[Scalar]) -> EvalResult {
    map_str("trim", &args[0], ScalarKind::Str, |s| Scalar::from(s.trim()))
}

inventory::submit! {
    FunctionSpec {
        name: "length",
        min_args: 1,
        max_args: 1,
        implementation: length_fn,
    }
}

/// Length in characters, not bytes.
fn length_fn(args: &[Scalar]) -> EvalResult {
    map_str("length", &args[0], ScalarKind::Int, |s| {
        Scalar::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))
    })
}

inventory::submit! {
    FunctionSpec {
        name: "contains",
        min_args: 2,
        max_args: 2,
        implementation: contains_fn,
    }
}

fn contains_fn(args: &[Scalar]) -> EvalResult {
    if is_null_for(&args[0], ScalarKind::Str) || is_null_for(&args[1], ScalarKind::Str) {
        return Ok(Scalar::Null(ScalarKind::Bool));
    }
    match (args[0].as_str(), args[1].as_str()) {
        (Some(haystack), Some(needle)) => Ok(Scalar::Bool(haystack.contains(needle))),
        (None, _) => Err(type_error("contains", "a string", &args[0])),
        (_, None) => Err(type_error("contains", "a string", &args[1])),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "concat",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: concat_fn,
    }
}

/// Formats every non-null argument and joins them. Nulls are skipped, so the result is never null.
fn concat_fn(args: &[Scalar]) -> EvalResult {
    let mut out = String::new();
    for arg in args.iter().filter(|arg| !arg.is_null()) {
        match arg {
            Scalar::Str(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
    }
    Ok(Scalar::Str(Arc::from(out)))
}

#[allow(dead_code)]
pub(super) fn __force_link() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_trim() {
        assert_eq!(upper_fn(&[Scalar::from("abc")]).unwrap(), Scalar::from("ABC"));
        assert_eq!(lower_fn(&[Scalar::from("ÀB")]).unwrap(), Scalar::from("àb"));
        assert_eq!(trim_fn(&[Scalar::from("  x ")]).unwrap(), Scalar::from("x"));
        assert_eq!(
            upper_fn(&[Scalar::NONE]).unwrap(),
            Scalar::Null(ScalarKind::Str)
        );
        assert!(upper_fn(&[Scalar::Int(1)]).is_err());
    }

    #[test]
    fn length_counts_characters() {
        assert_eq!(length_fn(&[Scalar::from("héllo")]).unwrap(), Scalar::Int(5));
        assert_eq!(
            length_fn(&[Scalar::Null(ScalarKind::Str)]).unwrap(),
            Scalar::Null(ScalarKind::Int)
        );
    }

    #[test]
    fn concat_skips_nulls() {
        let out = concat_fn(&[
            Scalar::from("a"),
            Scalar::Int(1),
            Scalar::Null(ScalarKind::Str),
            Scalar::Bool(true),
        ])
        .unwrap();
        assert_eq!(out, Scalar::from("a1true"));
    }

    #[test]
    fn contains_substring() {
        assert_eq!(
            contains_fn(&[Scalar::from("hello"), Scalar::from("ell")]).unwrap(),
            Scalar::Bool(true)
        );
        assert_eq!(
            contains_fn(&[Scalar::NONE, Scalar::from("x")]).unwrap(),
            Scalar::Null(ScalarKind::Bool)
        );
    }
}
