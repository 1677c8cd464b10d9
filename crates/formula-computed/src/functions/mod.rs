use std::collections::HashMap;
use std::sync::OnceLock;

use formula_table::{Scalar, ScalarKind};

use crate::runtime::{EvalError, EvalResult};

// Built-in functions register themselves with `inventory::submit!`. The compiler resolves calls
// through `lookup_function` once per compile, so evaluation never touches the registry.
mod date_time;
mod logical;
mod math;
mod text;

// On wasm targets the linker may drop a codegen unit that only holds `inventory::submit!`
// registrations. Referencing each module's `__force_link` keeps them alive.
#[cfg(target_arch = "wasm32")]
fn force_link_inventory_modules() {
    let builtins: &[fn()] = &[
        date_time::__force_link,
        logical::__force_link,
        math::__force_link,
        text::__force_link,
    ];
    for f in builtins {
        let f = std::hint::black_box(*f);
        f();
    }
}

/// Upper bound used for variadic functions.
pub const VAR_ARGS: usize = 255;

/// Built-ins receive already-evaluated arguments.
pub type FunctionImpl = fn(&[Scalar]) -> EvalResult;

#[derive(Clone, Copy)]
pub struct FunctionSpec {
    /// Lower-case name; lookup is case-insensitive.
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub implementation: FunctionImpl,
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

impl FunctionSpec {
    pub fn accepts_arity(&self, argc: usize) -> bool {
        (self.min_args..=self.max_args).contains(&argc)
    }
}

inventory::collect!(FunctionSpec);

/// Iterate all [`FunctionSpec`] registrations collected via [`inventory`].
pub fn iter_function_specs() -> impl Iterator<Item = &'static FunctionSpec> {
    inventory::iter::<FunctionSpec>.into_iter()
}

fn registry() -> &'static HashMap<String, &'static FunctionSpec> {
    static REGISTRY: OnceLock<HashMap<String, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        #[cfg(target_arch = "wasm32")]
        force_link_inventory_modules();

        let mut map = HashMap::new();
        for spec in inventory::iter::<FunctionSpec> {
            map.insert(spec.name.to_ascii_lowercase(), spec);
        }
        log::trace!("registered {} built-in functions", map.len());
        map
    })
}

pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(&name.to_ascii_lowercase()).copied()
}

pub(crate) fn type_error(function: &str, expected: &str, got: &Scalar) -> EvalError {
    EvalError::new(format!(
        "{function}() expects {expected}, got {}",
        got.kind()
    ))
}

/// Whether `value` is a null that may stand in for an argument of `kind`.
pub(crate) fn is_null_for(value: &Scalar, kind: ScalarKind) -> bool {
    matches!(value, Scalar::Null(k) if *k == kind || *k == ScalarKind::None)
}

pub(crate) fn is_numeric_null(value: &Scalar) -> bool {
    matches!(value, Scalar::Null(k) if k.is_numeric() || *k == ScalarKind::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let spec = lookup_function("UpPeR").expect("upper is registered");
        assert_eq!(spec.name, "upper");
        assert!(lookup_function("no_such_function").is_none());
    }

    #[test]
    fn registered_names_are_unique_and_lower_case() {
        let mut seen = std::collections::HashSet::new();
        for spec in iter_function_specs() {
            assert_eq!(spec.name, spec.name.to_ascii_lowercase());
            assert!(seen.insert(spec.name), "duplicate registration: {}", spec.name);
            assert!(spec.min_args <= spec.max_args, "{spec:?}");
        }
        assert!(seen.contains("sqrt"));
        assert!(seen.contains("coalesce"));
        assert!(seen.contains("year"));
    }
}
