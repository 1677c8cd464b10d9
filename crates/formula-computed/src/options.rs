use serde::{Deserialize, Serialize};

/// Knobs for compute and recompute passes.
///
/// Deserializes with `#[serde(default)]`, so a host config only needs to mention the fields it
/// overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputeOptions {
    /// Reject a pass when a row evaluates to a non-null value whose kind differs from the
    /// expression's inferred type. When off, such rows are written as nulls and logged.
    pub check_type_stability: bool,
    /// Emit per-pass timings at `debug` level.
    pub log_timings: bool,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            check_type_stability: true,
            log_timings: true,
        }
    }
}
