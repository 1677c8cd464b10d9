use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The primitive kind of a [`Scalar`] and the storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// The untyped "missing" kind. Columns of this kind only ever hold nulls.
    None,
    Int,
    Float,
    Bool,
    Str,
    DateTime,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 6] = [
        ScalarKind::None,
        ScalarKind::Int,
        ScalarKind::Float,
        ScalarKind::Bool,
        ScalarKind::Str,
        ScalarKind::DateTime,
    ];

    /// The zero value of this kind, used as a representative input during type inference.
    pub fn default_value(self) -> Scalar {
        match self {
            ScalarKind::None => Scalar::NONE,
            ScalarKind::Int => Scalar::Int(0),
            ScalarKind::Float => Scalar::Float(0.0),
            ScalarKind::Bool => Scalar::Bool(false),
            ScalarKind::Str => Scalar::Str(Arc::from("")),
            ScalarKind::DateTime => Scalar::DateTime(0),
        }
    }

    /// A missing value that still reports this kind.
    pub fn null(self) -> Scalar {
        Scalar::Null(self)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::None => "none",
            ScalarKind::Int => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "boolean",
            ScalarKind::Str => "string",
            ScalarKind::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single self-describing value read from or written to a column.
///
/// Missing values keep their kind (`Null(ScalarKind::Int)` is an integer cell without a value),
/// which lets evaluation propagate nulls without losing the static result type.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null(ScalarKind),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    /// Milliseconds since the Unix epoch (UTC).
    DateTime(i64),
}

impl Scalar {
    /// The untyped missing value.
    pub const NONE: Scalar = Scalar::Null(ScalarKind::None);

    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Null(kind) => *kind,
            Scalar::Int(_) => ScalarKind::Int,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Str(_) => ScalarKind::Str,
            Scalar::DateTime(_) => ScalarKind::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::NONE
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null(_) => f.write_str("null"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Str(v) => f.write_str(v),
            Scalar::DateTime(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
                None => write!(f, "datetime({ms})"),
            },
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(Arc::from(value))
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for Scalar {
    fn from(value: Arc<str>) -> Self {
        Scalar::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_keeps_its_kind() {
        assert_eq!(Scalar::Null(ScalarKind::Int).kind(), ScalarKind::Int);
        assert_eq!(Scalar::NONE.kind(), ScalarKind::None);
        assert!(ScalarKind::Float.null().is_null());
    }

    #[test]
    fn default_values_report_their_kind() {
        for kind in ScalarKind::ALL {
            assert_eq!(kind.default_value().kind(), kind);
        }
    }

    #[test]
    fn datetime_display_uses_utc_calendar() {
        // 2021-03-04 05:06:07.089 UTC
        let v = Scalar::DateTime(1_614_834_367_089);
        assert_eq!(v.to_string(), "2021-03-04 05:06:07.089");
    }
}
