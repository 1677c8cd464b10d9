use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use formula_table::{Scalar, ScalarKind};

use super::{is_null_for, type_error, FunctionSpec};
use crate::runtime::{EvalError, EvalResult};

fn to_datetime(name: &str, ms: i64) -> Result<DateTime<Utc>, EvalError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| EvalError::new(format!("{name}(): timestamp {ms} is out of range")))
}

fn component(name: &str, value: &Scalar, f: fn(&DateTime<Utc>) -> i64) -> EvalResult {
    match value {
        Scalar::DateTime(ms) => Ok(Scalar::Int(f(&to_datetime(name, *ms)?))),
        v if is_null_for(v, ScalarKind::DateTime) => Ok(Scalar::Null(ScalarKind::Int)),
        v => Err(type_error(name, "a datetime", v)),
    }
}

macro_rules! component_fn {
    ($name:literal, $func:ident, $extract:expr) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: 1,
                max_args: 1,
                implementation: $func,
            }
        }

        fn $func(args: &[Scalar]) -> EvalResult {
            component($name, &args[0], $extract)
        }
    };
}

component_fn!("year", year_fn, |dt| i64::from(dt.year()));
component_fn!("month", month_fn, |dt| i64::from(dt.month()));
component_fn!("day", day_fn, |dt| i64::from(dt.day()));
component_fn!("hour", hour_fn, |dt| i64::from(dt.hour()));
component_fn!("minute", minute_fn, |dt| i64::from(dt.minute()));
component_fn!("second", second_fn, |dt| i64::from(dt.second()));

inventory::submit! {
    FunctionSpec {
        name: "date",
        min_args: 3,
        max_args: 3,
        implementation: date_fn,
    }
}

/// `date(year, month, day)` at midnight UTC.
fn date_fn(args: &[Scalar]) -> EvalResult {
    if args.iter().any(|arg| is_null_for(arg, ScalarKind::Int)) {
        return Ok(Scalar::Null(ScalarKind::DateTime));
    }
    let mut parts = [0i64; 3];
    for (part, arg) in parts.iter_mut().zip(args) {
        *part = arg
            .as_i64()
            .ok_or_else(|| type_error("date", "integer year, month and day", arg))?;
    }
    let [year, month, day] = parts;

    let invalid = || EvalError::new(format!("date(): {year}-{month}-{day} is not a valid date"));
    let year = i32::try_from(year).map_err(|_| invalid())?;
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let day = u32::try_from(day).map_err(|_| invalid())?;
    let midnight = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;
    Ok(Scalar::DateTime(midnight.and_utc().timestamp_millis()))
}

#[allow(dead_code)]
pub(super) fn __force_link() {}
