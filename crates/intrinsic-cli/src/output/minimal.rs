use serde_json::Value;

use super::{format_scalar, unwrap_result};

/// Key answers in priority order; dotted paths reach into nested results.
const PRIORITY_PATHS: [&str; 7] = [
    "enterprise_value",
    "wacc",
    "cagr",
    "summary.per_share.median",
    "summary.percentiles.p50",
    "percentiles.p50",
    "valid_trials",
];

/// Print just the key answer value from the output.
///
/// Falls back to the first field of the result object, or to the last
/// year's FCFF for a bare forecast.
pub fn print_minimal(value: &Value) {
    let result = unwrap_result(value);
    println!("{}", minimal_answer(result));
}

fn minimal_answer(result: &Value) -> String {
    for path in PRIORITY_PATHS {
        if let Some(val) = lookup(result, path) {
            if !val.is_null() {
                return format_scalar(val);
            }
        }
    }

    if let Some(fcff) = lookup(result, "rows")
        .and_then(Value::as_array)
        .and_then(|rows| rows.last())
        .and_then(|row| row.get("FCFF"))
    {
        return format_scalar(fcff);
    }

    match result {
        Value::Object(map) => match map.iter().next() {
            Some((key, val)) => format!("{}: {}", key, format_scalar(val)),
            None => String::new(),
        },
        _ => format_scalar(result),
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}
