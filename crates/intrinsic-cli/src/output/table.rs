use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_scalar, rows_in, unwrap_result};

/// Format output as tables: scalars as Field/Value, forecasts as row tables.
pub fn print_table(value: &Value) {
    let result = unwrap_result(value);
    match result {
        Value::Object(map) => print_section(None, map),
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", format_scalar(result)),
    }

    if let Some(envelope) = value.as_object() {
        print_envelope_notes(envelope);
    }
}

fn print_section(title: Option<&str>, map: &Map<String, Value>) {
    if let Some(rows) = rows_in(map) {
        print_title(title);
        print_array_table(rows);
        return;
    }

    let mut scalars = Builder::default();
    let mut has_scalars = false;
    let mut nested: Vec<(&str, &Value)> = Vec::new();
    scalars.push_record(["Field", "Value"]);

    for (key, val) in map {
        match val {
            Value::Object(_) => nested.push((key.as_str(), val)),
            Value::Array(arr) if arr.first().is_some_and(Value::is_object) => {
                nested.push((key.as_str(), val))
            }
            Value::Array(arr) => {
                has_scalars = true;
                let items: Vec<String> = arr.iter().map(format_scalar).collect();
                scalars.push_record([key.clone(), items.join(", ")]);
            }
            _ => {
                has_scalars = true;
                scalars.push_record([key.clone(), format_scalar(val)]);
            }
        }
    }

    if has_scalars {
        print_title(title);
        println!("{}", Table::from(scalars));
    }

    for (key, val) in nested {
        let heading = match title {
            Some(t) => format!("{t}.{key}"),
            None => key.to_string(),
        };
        match val {
            Value::Object(inner) => print_section(Some(&heading), inner),
            Value::Array(arr) => {
                print_title(Some(&heading));
                print_array_table(arr);
            }
            _ => {}
        }
    }
}

fn print_title(title: Option<&str>) {
    if let Some(t) = title {
        println!("\n{}:", t);
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_scalar).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_scalar(item));
        }
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
