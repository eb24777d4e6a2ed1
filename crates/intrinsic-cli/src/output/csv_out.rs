use intrinsic_core::forecast::{ForecastTable, LineItem};
use serde_json::Value;
use std::io::{self, Write};
use std::path::Path;

use super::{forecast_rows, format_scalar, unwrap_result};

/// Write output as CSV to stdout.
///
/// A forecast becomes one row per year and a scenario set gains a leading
/// `scenario` column. Anything else is a field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let result = unwrap_result(value);

    if let Some(rows) = forecast_rows(result) {
        write_rows(&mut wtr, None, rows, true);
    } else if let Some(sets) = scenario_tables(result) {
        for (i, (name, rows)) in sets.into_iter().enumerate() {
            write_rows(&mut wtr, Some(name), rows, i == 0);
        }
    } else {
        let _ = wtr.write_record(["field", "value"]);
        if let Value::Object(map) = result {
            write_fields(&mut wtr, "", map);
        } else {
            let _ = wtr.write_record(["value", &format_scalar(result)]);
        }
    }

    let _ = wtr.flush();
}

/// `(name, rows)` for every member when each member is a forecast table.
fn scenario_tables(value: &Value) -> Option<Vec<(&str, &[Value])>> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }
    map.iter()
        .map(|(k, v)| forecast_rows(v).map(|rows| (k.as_str(), rows)))
        .collect()
}

fn write_fields<W: Write>(
    wtr: &mut csv::Writer<W>,
    prefix: &str,
    map: &serde_json::Map<String, Value>,
) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) if forecast_rows(val).is_none() => {
                write_fields(wtr, &name, inner)
            }
            Value::Object(_) => {}
            _ => {
                let _ = wtr.write_record([name.as_str(), &format_scalar(val)]);
            }
        }
    }
}

fn write_rows<W: Write>(
    wtr: &mut csv::Writer<W>,
    label: Option<&str>,
    rows: &[Value],
    with_header: bool,
) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    if with_header {
        let mut header: Vec<&str> = label.map(|_| "scenario").into_iter().collect();
        header.extend(&headers);
        let _ = wtr.write_record(&header);
    }

    for item in rows {
        if let Value::Object(map) = item {
            let mut row: Vec<String> = label.map(str::to_string).into_iter().collect();
            row.extend(
                headers
                    .iter()
                    .map(|h| map.get(*h).map(format_scalar).unwrap_or_default()),
            );
            let _ = wtr.write_record(&row);
        }
    }
}

/// Write a forecast to `path`, one row per year with the year as row label.
pub fn write_forecast_csv(
    path: &Path,
    table: &ForecastTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
    write_forecast(file, table)
}

pub fn write_forecast<W: Write>(
    writer: W,
    table: &ForecastTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Year"];
    header.extend(LineItem::ALL.iter().map(|item| item.column_name()));
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut record = vec![row.period.label()];
        record.extend(
            [
                row.revenue,
                row.ebitda,
                row.depreciation,
                row.ebit,
                row.nopat,
                row.capex,
                row.delta_working_capital,
                row.fcff,
            ]
            .iter()
            .map(f64::to_string),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::forecast_csv::parse_forecast_csv;
    use intrinsic_core::forecast::{build_forecast, AssumptionSet, FreeCashFlows};

    #[test]
    fn test_forecast_csv_reloads_into_frame() {
        let table = build_forecast(&AssumptionSet {
            last_revenue: 28_000.0,
            growth: 0.08,
            ebitda_margin: 0.34,
            capex_pct: 0.06,
            dep_pct: 0.05,
            wc_pct: 0.01,
            tax_rate: 0.21,
            years: 3,
            start_year: Some(2024),
        });
        let mut buf = Vec::new();
        write_forecast(&mut buf, &table).unwrap();

        let frame = parse_forecast_csv(buf.as_slice()).unwrap();
        assert_eq!(frame.labels(), ["2025", "2026", "2027"]);
        assert_eq!(frame.column_names().count(), 8);
        assert_eq!(
            frame.free_cash_flows().unwrap(),
            table.free_cash_flows().unwrap()
        );
    }
}
