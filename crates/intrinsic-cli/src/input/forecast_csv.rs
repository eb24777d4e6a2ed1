use intrinsic_core::forecast::ForecastFrame;
use std::io::Read;

use super::file::resolve_path;

/// Load a forecast CSV (first column the row label) into a [`ForecastFrame`].
pub fn read_forecast_csv(path: &str) -> Result<ForecastFrame, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let file = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_forecast_csv(file)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e).into())
}

pub fn parse_forecast_csv<R: Read>(reader: R) -> Result<ForecastFrame, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.len() < 2 {
        return Err("expected a label column followed by at least one value column".into());
    }

    let mut labels = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len() - 1];

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        labels.push(record.get(0).unwrap_or_default().to_string());
        for (i, column) in columns.iter_mut().enumerate() {
            let raw = record.get(i + 1).unwrap_or_default();
            let value: f64 = raw.parse().map_err(|_| {
                format!(
                    "row {}: '{}' is not a number in column '{}'",
                    line + 2,
                    raw,
                    headers[i + 1]
                )
            })?;
            column.push(value);
        }
    }

    let mut frame = ForecastFrame::new(labels);
    for (name, values) in headers[1..].iter().zip(columns) {
        frame = frame.with_column(name, values)?;
    }
    Ok(frame)
}
