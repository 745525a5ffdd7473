use super::file::{FileSeriesStore, SeriesFormat};
use crate::error::PulseError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};
use std::io::Write;

/// Series persisted as `<dir>/<name>.csv`, the layout the dashboard reads.
pub type CsvSeriesStore = FileSeriesStore<CsvTable>;

/// Flat CSV with a header row taken from the first row's field order.
///
/// Missing values are empty cells. On read, cells are typed by content: empty is missing,
/// `true`/`false` are booleans, anything that parses as a finite number is a number and the
/// rest are strings. Rows must serialize as flat objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTable;

impl SeriesFormat for CsvTable {
    const EXTENSION: &'static str = "csv";

    fn decode<T>(contents: &str) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned,
    {
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_string(), typed_cell(cell)))
                .collect();
            rows.push(serde_json::from_value(Value::Object(row))?);
        }
        Ok(rows)
    }

    fn encode<T, W>(rows: &[T], writer: W) -> Result<(), PulseError>
    where
        T: Serialize,
        W: Write,
    {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let Some(first) = values.first() else {
            return Ok(());
        };
        let headers: Vec<&String> = flat_object(first)?.keys().collect();

        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&headers)?;
        for value in &values {
            let row = flat_object(value)?;
            let cells = headers
                .iter()
                .map(|&header| row.get(header).map(cell_text).unwrap_or_default());
            writer.write_record(cells)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn flat_object(value: &Value) -> Result<&Map<String, Value>, PulseError> {
    match value.as_object() {
        Some(row) if row.values().all(|cell| !cell.is_object() && !cell.is_array()) => Ok(row),
        _ => Err(PulseError::Serde("csv rows must be flat objects".to_string())),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn typed_cell(cell: &str) -> Value {
    match cell {
        "" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => cell
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| cell.parse::<u64>().map(Value::from))
            .ok()
            .or_else(|| {
                cell.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(|| Value::String(cell.to_string())),
    }
}
