//! Response decoding
//!
//! Flux answers in CSV; each table in the stream repeats its header row
//! after a blank line. InfluxQL answers in JSON with `results[].series[]`,
//! which is flattened to one row per value.

use crate::client::error::TransportError;
use crate::client::transport::Row;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Typed cell: integers, floats and booleans are recognised, anything else is text
fn csv_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn is_flux_header(record: &csv::StringRecord) -> bool {
    is_error_header(record) || (record.get(1) == Some("result") && record.get(2) == Some("table"))
}

/// Flux reports mid-stream failures as a table with `error,reference` columns
fn is_error_header(record: &csv::StringRecord) -> bool {
    record.get(1) == Some("error") && record.get(2) == Some("reference")
}

/// Parse a Flux CSV response into rows
///
/// The unnamed leading annotation column is dropped, as are `#` annotation
/// rows. An error table fails the whole response.
pub fn parse_flux_csv(body: &str) -> Result<Vec<Row>, TransportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut header: Option<csv::StringRecord> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| TransportError::Decode(e.to_string()))?;
        if record.iter().all(str::is_empty)
            || record.get(0).is_some_and(|c| c.starts_with('#'))
        {
            continue;
        }
        let starts_table = match &header {
            None => true,
            Some(current) => is_flux_header(&record) || record.iter().eq(current.iter()),
        };
        if starts_table {
            header = Some(record);
            continue;
        }
        let Some(columns) = &header else {
            continue;
        };
        if is_error_header(columns) {
            let message = record.get(1).unwrap_or_default();
            return Err(TransportError::Statement(message.to_string()));
        }

        let row: Row = columns
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, raw)| (name.to_string(), csv_cell(raw)))
            .collect();
        rows.push(row);
    }

    if header.as_ref().is_some_and(is_error_header) {
        return Err(TransportError::Statement("query failed".to_string()));
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct InfluxQlResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Map<String, Value>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Parse an InfluxQL JSON response into rows
///
/// Each row carries `_measurement`, the series tags, then the columns.
pub fn parse_influxql_json(body: &[u8]) -> Result<Vec<Row>, TransportError> {
    let response: InfluxQlResponse =
        serde_json::from_slice(body).map_err(|e| TransportError::Decode(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(TransportError::Statement(error));
    }

    let mut rows = Vec::new();
    for result in response.results {
        if let Some(error) = result.error {
            return Err(TransportError::Statement(error));
        }
        for series in result.series {
            for values in series.values {
                let mut row = Row::new();
                if let Some(name) = &series.name {
                    row.insert("_measurement".to_string(), Value::String(name.clone()));
                }
                for (key, value) in &series.tags {
                    row.insert(key.clone(), value.clone());
                }
                for (column, value) in series.columns.iter().zip(values) {
                    row.insert(column.clone(), value);
                }
                rows.push(row);
            }
        }
    }

    Ok(rows)
}

/// Human-readable message from an error body; InfluxDB sends `{"message": ...}`
pub fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "error")]
        message: String,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => String::from_utf8_lossy(body).chars().take(200).collect(),
    }
}
