//! CSV files as record sources
//!
//! Header names become column names. Cells are typed loosely: empty cells
//! are null, numbers become numbers, everything else stays text for the
//! converter to interpret.

use super::{Record, RecordValue};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvSourceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: {message}")]
    Row { line: usize, message: String },
}

fn cell(raw: &str) -> RecordValue {
    let raw = raw.trim();
    if raw.is_empty() {
        return RecordValue::Null;
    }
    if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() {
            return RecordValue::Number(n);
        }
    }
    match raw.to_lowercase().as_str() {
        "true" => RecordValue::Bool(true),
        "false" => RecordValue::Bool(false),
        _ => RecordValue::Text(raw.to_string()),
    }
}

/// Read every row of a CSV file into records
pub fn read_csv(path: &Path) -> Result<Vec<Record>, CsvSourceError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_csv_from_reader(file)
}

/// Read CSV rows from any reader; `;` is accepted as a delimiter when the
/// header contains no commas
pub fn read_csv_from_reader<R: Read>(mut reader: R) -> Result<Vec<Record>, CsvSourceError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data).map_err(csv::Error::from)?;

    let header_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = if !header_line.contains(&b',') && header_line.contains(&b';') {
        b';'
    } else {
        b','
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_slice());

    let headers = csv_reader.headers()?.clone();
    let mut records = Vec::new();

    for (index, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| CsvSourceError::Row {
            line: index + 2,
            message: e.to_string(),
        })?;

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, raw)| (name.to_string(), cell(raw)))
            .collect();
        records.push(record);
    }

    tracing::debug!(rows = records.len(), columns = headers.len(), "Read CSV records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{convert, DatasetType};
    use std::io::Write;

    #[test]
    fn test_read_and_convert() {
        let data = "timestamp,region,source,unit,value,capacity_mw
2024-01-15T10:00:00Z,sudeste,hidrelétrica,MW,150.2,300
2024-01-15T11:00:00Z,sul,eólica,MW,,
2024-01-15T12:00:00Z,norte,solar,GWh,1.5,";

        let records = read_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("value"), Some(&RecordValue::Number(150.2)));
        assert_eq!(records[1].get("value"), Some(&RecordValue::Null));

        let conversion = convert(&records, DatasetType::Generation);
        assert_eq!(conversion.accepted_count(), 2);
        assert_eq!(conversion.rejected_count(), 1);

        let first = &conversion.points[0];
        assert_eq!(first.tags.get("source").map(String::as_str), Some("hydro"));
        assert_eq!(first.fields.get("power_mw"), Some(&150.2));
        assert_eq!(first.fields.get("capacity_mw"), Some(&300.0));
        assert_eq!(conversion.points[1].fields.get("energy_gwh"), Some(&1.5));
    }

    #[test]
    fn test_semicolon_delimited_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "din_instante;nom_subsistema;val_cargaenergiamwmed").unwrap();
        writeln!(file, "2024-01-01 00:00:00;SUDESTE;38000,5").unwrap();

        let records = read_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("nom_subsistema"),
            Some(&RecordValue::Text("SUDESTE".to_string()))
        );

        let conversion = convert(&records, DatasetType::Consumption);
        let point = &conversion.points[0];
        assert_eq!(point.tags.get("region").map(String::as_str), Some("southeast"));
        assert_eq!(point.fields.get("val_cargaenergiamwmed"), Some(&38000.5));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(read_csv(Path::new("/nonexistent/gridlens.csv")).is_err());
    }
}
