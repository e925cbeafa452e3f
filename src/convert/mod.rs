//! Row-to-Point Converter
//!
//! Maps tabular records onto the tag/field model the store expects.
//! Validation comes first: a record with no usable timestamp or no numeric
//! value is returned in `rejected` with a reason, never silently dropped.
//!
//! Conversion is pure and allocation-only. Reading files lives in
//! [`csv_source`] so callers can feed records from anywhere.
//!
//! ```text
//! Record { din_instante, subsistema, fonte, unit, value, ... }
//!   → Point { measurement, tags {region, source, plant, state}, fields, timestamp }
//! ```

pub mod csv_source;
pub mod point;
pub mod units;

pub use csv_source::{read_csv, read_csv_from_reader, CsvSourceError};
pub use point::{encode_batch, Point, PointError};
pub use units::{field_for_unit, field_or_fallback, FALLBACK_FIELD};

use crate::translate::synonyms::{self, SynonymTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One cell of a tabular record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl RecordValue {
    /// Numeric value, including numbers written as text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Number(n) if n.is_finite() => Some(*n),
            RecordValue::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Non-empty textual form, used for tags
    pub fn as_text(&self) -> Option<String> {
        match self {
            RecordValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            RecordValue::Number(n) => Some(n.to_string()),
            RecordValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            RecordValue::Null => true,
            RecordValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<f64> for RecordValue {
    fn from(n: f64) -> Self {
        RecordValue::Number(n)
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Text(s)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Bool(b)
    }
}

/// Accepts `150.2`, and `150,2` when the comma is the only separator
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = s.parse::<f64>().ok().or_else(|| {
        if s.matches(',').count() == 1 && !s.contains('.') {
            s.replace(',', ".").parse::<f64>().ok()
        } else {
            None
        }
    });
    parsed.filter(|n| n.is_finite())
}

/// A tabular record: column name → cell
pub type Record = BTreeMap<String, RecordValue>;

/// Kind of dataset a batch of records belongs to; decides the measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Generation,
    Consumption,
    Transmission,
}

impl DatasetType {
    pub fn measurement(&self) -> &'static str {
        match self {
            DatasetType::Generation => "generation",
            DatasetType::Consumption => "consumption",
            DatasetType::Transmission => "transmission",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.measurement())
    }
}

impl FromStr for DatasetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generation" | "geracao" | "geração" => Ok(DatasetType::Generation),
            "consumption" | "load" | "demand" | "carga" => Ok(DatasetType::Consumption),
            "transmission" | "transmissao" | "transmissão" => Ok(DatasetType::Transmission),
            other => Err(format!("Unknown dataset type: {}", other)),
        }
    }
}

/// Why a record was not converted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error("Record has no timestamp column")]
    MissingTimestamp,

    #[error("Could not parse timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Record has no numeric field")]
    NoNumericField,

    #[error("Invalid point: {0}")]
    InvalidPoint(#[from] PointError),
}

/// A record that failed validation, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub record: Record,
    pub reason: RejectReason,
}

/// Output of a conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    pub points: Vec<Point>,
    pub rejected: Vec<Rejection>,
}

impl Conversion {
    pub fn accepted_count(&self) -> usize {
        self.points.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time", "datetime", "date", "din_instante"];

const UNIT_COLUMNS: &[&str] = &["unit", "units", "unidade"];

const VALUE_COLUMNS: &[&str] = &["value", "valor"];

/// Column aliases for each tag, and the table used to canonicalize values
const TAG_COLUMNS: &[(&str, &[&str], &[SynonymTable])] = &[
    (
        "region",
        &[
            "region",
            "subsystem",
            "subsistema",
            "nom_subsistema",
            "id_subsistema",
            "regiao",
        ],
        &[synonyms::REGIONS, synonyms::REGION_CODES],
    ),
    (
        "source",
        &[
            "source",
            "energy_source",
            "fuel",
            "fonte",
            "tipo_fonte",
            "nom_tipocombustivel",
        ],
        &[synonyms::ENERGY_SOURCES],
    ),
    ("plant", &["plant", "station", "usina", "nom_usina"], &[]),
    ("state", &["state", "estado", "uf", "id_estado"], &[]),
];

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

fn column_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a timestamp cell; numbers are epoch milliseconds
fn parse_timestamp(value: &RecordValue) -> Option<DateTime<Utc>> {
    match value {
        RecordValue::Number(n) if n.is_finite() => Utc.timestamp_millis_opt(*n as i64).single(),
        RecordValue::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in TIMESTAMP_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(dt.and_utc());
                }
            }
            for fmt in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                    return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
            }
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                return s
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            }
            None
        }
        _ => None,
    }
}

/// Lower snake_case field name; `None` when nothing usable remains
fn sanitize_field_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn find_column<'a>(record: &'a Record, aliases: &[&str]) -> Option<(&'a String, &'a RecordValue)> {
    record
        .iter()
        .find(|(name, value)| aliases.contains(&column_key(name).as_str()) && !value.is_null())
}

fn is_reserved(name: &str) -> bool {
    let key = column_key(name);
    let key = key.as_str();
    TIMESTAMP_COLUMNS.contains(&key)
        || UNIT_COLUMNS.contains(&key)
        || VALUE_COLUMNS.contains(&key)
        || TAG_COLUMNS.iter().any(|(_, aliases, _)| aliases.contains(&key))
}

/// Convert one record to a point
pub fn convert_record(record: &Record, dataset: DatasetType) -> Result<Point, RejectReason> {
    let (_, ts_value) =
        find_column(record, TIMESTAMP_COLUMNS).ok_or(RejectReason::MissingTimestamp)?;
    let timestamp = parse_timestamp(ts_value).ok_or_else(|| {
        RejectReason::InvalidTimestamp(ts_value.as_text().unwrap_or_default())
    })?;

    let mut point = Point::builder(dataset.measurement(), timestamp);

    for (tag, aliases, tables) in TAG_COLUMNS {
        if let Some(text) = find_column(record, aliases).and_then(|(_, v)| v.as_text()) {
            let value = if tables.is_empty() {
                text
            } else {
                tables
                    .iter()
                    .find_map(|table| synonyms::canonicalize(&text, table))
                    .map(str::to_string)
                    .unwrap_or_else(|| text.trim().to_lowercase())
            };
            point = point.tag(*tag, value);
        }
    }

    if let Some(value) = find_column(record, VALUE_COLUMNS).and_then(|(_, v)| v.as_f64()) {
        let unit = find_column(record, UNIT_COLUMNS).and_then(|(_, v)| v.as_text());
        point = point.field(field_or_fallback(unit.as_deref()), value);
    }

    for (name, value) in record {
        if is_reserved(name) {
            continue;
        }
        let (Some(key), Some(number)) = (sanitize_field_name(name), value.as_f64()) else {
            continue;
        };
        if point.tags.contains_key(&key) || point.fields.contains_key(&key) {
            continue;
        }
        point = point.field(key, number);
    }

    if point.fields.is_empty() {
        return Err(RejectReason::NoNumericField);
    }
    point.validate()?;
    Ok(point)
}

/// Convert a batch of records
pub fn convert(records: &[Record], dataset: DatasetType) -> Conversion {
    let mut conversion = Conversion::default();

    for record in records {
        match convert_record(record, dataset) {
            Ok(point) => conversion.points.push(point),
            Err(reason) => conversion.rejected.push(Rejection {
                record: record.clone(),
                reason,
            }),
        }
    }

    tracing::debug!(
        dataset = %dataset,
        accepted = conversion.points.len(),
        rejected = conversion.rejected.len(),
        "Converted records"
    );

    conversion
}
