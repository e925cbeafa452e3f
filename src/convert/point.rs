//! Point type and line protocol encoding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Why a point could not be constructed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PointError {
    #[error("Measurement name is empty")]
    EmptyMeasurement,

    #[error("Point has no fields")]
    NoFields,

    #[error("Key '{0}' is used as both a tag and a field")]
    OverlappingKey(String),

    #[error("Field '{key}' is not finite: {value}")]
    NonFiniteField { key: String, value: f64 },

    #[error("Timestamp {0} is outside the nanosecond epoch range")]
    TimestampOutOfRange(DateTime<Utc>),
}

/// One time-series observation
///
/// Always has at least one field, and tag keys never collide with field
/// keys. Construct through [`Point::try_new`] or the builder plus
/// [`Point::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// Create and validate a point
    pub fn try_new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PointError> {
        let point = Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp,
        };
        point.validate()?;
        Ok(point)
    }

    /// Start an empty point; call [`Point::validate`] once fields are added
    pub fn builder(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder method: add a field
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), PointError> {
        if self.measurement.trim().is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(PointError::NoFields);
        }
        if let Some(key) = self.tags.keys().find(|k| self.fields.contains_key(*k)) {
            return Err(PointError::OverlappingKey(key.clone()));
        }
        if let Some((key, value)) = self.fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PointError::NonFiniteField {
                key: key.clone(),
                value: *value,
            });
        }
        if self.timestamp.timestamp_nanos_opt().is_none() {
            return Err(PointError::TimestampOutOfRange(self.timestamp));
        }
        Ok(())
    }

    /// Encode as one line of InfluxDB line protocol, nanosecond precision
    ///
    /// Validated points always carry a timestamp; an unvalidated point
    /// whose time has no nanosecond representation is encoded without one.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), format_float(*value)))
            .collect();
        let _ = write!(line, " {}", fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            let _ = write!(line, " {nanos}");
        }
        line
    }
}

fn escape(s: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Floats always carry a decimal point so the store never infers an integer
fn format_float(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

/// Encode a batch, one point per line
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}
