//! Core data types for question translation
//!
//! - `QueryIntent` and `QueryLanguage`: what is being asked and in which dialect
//! - `TimeRange` / `TimeBound`: the window a query covers
//! - `QueryParameters`: everything extracted from a question
//! - `TranslationContext`: caller-supplied overrides
//! - `TranslationResult`: the rendered query plus its parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The classified shape of a question
///
/// Declaration order is the tie-break priority used by the classifier:
/// the most specific families come first and `GenericLookup` is last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Ratio of produced power to installed capacity
    CapacityFactor,
    /// Highest (or lowest) value in a window
    PeakAnalysis,
    /// Share of each source in total generation
    GenerationMix,
    /// Consumption compared across regions or sources
    ConsumptionComparison,
    /// Generation over time, usually windowed
    GenerationTrend,
    /// Fallback: raw values for whatever was mentioned
    GenericLookup,
}

impl QueryIntent {
    /// All intents in priority order
    pub fn all() -> &'static [QueryIntent] {
        &[
            QueryIntent::CapacityFactor,
            QueryIntent::PeakAnalysis,
            QueryIntent::GenerationMix,
            QueryIntent::ConsumptionComparison,
            QueryIntent::GenerationTrend,
            QueryIntent::GenericLookup,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::CapacityFactor => "capacity_factor",
            QueryIntent::PeakAnalysis => "peak_analysis",
            QueryIntent::GenerationMix => "generation_mix",
            QueryIntent::ConsumptionComparison => "consumption_comparison",
            QueryIntent::GenerationTrend => "generation_trend",
            QueryIntent::GenericLookup => "generic_lookup",
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
    /// Pipeline-style language for windowed analytics
    Flux,
    /// SQL-like language for filter/group queries
    #[serde(rename = "influxql")]
    InfluxQl,
}

impl QueryLanguage {
    pub fn all() -> &'static [QueryLanguage] {
        &[QueryLanguage::Flux, QueryLanguage::InfluxQl]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLanguage::Flux => "flux",
            QueryLanguage::InfluxQl => "influxql",
        }
    }
}

impl std::fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueryLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flux" => Ok(QueryLanguage::Flux),
            "influxql" | "sql" => Ok(QueryLanguage::InfluxQl),
            other => Err(format!("unknown query language: {other}")),
        }
    }
}

/// Aggregation applied to the selected values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Sum,
    Max,
    Min,
    Count,
    /// Raw values, no aggregation
    #[default]
    None,
}

impl Aggregation {
    /// Function name as written in Flux (`mean`, `sum`, ...)
    pub fn flux_fn(&self) -> Option<&'static str> {
        match self {
            Aggregation::Mean => Some("mean"),
            Aggregation::Sum => Some("sum"),
            Aggregation::Max => Some("max"),
            Aggregation::Min => Some("min"),
            Aggregation::Count => Some("count"),
            Aggregation::None => None,
        }
    }

    /// Function name as written in InfluxQL (`MEAN`, `SUM`, ...)
    pub fn influxql_fn(&self) -> Option<&'static str> {
        match self {
            Aggregation::Mean => Some("MEAN"),
            Aggregation::Sum => Some("SUM"),
            Aggregation::Max => Some("MAX"),
            Aggregation::Min => Some("MIN"),
            Aggregation::Count => Some("COUNT"),
            Aggregation::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Aggregation::None)
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "sum" | "total" => Ok(Aggregation::Sum),
            "max" | "maximum" | "peak" => Ok(Aggregation::Max),
            "min" | "minimum" => Ok(Aggregation::Min),
            "count" => Ok(Aggregation::Count),
            "none" | "raw" | "" => Ok(Aggregation::None),
            other => Err(format!("unknown aggregation: {other}")),
        }
    }
}

/// Unit of a relative duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

impl DurationUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            DurationUnit::Minutes => "m",
            DurationUnit::Hours => "h",
            DurationUnit::Days => "d",
        }
    }

    fn minutes(&self) -> i64 {
        match self {
            DurationUnit::Minutes => 1,
            DurationUnit::Hours => 60,
            DurationUnit::Days => 24 * 60,
        }
    }
}

/// A span of time such as `7d` or `24h`
///
/// Weeks, months and years are folded into days when parsed so that one
/// duration syntax is valid in both query languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeDuration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl RelativeDuration {
    pub fn new(amount: u32, unit: DurationUnit) -> Self {
        Self { amount, unit }
    }

    pub fn minutes(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Minutes)
    }

    pub fn hours(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Hours)
    }

    pub fn days(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Days)
    }

    /// Parse a calendar word ("hour", "weeks", "month") into a duration of `n` of them
    pub fn from_calendar_unit(n: u32, word: &str) -> Option<Self> {
        let word = word.trim_end_matches('s');
        let duration = match word {
            "minute" | "min" => Self::minutes(n),
            "hour" | "hr" | "h" => Self::hours(n),
            "day" | "d" => Self::days(n),
            "week" | "w" => Self::days(n.saturating_mul(7)),
            "month" => Self::days(n.saturating_mul(30)),
            "year" => Self::days(n.saturating_mul(365)),
            _ => return None,
        };
        Some(duration)
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.amount as i64 * self.unit.minutes())
    }

    pub fn total_minutes(&self) -> i64 {
        self.amount as i64 * self.unit.minutes()
    }
}

impl std::fmt::Display for RelativeDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// One end of a time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TimeBound {
    /// The query engine's current instant
    Now,
    /// An offset into the past from now, rendered as `-7d`
    Relative(RelativeDuration),
    /// A fixed instant
    Absolute(DateTime<Utc>),
}

impl TimeBound {
    /// Resolve to an instant given the current time
    ///
    /// Offsets reaching past the earliest representable instant saturate.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeBound::Now => now,
            TimeBound::Relative(d) => now
                .checked_sub_signed(d.as_chrono())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            TimeBound::Absolute(t) => *t,
        }
    }
}

/// Time window for a query; `start` is inclusive and `stop` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimeBound,
    pub stop: TimeBound,
}

impl TimeRange {
    pub fn new(start: TimeBound, stop: TimeBound) -> Self {
        Self { start, stop }
    }

    /// `[now - duration, now]`
    pub fn last(duration: RelativeDuration) -> Self {
        Self::new(TimeBound::Relative(duration), TimeBound::Now)
    }

    pub fn absolute(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self::new(TimeBound::Absolute(start), TimeBound::Absolute(stop))
    }

    /// Length of the window in minutes, resolved against `now`
    pub fn span_minutes(&self, now: DateTime<Utc>) -> i64 {
        (self.stop.resolve(now) - self.start.resolve(now)).num_minutes()
    }
}

impl Default for TimeRange {
    /// The last 24 hours
    fn default() -> Self {
        Self::last(RelativeDuration::hours(24))
    }
}

/// Names of the parameters a template can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    TimeRange,
    Regions,
    EnergySources,
    MeasurementTypes,
    Aggregation,
    Limit,
    GroupBy,
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParameterKey::TimeRange => "time_range",
            ParameterKey::Regions => "regions",
            ParameterKey::EnergySources => "energy_sources",
            ParameterKey::MeasurementTypes => "measurement_types",
            ParameterKey::Aggregation => "aggregation",
            ParameterKey::Limit => "limit",
            ParameterKey::GroupBy => "group_by",
        };
        f.write_str(name)
    }
}

/// Structured parameters extracted from a question
///
/// `time_range` is always set; collections are empty rather than absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryParameters {
    pub time_range: TimeRange,
    #[serde(default)]
    pub regions: BTreeSet<String>,
    #[serde(default)]
    pub energy_sources: BTreeSet<String>,
    #[serde(default)]
    pub measurement_types: BTreeSet<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Aggregation window, from phrases like "hourly" or "by day"
    #[serde(default)]
    pub window: Option<RelativeDuration>,
    /// Field to select, from a unit mention such as "in MWh"
    #[serde(default)]
    pub field: Option<String>,
}

impl QueryParameters {
    /// Whether a parameter carries a usable value
    pub fn is_resolved(&self, key: ParameterKey) -> bool {
        match key {
            ParameterKey::TimeRange => true,
            ParameterKey::Regions => !self.regions.is_empty(),
            ParameterKey::EnergySources => !self.energy_sources.is_empty(),
            ParameterKey::MeasurementTypes => !self.measurement_types.is_empty(),
            ParameterKey::Aggregation => !self.aggregation.is_none(),
            ParameterKey::Limit => self.limit.is_some(),
            ParameterKey::GroupBy => !self.group_by.is_empty(),
        }
    }
}

/// Explicit parameters supplied by an API caller
///
/// Every field that is set takes precedence over what is derived from the
/// question text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationContext {
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default)]
    pub energy_sources: Option<Vec<String>>,
    #[serde(default)]
    pub measurement_types: Option<Vec<String>>,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub group_by: Option<Vec<String>>,
    /// Extra tag equality filters
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl TranslationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn regions(mut self, regions: &[&str]) -> Self {
        self.regions = Some(regions.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn energy_sources(mut self, sources: &[&str]) -> Self {
        self.energy_sources = Some(sources.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn measurement_types(mut self, types: &[&str]) -> Self {
        self.measurement_types = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Outcome of translating one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub query_type: QueryIntent,
    pub language: QueryLanguage,
    pub rendered_query: String,
    pub parameters: QueryParameters,
    pub confidence_score: f64,
}
