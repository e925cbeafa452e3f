//! Query Template Registry
//!
//! A read-only table keyed by `(QueryIntent, QueryLanguage)`. Each entry is
//! a skeleton with `{{name}}` placeholders plus the parameters it needs.
//! Adding an intent means adding rows here, not new control flow.
//!
//! The built-in registry is constructed once behind a `OnceLock`; tests
//! can build smaller registries with `TemplateRegistry::from_templates`.

use crate::translate::error::TemplateError;
use crate::translate::types::{ParameterKey, QueryIntent, QueryLanguage};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A parameterized query skeleton for one intent and language
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub intent: QueryIntent,
    pub language: QueryLanguage,
    pub skeleton: String,
    pub required_parameters: Vec<ParameterKey>,
}

impl QueryTemplate {
    pub fn new(
        intent: QueryIntent,
        language: QueryLanguage,
        skeleton: impl Into<String>,
        required_parameters: &[ParameterKey],
    ) -> Self {
        Self {
            intent,
            language,
            skeleton: skeleton.into(),
            required_parameters: required_parameters.to_vec(),
        }
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in placeholder_regex().captures_iter(&self.skeleton) {
            if let Some(m) = caps.get(1) {
                if !names.contains(&m.as_str()) {
                    names.push(m.as_str());
                }
            }
        }
        names
    }
}

pub(crate) fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([a-z_]+)\}\}").expect("valid placeholder pattern"))
}

/// Immutable lookup table of templates
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<(QueryIntent, QueryLanguage), QueryTemplate>,
}

impl TemplateRegistry {
    /// Build a registry from explicit templates; later entries replace earlier ones
    pub fn from_templates(templates: impl IntoIterator<Item = QueryTemplate>) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| ((t.intent, t.language), t))
            .collect();
        Self { templates }
    }

    /// The process-wide built-in registry
    pub fn builtin() -> &'static TemplateRegistry {
        static REGISTRY: OnceLock<TemplateRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| Self::from_templates(builtin_templates()))
    }

    pub fn get(
        &self,
        intent: QueryIntent,
        language: QueryLanguage,
    ) -> Result<&QueryTemplate, TemplateError> {
        self.templates
            .get(&(intent, language))
            .ok_or(TemplateError::NotFound { intent, language })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryTemplate> {
        self.templates.values()
    }
}

const FLUX_GENERATION_TREND: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => {{measurement_predicate}})
  |> filter(fn: (r) => r._field == {{field}}){{tag_filters}}{{group_stage}}
  |> aggregateWindow(every: {{window}}, fn: {{aggregate_fn}}, createEmpty: false){{limit_stage}}
  |> yield(name: "generation_trend")"#;

const INFLUXQL_GENERATION_TREND: &str = r#"SELECT {{aggregate_fn}}({{field}}) AS {{value_alias}} FROM {{sources}} WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}} GROUP BY time({{window}}){{group_tags}} fill(none){{limit_clause}}"#;

const FLUX_CONSUMPTION_COMPARISON: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => {{measurement_predicate}})
  |> filter(fn: (r) => r._field == {{field}}){{tag_filters}}
  |> group(columns: {{group_columns}})
  |> {{aggregate_fn}}()
  |> group()
  |> sort(columns: ["_value"], desc: true){{limit_stage}}
  |> yield(name: "consumption_comparison")"#;

const INFLUXQL_CONSUMPTION_COMPARISON: &str = r#"SELECT {{aggregate_fn}}({{field}}) AS {{value_alias}} FROM {{sources}} WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}} GROUP BY {{group_list}}{{limit_clause}}"#;

const FLUX_PEAK_ANALYSIS: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => {{measurement_predicate}})
  |> filter(fn: (r) => r._field == {{field}}){{tag_filters}}{{group_stage}}
  |> {{peak_call}}
  |> yield(name: "peak_analysis")"#;

const INFLUXQL_PEAK_ANALYSIS: &str = r#"SELECT {{peak_selector}} FROM {{sources}} WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}}{{group_clause}}"#;

const FLUX_CAPACITY_FACTOR: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => r._measurement == "generation")
  |> filter(fn: (r) => r._field == "power_mw" or r._field == "capacity_mw"){{tag_filters}}
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> filter(fn: (r) => exists r.power_mw and exists r.capacity_mw and r.capacity_mw > 0.0)
  |> map(fn: (r) => ({r with _value: r.power_mw / r.capacity_mw}))
  |> group(columns: {{group_columns}})
  |> mean()
  |> yield(name: "capacity_factor")"#;

const INFLUXQL_CAPACITY_FACTOR: &str = r#"SELECT MEAN("power_mw") / MEAN("capacity_mw") AS "capacity_factor" FROM {{bucket}}.{{retention_policy}}."generation" WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}} GROUP BY {{group_list}}"#;

const FLUX_GENERATION_MIX: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => {{measurement_predicate}})
  |> filter(fn: (r) => r._field == {{field}}){{tag_filters}}
  |> group(columns: {{group_columns}})
  |> {{aggregate_fn}}()
  |> group()
  |> sort(columns: ["_value"], desc: true)
  |> yield(name: "generation_mix")"#;

const INFLUXQL_GENERATION_MIX: &str = r#"SELECT {{aggregate_fn}}({{field}}) AS {{value_alias}} FROM {{sources}} WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}} GROUP BY {{group_list}}"#;

const FLUX_GENERIC_LOOKUP: &str = r#"from(bucket: {{bucket}})
  |> range(start: {{start}}, stop: {{stop}})
  |> filter(fn: (r) => {{measurement_predicate}})
  |> filter(fn: (r) => r._field == {{field}}){{tag_filters}}{{group_stage}}{{window_stage}}
  |> sort(columns: ["_time"], desc: true){{limit_stage}}
  |> yield(name: "generic_lookup")"#;

const INFLUXQL_GENERIC_LOOKUP: &str = r#"SELECT {{selector}} FROM {{sources}} WHERE time >= {{start}} AND time < {{stop}}{{tag_filters}}{{windowed_group_clause}} ORDER BY time DESC{{limit_clause}}"#;

fn builtin_templates() -> Vec<QueryTemplate> {
    use ParameterKey::*;
    use QueryIntent::*;
    use QueryLanguage::*;

    vec![
        QueryTemplate::new(
            GenerationTrend,
            Flux,
            FLUX_GENERATION_TREND,
            &[TimeRange, MeasurementTypes, Aggregation],
        ),
        QueryTemplate::new(
            GenerationTrend,
            InfluxQl,
            INFLUXQL_GENERATION_TREND,
            &[TimeRange, MeasurementTypes, Aggregation],
        ),
        QueryTemplate::new(
            ConsumptionComparison,
            Flux,
            FLUX_CONSUMPTION_COMPARISON,
            &[TimeRange, MeasurementTypes, Aggregation, GroupBy],
        ),
        QueryTemplate::new(
            ConsumptionComparison,
            InfluxQl,
            INFLUXQL_CONSUMPTION_COMPARISON,
            &[TimeRange, MeasurementTypes, Aggregation, GroupBy],
        ),
        QueryTemplate::new(
            PeakAnalysis,
            Flux,
            FLUX_PEAK_ANALYSIS,
            &[TimeRange, MeasurementTypes, Aggregation],
        ),
        QueryTemplate::new(
            PeakAnalysis,
            InfluxQl,
            INFLUXQL_PEAK_ANALYSIS,
            &[TimeRange, MeasurementTypes, Aggregation],
        ),
        QueryTemplate::new(
            CapacityFactor,
            Flux,
            FLUX_CAPACITY_FACTOR,
            &[TimeRange, MeasurementTypes, EnergySources, GroupBy],
        ),
        QueryTemplate::new(
            CapacityFactor,
            InfluxQl,
            INFLUXQL_CAPACITY_FACTOR,
            &[TimeRange, MeasurementTypes, EnergySources, GroupBy],
        ),
        QueryTemplate::new(
            GenerationMix,
            Flux,
            FLUX_GENERATION_MIX,
            &[TimeRange, MeasurementTypes, Aggregation, GroupBy],
        ),
        QueryTemplate::new(
            GenerationMix,
            InfluxQl,
            INFLUXQL_GENERATION_MIX,
            &[TimeRange, MeasurementTypes, Aggregation, GroupBy],
        ),
        QueryTemplate::new(
            GenericLookup,
            Flux,
            FLUX_GENERIC_LOOKUP,
            &[TimeRange, MeasurementTypes],
        ),
        QueryTemplate::new(
            GenericLookup,
            InfluxQl,
            INFLUXQL_GENERIC_LOOKUP,
            &[TimeRange, MeasurementTypes],
        ),
    ]
}
