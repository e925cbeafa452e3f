//! Template rendering
//!
//! Produces the value of every placeholder for a target language, then
//! substitutes them into a skeleton. Quoting rules:
//!
//! | | Flux | InfluxQL |
//! |---|---|---|
//! | string literal | `"hydro"` | `'hydro'` |
//! | identifier | `r.region` | `"region"` |
//! | relative time | `-7d` | `now() - 7d` |
//! | absolute time | `2024-01-01T00:00:00Z` | `'2024-01-01T00:00:00Z'` |

use crate::translate::error::TemplateError;
use crate::translate::templates::{placeholder_regex, QueryTemplate};
use crate::translate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Field selected when the question names no unit
pub const DEFAULT_FIELD: &str = "power_mw";

/// Store-specific names that are not part of the question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Bucket (Flux) or database (InfluxQL) to read from
    pub bucket: String,
    /// Retention policy used in InfluxQL `FROM` clauses
    pub retention_policy: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            bucket: "energy".to_string(),
            retention_policy: "autogen".to_string(),
        }
    }
}

/// Render a template with the given parameters
///
/// Fails only if the skeleton names a placeholder this renderer does not
/// know, which is a registry bug.
pub fn render(
    template: &QueryTemplate,
    params: &QueryParameters,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> Result<String, TemplateError> {
    let values = match template.language {
        QueryLanguage::Flux => flux_values(params, settings, now),
        QueryLanguage::InfluxQl => influxql_values(params, settings, now),
    };

    if let Some(unknown) = template
        .placeholders()
        .into_iter()
        .find(|name| !values.contains_key(*name))
    {
        return Err(TemplateError::UnknownPlaceholder {
            intent: template.intent,
            language: template.language,
            name: unknown.to_string(),
        });
    }

    let rendered = placeholder_regex().replace_all(&template.skeleton, |caps: &regex::Captures| {
        values.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Window chosen from the span of the range when none was asked for
pub fn auto_window(range: &TimeRange, now: DateTime<Utc>) -> RelativeDuration {
    let minutes = range.span_minutes(now);
    if minutes <= 60 {
        RelativeDuration::minutes(1)
    } else if minutes <= 24 * 60 {
        RelativeDuration::hours(1)
    } else if minutes <= 31 * 24 * 60 {
        RelativeDuration::days(1)
    } else {
        RelativeDuration::days(7)
    }
}

/// Tag equality filters in rendering order: regions, sources, then extras
fn tag_filters(params: &QueryParameters) -> Vec<(&str, Vec<&str>)> {
    let mut filters: Vec<(&str, Vec<&str>)> = Vec::new();
    if !params.regions.is_empty() {
        filters.push(("region", params.regions.iter().map(String::as_str).collect()));
    }
    if !params.energy_sources.is_empty() {
        filters.push((
            "source",
            params.energy_sources.iter().map(String::as_str).collect(),
        ));
    }
    for (key, value) in &params.filters {
        filters.push((key.as_str(), vec![value.as_str()]));
    }
    filters
}

fn field_name(params: &QueryParameters) -> &str {
    params.field.as_deref().unwrap_or(DEFAULT_FIELD)
}

// ============================================
// Flux
// ============================================

fn flux_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{escaped}\"")
}

fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn flux_column(name: &str) -> String {
    if is_bare_identifier(name) {
        format!("r.{name}")
    } else {
        format!("r[{}]", flux_string(name))
    }
}

fn flux_time(bound: &TimeBound) -> String {
    match bound {
        TimeBound::Now => "now()".to_string(),
        TimeBound::Relative(d) => format!("-{d}"),
        TimeBound::Absolute(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

fn flux_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| flux_string(i)).collect();
    format!("[{}]", quoted.join(", "))
}

fn flux_values(
    params: &QueryParameters,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> BTreeMap<&'static str, String> {
    let mut v = BTreeMap::new();
    let window = params
        .window
        .unwrap_or_else(|| auto_window(&params.time_range, now));
    let aggregate_fn = params.aggregation.flux_fn().unwrap_or("last");

    v.insert("bucket", flux_string(&settings.bucket));
    v.insert("start", flux_time(&params.time_range.start));
    v.insert("stop", flux_time(&params.time_range.stop));

    let predicate = if params.measurement_types.is_empty() {
        "true".to_string()
    } else {
        params
            .measurement_types
            .iter()
            .map(|m| format!("r._measurement == {}", flux_string(m)))
            .collect::<Vec<_>>()
            .join(" or ")
    };
    v.insert("measurement_predicate", predicate);
    v.insert("field", flux_string(field_name(params)));

    let filters: String = tag_filters(params)
        .into_iter()
        .map(|(key, values)| {
            let column = flux_column(key);
            let clause = values
                .iter()
                .map(|value| format!("{column} == {}", flux_string(value)))
                .collect::<Vec<_>>()
                .join(" or ");
            format!("\n  |> filter(fn: (r) => {clause})")
        })
        .collect();
    v.insert("tag_filters", filters);

    v.insert("group_columns", flux_list(&params.group_by));
    v.insert(
        "group_stage",
        if params.group_by.is_empty() {
            String::new()
        } else {
            format!("\n  |> group(columns: {})", flux_list(&params.group_by))
        },
    );

    v.insert("window", window.to_string());
    v.insert("aggregate_fn", aggregate_fn.to_string());
    v.insert(
        "window_stage",
        match params.aggregation.flux_fn() {
            Some(f) => format!("\n  |> aggregateWindow(every: {window}, fn: {f}, createEmpty: false)"),
            None => String::new(),
        },
    );
    v.insert(
        "limit_stage",
        params
            .limit
            .map(|n| format!("\n  |> limit(n: {n})"))
            .unwrap_or_default(),
    );

    let peak_call = match (params.aggregation, params.limit) {
        (Aggregation::Min, Some(n)) => format!("bottom(n: {n})"),
        (Aggregation::Min, None) => "min()".to_string(),
        (_, Some(n)) => format!("top(n: {n})"),
        (_, None) => "max()".to_string(),
    };
    v.insert("peak_call", peak_call);

    v
}

// ============================================
// InfluxQL
// ============================================

fn influxql_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn influxql_ident(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn influxql_time(bound: &TimeBound) -> String {
    match bound {
        TimeBound::Now => "now()".to_string(),
        TimeBound::Relative(d) => format!("now() - {d}"),
        TimeBound::Absolute(t) => {
            influxql_string(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
    }
}

fn influxql_values(
    params: &QueryParameters,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> BTreeMap<&'static str, String> {
    let mut v = BTreeMap::new();
    let window = params
        .window
        .unwrap_or_else(|| auto_window(&params.time_range, now));
    let field = influxql_ident(field_name(params));
    let aggregate_fn = params.aggregation.influxql_fn().unwrap_or("LAST");
    let alias = influxql_ident(&format!(
        "{}_{}",
        aggregate_fn.to_lowercase(),
        field_name(params)
    ));

    v.insert("bucket", influxql_ident(&settings.bucket));
    v.insert("retention_policy", influxql_ident(&settings.retention_policy));
    v.insert("start", influxql_time(&params.time_range.start));
    v.insert("stop", influxql_time(&params.time_range.stop));

    let sources = params
        .measurement_types
        .iter()
        .map(|m| {
            format!(
                "{}.{}.{}",
                influxql_ident(&settings.bucket),
                influxql_ident(&settings.retention_policy),
                influxql_ident(m)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    v.insert("sources", sources);

    v.insert("field", field.clone());
    v.insert("value_alias", alias.clone());
    v.insert("aggregate_fn", aggregate_fn.to_string());
    v.insert(
        "selector",
        if params.aggregation.is_none() {
            field.clone()
        } else {
            format!("{aggregate_fn}({field}) AS {alias}")
        },
    );

    let peak_selector = match (params.aggregation, params.limit) {
        (Aggregation::Min, Some(n)) => format!("BOTTOM({field}, {n})"),
        (Aggregation::Min, None) => format!("MIN({field})"),
        (_, Some(n)) => format!("TOP({field}, {n})"),
        (_, None) => format!("MAX({field})"),
    };
    v.insert("peak_selector", peak_selector);

    let filters: String = tag_filters(params)
        .into_iter()
        .map(|(key, values)| {
            let column = influxql_ident(key);
            let clause = values
                .iter()
                .map(|value| format!("{column} = {}", influxql_string(value)))
                .collect::<Vec<_>>()
                .join(" OR ");
            format!(" AND ({clause})")
        })
        .collect();
    v.insert("tag_filters", filters);

    let tags: Vec<String> = params.group_by.iter().map(|g| influxql_ident(g)).collect();
    v.insert(
        "group_list",
        if tags.is_empty() {
            "*".to_string()
        } else {
            tags.join(", ")
        },
    );
    v.insert(
        "group_tags",
        tags.iter().map(|t| format!(", {t}")).collect::<String>(),
    );
    v.insert(
        "group_clause",
        if tags.is_empty() {
            String::new()
        } else {
            format!(" GROUP BY {}", tags.join(", "))
        },
    );

    let windowed = if !params.aggregation.is_none() {
        let mut dims = vec![format!("time({window})")];
        dims.extend(tags.iter().cloned());
        format!(" GROUP BY {} fill(none)", dims.join(", "))
    } else if !tags.is_empty() {
        format!(" GROUP BY {}", tags.join(", "))
    } else {
        String::new()
    };
    v.insert("windowed_group_clause", windowed);

    v.insert("window", window.to_string());
    v.insert(
        "limit_clause",
        params
            .limit
            .map(|n| format!(" LIMIT {n}"))
            .unwrap_or_default(),
    );

    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::templates::TemplateRegistry;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn full_params() -> QueryParameters {
        QueryParameters {
            time_range: TimeRange::last(RelativeDuration::days(7)),
            regions: BTreeSet::from(["southeast".to_string()]),
            energy_sources: BTreeSet::from(["hydro".to_string()]),
            measurement_types: BTreeSet::from(["generation".to_string()]),
            aggregation: Aggregation::Mean,
            filters: BTreeMap::from([("plant".to_string(), "itaipu".to_string())]),
            limit: Some(5),
            group_by: vec!["region".to_string()],
            window: None,
            field: None,
        }
    }

    #[test]
    fn test_every_template_renders_without_leftover_placeholders() {
        let registry = TemplateRegistry::builtin();
        let params = full_params();
        for template in registry.iter() {
            let rendered = render(template, &params, &RenderSettings::default(), now()).unwrap();
            assert!(
                !rendered.contains("{{"),
                "{}/{} left a placeholder: {}",
                template.intent,
                template.language,
                rendered
            );
        }
    }

    #[test]
    fn test_flux_quoting_and_time() {
        let registry = TemplateRegistry::builtin();
        let template = registry
            .get(QueryIntent::GenerationTrend, QueryLanguage::Flux)
            .unwrap();
        let rendered = render(template, &full_params(), &RenderSettings::default(), now()).unwrap();

        assert!(rendered.starts_with("from(bucket: \"energy\")"));
        assert!(rendered.contains("range(start: -7d, stop: now())"));
        assert!(rendered.contains("r._measurement == \"generation\""));
        assert!(rendered.contains("filter(fn: (r) => r.region == \"southeast\")"));
        assert!(rendered.contains("filter(fn: (r) => r.source == \"hydro\")"));
        assert!(rendered.contains("filter(fn: (r) => r.plant == \"itaipu\")"));
        assert!(rendered.contains("aggregateWindow(every: 1d, fn: mean, createEmpty: false)"));
        assert!(rendered.contains("group(columns: [\"region\"])"));
        assert!(rendered.contains("limit(n: 5)"));
    }

    #[test]
    fn test_influxql_quoting_and_time() {
        let registry = TemplateRegistry::builtin();
        let template = registry
            .get(QueryIntent::GenerationTrend, QueryLanguage::InfluxQl)
            .unwrap();
        let rendered = render(template, &full_params(), &RenderSettings::default(), now()).unwrap();

        assert_eq!(
            rendered,
            "SELECT MEAN(\"power_mw\") AS \"mean_power_mw\" FROM \"energy\".\"autogen\".\"generation\" \
             WHERE time >= now() - 7d AND time < now() AND (\"region\" = 'southeast') \
             AND (\"source\" = 'hydro') AND (\"plant\" = 'itaipu') \
             GROUP BY time(1d), \"region\" fill(none) LIMIT 5"
        );
    }

    #[test]
    fn test_absolute_times() {
        let mut params = full_params();
        params.time_range = TimeRange::absolute(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        );
        let registry = TemplateRegistry::builtin();

        let flux = registry
            .get(QueryIntent::GenericLookup, QueryLanguage::Flux)
            .unwrap();
        let rendered = render(flux, &params, &RenderSettings::default(), now()).unwrap();
        assert!(rendered.contains("range(start: 2024-01-01T00:00:00Z, stop: 2024-01-02T00:00:00Z)"));

        let sql = registry
            .get(QueryIntent::GenericLookup, QueryLanguage::InfluxQl)
            .unwrap();
        let rendered = render(sql, &params, &RenderSettings::default(), now()).unwrap();
        assert!(rendered.contains(
            "time >= '2024-01-01T00:00:00Z' AND time < '2024-01-02T00:00:00Z'"
        ));
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(flux_string(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(flux_string("${x}"), r#""\${x}""#);
        assert_eq!(influxql_string("o'neil"), r"'o\'neil'");
        assert_eq!(influxql_ident("my \"tag\""), r#""my \"tag\"""#);
        assert_eq!(flux_column("region"), "r.region");
        assert_eq!(flux_column("plant name"), "r[\"plant name\"]");
    }

    #[test]
    fn test_peak_selectors() {
        let registry = TemplateRegistry::builtin();
        let mut params = full_params();
        params.aggregation = Aggregation::Max;
        params.limit = None;

        let flux = registry
            .get(QueryIntent::PeakAnalysis, QueryLanguage::Flux)
            .unwrap();
        let rendered = render(flux, &params, &RenderSettings::default(), now()).unwrap();
        assert!(rendered.contains("|> max()"));

        params.aggregation = Aggregation::Min;
        params.limit = Some(3);
        let rendered = render(flux, &params, &RenderSettings::default(), now()).unwrap();
        assert!(rendered.contains("|> bottom(n: 3)"));

        let sql = registry
            .get(QueryIntent::PeakAnalysis, QueryLanguage::InfluxQl)
            .unwrap();
        let rendered = render(sql, &params, &RenderSettings::default(), now()).unwrap();
        assert!(rendered.starts_with("SELECT BOTTOM(\"power_mw\", 3) FROM"));
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let template = QueryTemplate::new(
            QueryIntent::GenericLookup,
            QueryLanguage::InfluxQl,
            "SELECT {{peak_call}} FROM {{sources}}",
            &[],
        );
        let err = render(&template, &full_params(), &RenderSettings::default(), now()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                intent: QueryIntent::GenericLookup,
                language: QueryLanguage::InfluxQl,
                name: "peak_call".to_string(),
            }
        );
    }

    #[test]
    fn test_auto_window() {
        assert_eq!(
            auto_window(&TimeRange::last(RelativeDuration::hours(1)), now()),
            RelativeDuration::minutes(1)
        );
        assert_eq!(
            auto_window(&TimeRange::default(), now()),
            RelativeDuration::hours(1)
        );
        assert_eq!(
            auto_window(&TimeRange::last(RelativeDuration::days(7)), now()),
            RelativeDuration::days(1)
        );
        assert_eq!(
            auto_window(&TimeRange::last(RelativeDuration::days(90)), now()),
            RelativeDuration::days(7)
        );
    }
}
