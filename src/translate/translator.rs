//! Query Translator
//!
//! The single entry point for turning a question into a query:
//!
//! ```text
//! question → normalize → classify → extract → defaults → template → render → confidence
//! ```
//!
//! Translation is a pure function of the question, language, context and
//! the clock reading; it performs no I/O and holds no mutable state.

use crate::translate::error::{TranslationError, TranslationOutcome};
use crate::translate::extract;
use crate::translate::intent::{classify, Classification};
use crate::translate::normalize::NormalizedQuestion;
use crate::translate::render::{render, RenderSettings};
use crate::translate::templates::TemplateRegistry;
use crate::translate::types::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Source of the current instant for relative phrases like "yesterday"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Weight of intent-match strength in the confidence score; the rest is
/// parameter resolution
const INTENT_WEIGHT: f64 = 0.6;

/// Number of extractors that feed the resolution part of confidence
const SCORED_EXTRACTORS: f64 = 5.0;

/// Translates natural-language questions into Flux or InfluxQL
#[derive(Clone)]
pub struct Translator<'r> {
    registry: &'r TemplateRegistry,
    settings: RenderSettings,
    clock: Arc<dyn Clock>,
}

impl Default for Translator<'static> {
    fn default() -> Self {
        Self::new(TemplateRegistry::builtin())
    }
}

impl<'r> Translator<'r> {
    /// Create a translator over a registry, using the wall clock
    pub fn new(registry: &'r TemplateRegistry) -> Self {
        Self {
            registry,
            settings: RenderSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder: set the bucket queries read from
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.settings.bucket = bucket.into();
        self
    }

    /// Builder: replace the render settings
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder: replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Translate a question into an executable query
    ///
    /// Fails only when the question is empty, when the chosen intent's
    /// required parameters cannot be resolved, or when the registry lacks
    /// a template for the pair.
    pub fn translate(
        &self,
        question: &str,
        language: QueryLanguage,
        context: &TranslationContext,
    ) -> TranslationOutcome<TranslationResult> {
        let normalized = NormalizedQuestion::new(question);
        if normalized.is_empty() {
            return Err(TranslationError::EmptyQuestion);
        }

        let now = self.clock.now();
        let classification = classify(&normalized);
        let intent = classification.intent;

        let (mut params, matched_extractors) = extract_parameters(&normalized, context, now);
        apply_intent_defaults(intent, &mut params);

        let template = self.registry.get(intent, language)?;

        let missing: Vec<ParameterKey> = template
            .required_parameters
            .iter()
            .copied()
            .filter(|key| !params.is_resolved(*key))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(
                intent = %intent,
                missing = ?missing,
                "Required parameters unresolved"
            );
            return Err(TranslationError::MissingParameters { intent, missing });
        }

        let rendered_query = render(template, &params, &self.settings, now)?;
        let confidence_score = confidence(&classification, matched_extractors);

        tracing::debug!(
            question = %normalized,
            intent = %intent,
            language = %language,
            confidence = confidence_score,
            "Translated question"
        );

        Ok(TranslationResult {
            query_type: intent,
            language,
            rendered_query,
            parameters: params,
            confidence_score,
        })
    }
}

/// Run every extractor; returns parameters and how many scored extractors matched
fn extract_parameters(
    question: &NormalizedQuestion,
    context: &TranslationContext,
    now: DateTime<Utc>,
) -> (QueryParameters, usize) {
    let time_range = extract::time_range(question, context, now);
    let regions = extract::regions(question, context);
    let energy_sources = extract::energy_sources(question, context);
    let measurement_types = extract::measurement_types(question, context);
    let aggregation = extract::aggregation(question, context);
    let limit = extract::limit(question, context);
    let grouping = extract::grouping(question, context);
    let field = extract::field(question);

    let matched = [
        time_range.matched,
        regions.matched,
        energy_sources.matched,
        measurement_types.matched,
        aggregation.matched,
    ]
    .iter()
    .filter(|m| **m)
    .count();

    let params = QueryParameters {
        time_range: time_range.value,
        regions: regions.value,
        energy_sources: energy_sources.value,
        measurement_types: measurement_types.value,
        aggregation: aggregation.value,
        filters: context.filters.clone(),
        limit: limit.value,
        group_by: grouping.value.group_by,
        window: grouping.value.window,
        field: field.value,
    };

    (params, matched)
}

fn default_set(value: &str) -> BTreeSet<String> {
    BTreeSet::from([value.to_string()])
}

/// Fill in what each intent needs when the question left it out
fn apply_intent_defaults(intent: QueryIntent, params: &mut QueryParameters) {
    match intent {
        QueryIntent::GenerationTrend => {
            if params.measurement_types.is_empty() {
                params.measurement_types = default_set("generation");
            }
            if params.aggregation.is_none() {
                params.aggregation = Aggregation::Mean;
            }
        }
        QueryIntent::ConsumptionComparison => {
            if params.measurement_types.is_empty() {
                params.measurement_types = default_set("consumption");
            }
            if params.aggregation.is_none() {
                params.aggregation = Aggregation::Mean;
            }
            if params.group_by.is_empty() {
                let by_source = params.energy_sources.len() > 1 && params.regions.len() <= 1;
                params.group_by = vec![if by_source { "source" } else { "region" }.to_string()];
            }
        }
        QueryIntent::PeakAnalysis => {
            if params.measurement_types.is_empty() {
                params.measurement_types = default_set("generation");
            }
            if !matches!(params.aggregation, Aggregation::Max | Aggregation::Min) {
                params.aggregation = Aggregation::Max;
            }
        }
        QueryIntent::GenerationMix => {
            if params.measurement_types.is_empty() {
                params.measurement_types = default_set("generation");
            }
            if params.aggregation.is_none() {
                params.aggregation = Aggregation::Sum;
            }
            if params.group_by.is_empty() {
                params.group_by = vec!["source".to_string()];
            }
        }
        QueryIntent::CapacityFactor => {
            params.measurement_types = default_set("generation");
            if params.group_by.is_empty() {
                params.group_by = vec!["source".to_string()];
            }
        }
        QueryIntent::GenericLookup => {
            if params.measurement_types.is_empty() {
                params.measurement_types = default_set("generation");
            }
        }
    }
}

/// Weighted blend of intent strength and extractor hits, rounded to 3 places
fn confidence(classification: &Classification, matched_extractors: usize) -> f64 {
    let resolution = matched_extractors as f64 / SCORED_EXTRACTORS;
    let raw = INTENT_WEIGHT * classification.strength + (1.0 - INTENT_WEIGHT) * resolution;
    (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::error::TemplateError;
    use crate::translate::templates::QueryTemplate;
    use chrono::TimeZone;

    fn translator() -> Translator<'static> {
        Translator::default().with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        )))
    }

    const HYDRO_QUESTION: &str =
        "What was the average hydro generation in the southeast region last week?";

    #[test]
    fn test_hydro_southeast_flux() {
        let result = translator()
            .translate(HYDRO_QUESTION, QueryLanguage::Flux, &TranslationContext::default())
            .unwrap();

        assert_eq!(result.query_type, QueryIntent::GenerationTrend);
        assert_eq!(result.language, QueryLanguage::Flux);
        assert_eq!(result.parameters.regions, default_set("southeast"));
        assert_eq!(result.parameters.energy_sources, default_set("hydro"));
        assert_eq!(result.parameters.aggregation, Aggregation::Mean);
        assert_eq!(
            result.parameters.time_range,
            TimeRange::last(RelativeDuration::days(7))
        );

        let q = &result.rendered_query;
        assert!(q.contains("range(start: -7d, stop: now())"));
        assert!(q.contains("r.region == \"southeast\""));
        assert!(q.contains("r.source == \"hydro\""));
        assert!(q.contains("fn: mean"));
        assert_eq!(result.confidence_score, 1.0);
    }

    #[test]
    fn test_hydro_southeast_influxql() {
        let result = translator()
            .translate(
                HYDRO_QUESTION,
                QueryLanguage::InfluxQl,
                &TranslationContext::default(),
            )
            .unwrap();

        let q = &result.rendered_query;
        assert!(q.starts_with("SELECT MEAN(\"power_mw\")"));
        assert!(q.contains("time >= now() - 7d"));
        assert!(q.contains("(\"region\" = 'southeast')"));
        assert!(q.contains("(\"source\" = 'hydro')"));
        assert!(q.contains("GROUP BY time(1d) fill(none)"));
    }

    #[test]
    fn test_empty_question_fails() {
        let t = translator();
        for question in ["", "   ", "\n\t", "??"] {
            assert_eq!(
                t.translate(question, QueryLanguage::Flux, &TranslationContext::default()),
                Err(TranslationError::EmptyQuestion)
            );
        }
    }

    #[test]
    fn test_translation_is_deterministic() {
        let t = translator();
        let ctx = TranslationContext::new().limit(3);
        let questions = [
            HYDRO_QUESTION,
            "compare demand between south and northeast yesterday",
            "top 3 peak wind readings",
            "show solar numbers",
        ];
        for q in questions {
            for &lang in QueryLanguage::all() {
                let a = t.translate(q, lang, &ctx).unwrap();
                let b = t.translate(q, lang, &ctx).unwrap();
                assert_eq!(a.rendered_query, b.rendered_query);
                assert_eq!(a.confidence_score.to_bits(), b.confidence_score.to_bits());
            }
        }
    }

    #[test]
    fn test_time_range_always_populated() {
        let result = translator()
            .translate("wind", QueryLanguage::Flux, &TranslationContext::default())
            .unwrap();
        assert_eq!(result.parameters.time_range, TimeRange::default());
        assert!(result.rendered_query.contains("range(start: -24h, stop: now())"));
    }

    #[test]
    fn test_enormous_relative_range_translates() {
        for language in [QueryLanguage::Flux, QueryLanguage::InfluxQl] {
            let result = translator()
                .translate(
                    "average hydro generation over the last 1000000 years",
                    language,
                    &TranslationContext::default(),
                )
                .unwrap();
            assert_eq!(
                result.parameters.time_range,
                TimeRange::last(RelativeDuration::days(365_000_000))
            );
            assert!(result.rendered_query.contains("365000000d"));
        }
    }

    #[test]
    fn test_capacity_factor_requires_a_source() {
        let err = translator()
            .translate(
                "What is the capacity factor in the northeast?",
                QueryLanguage::Flux,
                &TranslationContext::default(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            TranslationError::MissingParameters {
                intent: QueryIntent::CapacityFactor,
                missing: vec![ParameterKey::EnergySources],
            }
        );

        // Supplying the source through context resolves it
        let ctx = TranslationContext::new().energy_sources(&["eólica"]);
        let result = translator()
            .translate(
                "What is the capacity factor in the northeast?",
                QueryLanguage::Flux,
                &ctx,
            )
            .unwrap();
        assert_eq!(result.parameters.energy_sources, default_set("wind"));
        assert!(result.rendered_query.contains("r.capacity_mw"));
    }

    #[test]
    fn test_consumption_comparison_groups_by_region() {
        let result = translator()
            .translate(
                "Compare electricity demand between the south and the northeast",
                QueryLanguage::InfluxQl,
                &TranslationContext::default(),
            )
            .unwrap();
        assert_eq!(result.query_type, QueryIntent::ConsumptionComparison);
        assert_eq!(result.parameters.group_by, vec!["region"]);
        assert!(result
            .rendered_query
            .contains("FROM \"energy\".\"autogen\".\"consumption\""));
        assert!(result
            .rendered_query
            .contains("(\"region\" = 'northeast' OR \"region\" = 'south')"));
        assert!(result.rendered_query.ends_with("GROUP BY \"region\""));
    }

    #[test]
    fn test_peak_with_limit_uses_top() {
        let result = translator()
            .translate(
                "top 5 peak wind generation readings last month",
                QueryLanguage::Flux,
                &TranslationContext::default(),
            )
            .unwrap();
        assert_eq!(result.query_type, QueryIntent::PeakAnalysis);
        assert_eq!(result.parameters.limit, Some(5));
        assert!(result.rendered_query.contains("|> top(n: 5)"));
        assert!(result.rendered_query.contains("range(start: -30d"));
    }

    #[test]
    fn test_context_takes_precedence() {
        let ctx = TranslationContext::new()
            .regions(&["norte"])
            .aggregation(Aggregation::Sum)
            .filter("plant", "belo monte");
        let result = translator()
            .translate(HYDRO_QUESTION, QueryLanguage::Flux, &ctx)
            .unwrap();
        assert_eq!(result.parameters.regions, default_set("north"));
        assert_eq!(result.parameters.aggregation, Aggregation::Sum);
        assert!(result.rendered_query.contains("r.plant == \"belo monte\""));
        assert!(!result.rendered_query.contains("southeast"));
    }

    #[test]
    fn test_generic_lookup_has_lower_confidence() {
        let result = translator()
            .translate("show me wind", QueryLanguage::Flux, &TranslationContext::default())
            .unwrap();
        assert_eq!(result.query_type, QueryIntent::GenericLookup);
        // No intent strength, one of five extractors (sources) matched
        assert_eq!(result.confidence_score, 0.08);
        assert!((0.0..=1.0).contains(&result.confidence_score));
    }

    #[test]
    fn test_substitute_registry() {
        let registry = TemplateRegistry::from_templates(vec![QueryTemplate::new(
            QueryIntent::GenericLookup,
            QueryLanguage::Flux,
            "from(bucket: {{bucket}}) |> range(start: {{start}})",
            &[ParameterKey::TimeRange],
        )]);
        let t = Translator::new(&registry).with_bucket("test-bucket");

        let result = t
            .translate("show me wind", QueryLanguage::Flux, &TranslationContext::default())
            .unwrap();
        assert_eq!(
            result.rendered_query,
            "from(bucket: \"test-bucket\") |> range(start: -24h)"
        );

        let err = t
            .translate("show me wind", QueryLanguage::InfluxQl, &TranslationContext::default())
            .unwrap_err();
        assert_eq!(
            err,
            TranslationError::Template(TemplateError::NotFound {
                intent: QueryIntent::GenericLookup,
                language: QueryLanguage::InfluxQl,
            })
        );
    }
}
