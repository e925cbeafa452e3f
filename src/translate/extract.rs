//! Parameter extractors
//!
//! Each extractor is a pure function over a normalized question plus the
//! caller's context. Pattern tables are ordered and the first match wins.
//! Extractors never fail: a miss yields the default value with
//! `matched == false`, which lowers confidence but never aborts translation.

use crate::convert::field_for_unit;
use crate::translate::normalize::NormalizedQuestion;
use crate::translate::synonyms::{self, SynonymTable};
use crate::translate::types::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A value pulled out of a question, and whether anything actually matched
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub value: T,
    pub matched: bool,
}

impl<T> Extracted<T> {
    pub fn matched(value: T) -> Self {
        Self {
            value,
            matched: true,
        }
    }

    pub fn default_value(value: T) -> Self {
        Self {
            value,
            matched: false,
        }
    }
}

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

fn parse_count(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().or_else(|| {
        NUMBER_WORDS
            .iter()
            .find(|(word, _)| *word == s)
            .map(|(_, n)| *n)
    })
}

fn iso_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b\d{4}-\d{2}-\d{2}(?:t\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:z|[+-]\d{2}:\d{2})?)?",
        )
        .expect("valid ISO-8601 pattern")
    })
}

fn last_n_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:last|past|previous)\s+(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s*(minutes|minute|mins|min|hours|hour|hrs|hr|h|days|day|d|weeks|week|w|months|month|years|year)\b",
        )
        .expect("valid relative range pattern")
    })
}

fn last_unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:last|past|previous)\s+(minute|hour|day|week|month|year)\b")
            .expect("valid single-unit range pattern")
    })
}

fn limit_regexes() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"\b(?:top|first|limit|limit to|only)\s+(\d+)\b")
                .expect("valid limit pattern"),
            Regex::new(
                r"\b(\d+)\s+(?:highest|largest|biggest|lowest|smallest|results|records|rows|entries|readings)\b",
            )
            .expect("valid trailing limit pattern"),
        ]
    })
}

fn group_by_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:by|per|for each|each|across)\s+(regions|region|subsystems|subsystem|sources|source|fuels|fuel|technologies|technology|plants|plant|stations|station|hour|day|week|month)\b",
        )
        .expect("valid group-by pattern")
    })
}

/// Parse an ISO-8601 date or datetime as it appears in normalized text
fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    let upper = text.to_uppercase();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&upper) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(upper.trim_end_matches('Z'), fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(&upper, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = t
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| t.naive_utc());
    Utc.from_utc_datetime(&midnight)
}

/// Time range: context, then absolute timestamps, then relative phrases,
/// then the last 24 hours
pub fn time_range(
    question: &NormalizedQuestion,
    context: &TranslationContext,
    now: DateTime<Utc>,
) -> Extracted<TimeRange> {
    if let Some(range) = context.time_range {
        return Extracted::matched(range);
    }

    let text = question.as_str();

    let mut instants: Vec<DateTime<Utc>> = iso_regex()
        .find_iter(text)
        .filter_map(|m| parse_iso(m.as_str()))
        .collect();
    instants.sort();
    match instants.as_slice() {
        [] => {}
        [only] => {
            return Extracted::matched(TimeRange::new(TimeBound::Absolute(*only), TimeBound::Now))
        }
        [first, .., last] => return Extracted::matched(TimeRange::absolute(*first, *last)),
    }

    if let Some(caps) = last_n_regex().captures(text) {
        let duration = parse_count(&caps[1])
            .filter(|n| *n > 0)
            .and_then(|n| RelativeDuration::from_calendar_unit(n, &caps[2]));
        if let Some(duration) = duration {
            return Extracted::matched(TimeRange::last(duration));
        }
    }

    if let Some(caps) = last_unit_regex().captures(text) {
        if let Some(duration) = RelativeDuration::from_calendar_unit(1, &caps[1]) {
            return Extracted::matched(TimeRange::last(duration));
        }
    }

    if question.contains_phrase("yesterday") {
        let today = start_of_day(now);
        return Extracted::matched(TimeRange::absolute(today - chrono::Duration::days(1), today));
    }

    if question.contains_phrase("today") {
        return Extracted::matched(TimeRange::new(
            TimeBound::Absolute(start_of_day(now)),
            TimeBound::Now,
        ));
    }

    Extracted::default_value(TimeRange::default())
}

fn set_from_table(
    question: &NormalizedQuestion,
    overrides: Option<&Vec<String>>,
    table: SynonymTable,
) -> Extracted<BTreeSet<String>> {
    if let Some(values) = overrides {
        let set: BTreeSet<String> = values
            .iter()
            .map(|v| synonyms::canonicalize_or_keep(v, table))
            .filter(|v| !v.is_empty())
            .collect();
        return Extracted::matched(set);
    }

    let found = synonyms::match_all(question, table);
    if found.is_empty() {
        Extracted::default_value(found)
    } else {
        Extracted::matched(found)
    }
}

pub fn regions(
    question: &NormalizedQuestion,
    context: &TranslationContext,
) -> Extracted<BTreeSet<String>> {
    set_from_table(question, context.regions.as_ref(), synonyms::REGIONS)
}

pub fn energy_sources(
    question: &NormalizedQuestion,
    context: &TranslationContext,
) -> Extracted<BTreeSet<String>> {
    set_from_table(
        question,
        context.energy_sources.as_ref(),
        synonyms::ENERGY_SOURCES,
    )
}

pub fn measurement_types(
    question: &NormalizedQuestion,
    context: &TranslationContext,
) -> Extracted<BTreeSet<String>> {
    set_from_table(
        question,
        context.measurement_types.as_ref(),
        synonyms::MEASUREMENT_TYPES,
    )
}

/// Keyword → aggregation, in priority order
const AGGREGATION_KEYWORDS: &[(&str, Aggregation)] = &[
    ("average", Aggregation::Mean),
    ("avg", Aggregation::Mean),
    ("mean", Aggregation::Mean),
    ("média", Aggregation::Mean),
    ("total", Aggregation::Sum),
    ("sum", Aggregation::Sum),
    ("cumulative", Aggregation::Sum),
    ("peak", Aggregation::Max),
    ("maximum", Aggregation::Max),
    ("max", Aggregation::Max),
    ("highest", Aggregation::Max),
    ("minimum", Aggregation::Min),
    ("lowest", Aggregation::Min),
    ("how many", Aggregation::Count),
    ("number of", Aggregation::Count),
    ("count", Aggregation::Count),
];

pub fn aggregation(
    question: &NormalizedQuestion,
    context: &TranslationContext,
) -> Extracted<Aggregation> {
    if let Some(agg) = context.aggregation {
        return Extracted::matched(agg);
    }

    AGGREGATION_KEYWORDS
        .iter()
        .find(|(keyword, _)| question.contains_phrase(keyword))
        .map(|(_, agg)| Extracted::matched(*agg))
        .unwrap_or_else(|| Extracted::default_value(Aggregation::None))
}

pub fn limit(question: &NormalizedQuestion, context: &TranslationContext) -> Extracted<Option<usize>> {
    if let Some(n) = context.limit {
        return Extracted::matched(Some(n));
    }

    limit_regexes()
        .iter()
        .find_map(|re| re.captures(question.as_str()))
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| Extracted::matched(Some(n)))
        .unwrap_or_else(|| Extracted::default_value(None))
}

/// Map a dimension word to the tag key it groups on
fn dimension_tag(word: &str) -> Option<&'static str> {
    match word {
        "region" | "regions" | "subsystem" | "subsystems" => Some("region"),
        "source" | "sources" | "fuel" | "fuels" | "technology" | "technologies" => Some("source"),
        "plant" | "plants" | "station" | "stations" => Some("plant"),
        "state" | "states" => Some("state"),
        _ => None,
    }
}

fn window_word(word: &str) -> Option<RelativeDuration> {
    match word {
        "hour" | "hourly" => Some(RelativeDuration::hours(1)),
        "day" | "daily" => Some(RelativeDuration::days(1)),
        "week" | "weekly" => Some(RelativeDuration::days(7)),
        "month" | "monthly" => Some(RelativeDuration::days(30)),
        _ => None,
    }
}

/// Grouping dimensions and aggregation window
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouping {
    pub group_by: Vec<String>,
    pub window: Option<RelativeDuration>,
}

pub fn grouping(question: &NormalizedQuestion, context: &TranslationContext) -> Extracted<Grouping> {
    let mut grouping = Grouping::default();

    for caps in group_by_regex().captures_iter(question.as_str()) {
        let word = &caps[1];
        if let Some(tag) = dimension_tag(word) {
            if !grouping.group_by.iter().any(|g| g == tag) {
                grouping.group_by.push(tag.to_string());
            }
        } else if grouping.window.is_none() {
            grouping.window = window_word(word);
        }
    }

    if grouping.window.is_none() {
        grouping.window = question.tokens().find_map(window_word_adverb);
    }

    if let Some(dims) = &context.group_by {
        grouping.group_by.clear();
        for dim in dims {
            let key = dimension_tag(&dim.to_lowercase())
                .map(str::to_string)
                .unwrap_or_else(|| dim.trim().to_lowercase());
            if !key.is_empty() && !grouping.group_by.contains(&key) {
                grouping.group_by.push(key);
            }
        }
        return Extracted::matched(grouping);
    }

    let matched = !grouping.group_by.is_empty() || grouping.window.is_some();
    Extracted { value: grouping, matched }
}

fn window_word_adverb(token: &str) -> Option<RelativeDuration> {
    match token {
        "hourly" | "daily" | "weekly" | "monthly" => window_word(token),
        _ => None,
    }
}

/// Field selected by a unit mention ("in mwh"); `%` is too ambiguous in prose
pub fn field(question: &NormalizedQuestion) -> Extracted<Option<String>> {
    question
        .tokens()
        .filter(|t| *t != "%")
        .find_map(field_for_unit)
        .map(|f| Extracted::matched(Some(f.to_string())))
        .unwrap_or_else(|| Extracted::default_value(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> NormalizedQuestion {
        NormalizedQuestion::new(s)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()
    }

    fn empty() -> TranslationContext {
        TranslationContext::default()
    }

    #[test]
    fn test_time_range_last_week() {
        let range = time_range(&q("hydro generation last week"), &empty(), now());
        assert!(range.matched);
        assert_eq!(range.value, TimeRange::last(RelativeDuration::days(7)));
    }

    #[test]
    fn test_time_range_last_n_units() {
        let range = time_range(&q("wind output over the past 3 hours"), &empty(), now());
        assert_eq!(range.value, TimeRange::last(RelativeDuration::hours(3)));

        let range = time_range(&q("demand in the last two days"), &empty(), now());
        assert_eq!(range.value, TimeRange::last(RelativeDuration::days(2)));

        let range = time_range(&q("load for the last 24h"), &empty(), now());
        assert_eq!(range.value, TimeRange::last(RelativeDuration::hours(24)));
    }

    #[test]
    fn test_time_range_yesterday_is_calendar_day() {
        let range = time_range(&q("solar yesterday"), &empty(), now());
        assert!(range.matched);
        assert_eq!(
            range.value,
            TimeRange::absolute(
                Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            )
        );
    }

    #[test]
    fn test_time_range_absolute_dates() {
        let range = time_range(
            &q("generation between 2024-02-01 and 2024-01-01T06:00:00Z"),
            &empty(),
            now(),
        );
        assert_eq!(
            range.value,
            TimeRange::absolute(
                Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            )
        );

        let range = time_range(&q("since 2024-03-01"), &empty(), now());
        assert_eq!(
            range.value,
            TimeRange::new(
                TimeBound::Absolute(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
                TimeBound::Now
            )
        );
    }

    #[test]
    fn test_time_range_defaults_to_last_day() {
        let range = time_range(&q("hydro generation"), &empty(), now());
        assert!(!range.matched);
        assert_eq!(range.value, TimeRange::default());
    }

    #[test]
    fn test_context_overrides_text() {
        let ctx = TranslationContext::new()
            .time_range(TimeRange::last(RelativeDuration::days(30)))
            .regions(&["Nordeste"])
            .aggregation(Aggregation::Sum);

        let question = q("average generation in the south last week");
        assert_eq!(
            time_range(&question, &ctx, now()).value,
            TimeRange::last(RelativeDuration::days(30))
        );
        assert_eq!(
            regions(&question, &ctx).value,
            BTreeSet::from(["northeast".to_string()])
        );
        assert_eq!(aggregation(&question, &ctx).value, Aggregation::Sum);
    }

    #[test]
    fn test_aggregation_keywords() {
        assert_eq!(
            aggregation(&q("average hydro"), &empty()).value,
            Aggregation::Mean
        );
        assert_eq!(aggregation(&q("total wind"), &empty()).value, Aggregation::Sum);
        assert_eq!(aggregation(&q("peak demand"), &empty()).value, Aggregation::Max);
        assert_eq!(
            aggregation(&q("lowest load"), &empty()).value,
            Aggregation::Min
        );

        let none = aggregation(&q("solar generation"), &empty());
        assert!(!none.matched);
        assert_eq!(none.value, Aggregation::None);
    }

    #[test]
    fn test_minute_unit_is_not_an_aggregation() {
        let question = q("hydro generation over the last 30 min");
        let agg = aggregation(&question, &empty());
        assert!(!agg.matched);
        assert_eq!(agg.value, Aggregation::None);

        let range = time_range(&question, &empty(), now());
        assert_eq!(range.value, TimeRange::last(RelativeDuration::minutes(30)));

        assert_eq!(
            aggregation(&q("minimum wind output in the last 30 mins"), &empty()).value,
            Aggregation::Min
        );
    }

    #[test]
    fn test_limit_extraction() {
        assert_eq!(limit(&q("top 5 plants"), &empty()).value, Some(5));
        assert_eq!(limit(&q("the 10 highest readings"), &empty()).value, Some(10));
        assert_eq!(limit(&q("the last 7 days"), &empty()).value, None);
        assert_eq!(limit(&q("top 0"), &empty()).value, None);
    }

    #[test]
    fn test_grouping_extraction() {
        let g = grouping(&q("generation by region and per source"), &empty());
        assert!(g.matched);
        assert_eq!(g.value.group_by, vec!["region", "source"]);
        assert_eq!(g.value.window, None);

        let g = grouping(&q("daily wind generation"), &empty());
        assert_eq!(g.value.window, Some(RelativeDuration::days(1)));
        assert!(g.value.group_by.is_empty());

        let g = grouping(&q("load per hour for each subsystem"), &empty());
        assert_eq!(g.value.window, Some(RelativeDuration::hours(1)));
        assert_eq!(g.value.group_by, vec!["region"]);

        assert!(!grouping(&q("hydro last week"), &empty()).matched);
    }

    #[test]
    fn test_field_from_unit() {
        assert_eq!(
            field(&q("total generation in MWh")).value,
            Some("energy_mwh".to_string())
        );
        assert!(!field(&q("total generation")).matched);
    }
}
