//! Translation error types
//!
//! `TranslationError` means the caller must rephrase or supply context;
//! `TemplateError` means the registry is misconfigured and is never retried.

use crate::translate::types::{ParameterKey, QueryIntent, QueryLanguage};
use thiserror::Error;

/// Errors surfaced by `Translator::translate`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// The question was empty or whitespace-only
    #[error("Question is empty")]
    EmptyQuestion,

    /// An intent was identified but its template cannot be filled
    #[error("Cannot build a {intent} query: missing {}", join_keys(.missing))]
    MissingParameters {
        intent: QueryIntent,
        missing: Vec<ParameterKey>,
    },

    /// The template registry is misconfigured
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl TranslationError {
    /// Whether a caller could succeed by rephrasing or adding context
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, TranslationError::Template(_))
    }
}

fn join_keys(keys: &[ParameterKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Registry and rendering failures; these are programming errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("No template registered for {intent} in {language}")]
    NotFound {
        intent: QueryIntent,
        language: QueryLanguage,
    },

    #[error("Template {intent}/{language} uses unknown placeholder '{name}'")]
    UnknownPlaceholder {
        intent: QueryIntent,
        language: QueryLanguage,
        name: String,
    },
}

/// Result type for translation
pub type TranslationOutcome<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranslationError::MissingParameters {
            intent: QueryIntent::CapacityFactor,
            missing: vec![ParameterKey::EnergySources, ParameterKey::GroupBy],
        };
        assert_eq!(
            err.to_string(),
            "Cannot build a capacity_factor query: missing energy_sources, group_by"
        );

        let err: TranslationError = TemplateError::NotFound {
            intent: QueryIntent::PeakAnalysis,
            language: QueryLanguage::InfluxQl,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "No template registered for peak_analysis in influxql"
        );
        assert!(!err.is_caller_error());
        assert!(TranslationError::EmptyQuestion.is_caller_error());
    }
}
