//! Question normalization and phrase matching
//!
//! Every pattern table in the translator matches against a
//! `NormalizedQuestion`, never the raw input.

/// Lower-cased, punctuation-stripped, whitespace-collapsed question text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedQuestion(String);

/// Characters kept inside tokens; they appear in timestamps, units and
/// abbreviations ("2024-01-01t00:00", "brl/mwh", "centro-oeste")
const TOKEN_PUNCTUATION: &[char] = &['-', ':', '.', '+', '_', '/', '%'];

impl NormalizedQuestion {
    pub fn new(question: &str) -> Self {
        let mapped: String = question
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| {
                if c.is_alphanumeric() || TOKEN_PUNCTUATION.contains(&c) {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        let tokens: Vec<&str> = mapped
            .split_whitespace()
            .map(|t| t.trim_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        Self(tokens.join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `phrase` occurs on token boundaries
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        !self.phrase_spans(phrase).is_empty()
    }

    /// Byte spans of every token-aligned occurrence of `phrase`
    pub fn phrase_spans(&self, phrase: &str) -> Vec<(usize, usize)> {
        if phrase.is_empty() {
            return Vec::new();
        }
        let text = self.0.as_str();
        text.match_indices(phrase)
            .filter(|(start, _)| {
                let end = start + phrase.len();
                let before_ok = *start == 0 || text.as_bytes()[start - 1] == b' ';
                let after_ok = end == text.len() || text.as_bytes()[end] == b' ';
                before_ok && after_ok
            })
            .map(|(start, _)| (start, start + phrase.len()))
            .collect()
    }

    /// Iterate over tokens
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|t| !t.is_empty())
    }
}

impl std::fmt::Display for NormalizedQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
