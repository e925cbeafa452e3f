//! Intent classification
//!
//! Every intent owns a list of weighted keyword groups. A group scores its
//! weight once if any of its phrases occurs in the question. The highest
//! total wins; ties go to the intent declared first in `QueryIntent::all()`.

use crate::translate::normalize::NormalizedQuestion;
use crate::translate::types::QueryIntent;

/// A set of interchangeable phrases and the weight it contributes
#[derive(Debug, Clone, Copy)]
pub struct KeywordGroup {
    pub phrases: &'static [&'static str],
    pub weight: u32,
}

const GENERATION_WORDS: &[&str] = &[
    "generation",
    "generated",
    "generate",
    "production",
    "produced",
    "output",
    "geração",
    "geracao",
];

const CONSUMPTION_WORDS: &[&str] = &[
    "consumption",
    "consumed",
    "demand",
    "load",
    "usage",
    "consumo",
    "carga",
];

impl QueryIntent {
    /// Keyword groups that identify this intent
    pub fn keyword_groups(&self) -> &'static [KeywordGroup] {
        match self {
            QueryIntent::CapacityFactor => &[
                KeywordGroup {
                    phrases: &[
                        "capacity factor",
                        "load factor",
                        "utilization",
                        "utilisation",
                        "fator de capacidade",
                    ],
                    weight: 3,
                },
                KeywordGroup {
                    phrases: &["efficiency", "installed capacity", "capacity"],
                    weight: 1,
                },
            ],
            QueryIntent::PeakAnalysis => &[
                KeywordGroup {
                    phrases: &[
                        "peak",
                        "peaks",
                        "highest",
                        "maximum",
                        "max",
                        "record",
                        "lowest",
                        "minimum",
                        "pico",
                    ],
                    weight: 2,
                },
                KeywordGroup {
                    phrases: &["when", "what time", "which hour", "which day", "at what"],
                    weight: 1,
                },
            ],
            QueryIntent::GenerationMix => &[
                KeywordGroup {
                    phrases: &[
                        "mix",
                        "share",
                        "breakdown",
                        "composition",
                        "proportion",
                        "percentage of",
                        "contribution",
                        "matriz",
                    ],
                    weight: 2,
                },
                KeywordGroup {
                    phrases: GENERATION_WORDS,
                    weight: 1,
                },
            ],
            QueryIntent::ConsumptionComparison => &[
                KeywordGroup {
                    phrases: CONSUMPTION_WORDS,
                    weight: 2,
                },
                KeywordGroup {
                    phrases: &[
                        "compare",
                        "comparison",
                        "versus",
                        "vs",
                        "between",
                        "against",
                        "difference",
                        "relative to",
                    ],
                    weight: 2,
                },
            ],
            QueryIntent::GenerationTrend => &[
                KeywordGroup {
                    phrases: GENERATION_WORDS,
                    weight: 2,
                },
                KeywordGroup {
                    phrases: &[
                        "trend",
                        "over time",
                        "evolution",
                        "history",
                        "historical",
                        "average",
                        "evolve",
                        "hourly",
                        "daily",
                        "weekly",
                        "monthly",
                    ],
                    weight: 1,
                },
            ],
            QueryIntent::GenericLookup => &[],
        }
    }

    fn total_weight(&self) -> u32 {
        self.keyword_groups().iter().map(|g| g.weight).sum()
    }
}

/// Result of scoring a question against all intents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: QueryIntent,
    /// Weight of the matched groups
    pub score: u32,
    /// Number of groups that matched
    pub groups_matched: usize,
    /// `score` over the intent's total weight, in [0, 1]
    pub strength: f64,
}

/// Score a question against one intent
pub fn score(question: &NormalizedQuestion, intent: QueryIntent) -> (u32, usize) {
    intent
        .keyword_groups()
        .iter()
        .filter(|group| group.phrases.iter().any(|p| question.contains_phrase(p)))
        .fold((0, 0), |(score, n), group| (score + group.weight, n + 1))
}

/// Pick the best intent for a question
pub fn classify(question: &NormalizedQuestion) -> Classification {
    let mut best = Classification {
        intent: QueryIntent::GenericLookup,
        score: 0,
        groups_matched: 0,
        strength: 0.0,
    };

    for &intent in QueryIntent::all() {
        let (score, groups_matched) = score(question, intent);
        // Strictly greater: earlier intents win ties
        if score > best.score {
            let total = intent.total_weight().max(1);
            best = Classification {
                intent,
                score,
                groups_matched,
                strength: score as f64 / total as f64,
            };
        }
    }

    best
}
