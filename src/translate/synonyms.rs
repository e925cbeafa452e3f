//! Canonical vocabularies for regions, energy sources and measurements
//!
//! Each table maps a canonical name to the phrases that refer to it. The
//! converter uses the same tables to canonicalize tag values on ingest, so
//! a question about "sudeste" filters on the tag the writer stored.

use crate::translate::normalize::NormalizedQuestion;
use std::collections::BTreeSet;

/// Canonical name and its synonyms
pub type SynonymTable = &'static [(&'static str, &'static [&'static str])];

/// Subsystems of the interconnected grid
pub const REGIONS: SynonymTable = &[
    (
        "southeast",
        &[
            "southeast",
            "south-east",
            "south east",
            "sudeste",
            "sudeste/centro-oeste",
            "centro-oeste",
            "center-west",
            "central-west",
        ],
    ),
    ("south", &["south", "sul", "southern"]),
    (
        "northeast",
        &["northeast", "north-east", "north east", "nordeste"],
    ),
    ("north", &["north", "norte", "northern"]),
];

/// Subsystem codes as they appear in grid operator exports
///
/// Kept out of [`REGIONS`] because "se" and "ne" are ordinary Portuguese
/// words; only tag values on ingest are matched against these.
pub const REGION_CODES: SynonymTable = &[
    ("southeast", &["se", "seco", "se/co"]),
    ("south", &["s"]),
    ("northeast", &["ne"]),
    ("north", &["n"]),
];

pub const ENERGY_SOURCES: SynonymTable = &[
    (
        "hydro",
        &[
            "hydro",
            "hydroelectric",
            "hydropower",
            "hydraulic",
            "hidrelétrica",
            "hidreletrica",
            "hidráulica",
            "hidraulica",
        ],
    ),
    ("wind", &["wind", "eolic", "eólica", "eolica", "wind farm", "wind farms"]),
    ("solar", &["solar", "photovoltaic", "pv", "fotovoltaica"]),
    (
        "thermal",
        &[
            "thermal",
            "thermoelectric",
            "térmica",
            "termica",
            "termelétrica",
            "fossil",
            "gas",
            "coal",
        ],
    ),
    ("nuclear", &["nuclear", "termonuclear"]),
    ("biomass", &["biomass", "biomassa", "bagasse"]),
];

pub const MEASUREMENT_TYPES: SynonymTable = &[
    (
        "generation",
        &[
            "generation",
            "generated",
            "production",
            "produced",
            "output",
            "geração",
            "geracao",
        ],
    ),
    (
        "consumption",
        &[
            "consumption",
            "consumed",
            "demand",
            "load",
            "usage",
            "consumo",
            "carga",
        ],
    ),
    (
        "transmission",
        &[
            "transmission",
            "interchange",
            "exchange",
            "power flow",
            "transfer",
            "intercâmbio",
            "intercambio",
        ],
    ),
];

/// Find every canonical name whose synonyms occur in the question
///
/// Longer synonyms are tried first and a match is discarded if it overlaps
/// one already taken, so "southeast" never also counts as "south".
pub fn match_all(question: &NormalizedQuestion, table: SynonymTable) -> BTreeSet<String> {
    let mut candidates: Vec<(&str, &str)> = table
        .iter()
        .flat_map(|(canonical, synonyms)| synonyms.iter().map(move |s| (*canonical, *s)))
        .collect();
    // Stable sort keeps table order among equal lengths
    candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut taken: Vec<(usize, usize)> = Vec::new();
    let mut found = BTreeSet::new();

    for (canonical, synonym) in candidates {
        for (start, end) in question.phrase_spans(synonym) {
            let overlaps = taken.iter().any(|&(s, e)| start < e && end > s);
            if !overlaps {
                taken.push((start, end));
                found.insert(canonical.to_string());
            }
        }
    }

    found
}

/// Map a single value to its canonical name, if it is a known synonym
pub fn canonicalize(value: &str, table: SynonymTable) -> Option<&'static str> {
    let normalized = NormalizedQuestion::new(value);
    let needle = normalized.as_str();
    table
        .iter()
        .find(|(canonical, synonyms)| *canonical == needle || synonyms.contains(&needle))
        .map(|(canonical, _)| *canonical)
}

/// Canonicalize when known, otherwise keep the lower-cased, trimmed value
pub fn canonicalize_or_keep(value: &str, table: SynonymTable) -> String {
    canonicalize(value, table)
        .map(str::to_string)
        .unwrap_or_else(|| value.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> NormalizedQuestion {
        NormalizedQuestion::new(s)
    }

    #[test]
    fn test_longest_match_wins() {
        let regions = match_all(&q("generation in the southeast region"), REGIONS);
        assert_eq!(regions, BTreeSet::from(["southeast".to_string()]));

        let regions = match_all(&q("north east wind"), REGIONS);
        assert_eq!(regions, BTreeSet::from(["northeast".to_string()]));
    }

    #[test]
    fn test_multiple_matches_collected() {
        let regions = match_all(&q("compare demand in the South and the Nordeste"), REGIONS);
        assert_eq!(
            regions,
            BTreeSet::from(["northeast".to_string(), "south".to_string()])
        );
    }

    #[test]
    fn test_portuguese_synonyms() {
        let sources = match_all(&q("geração eólica e hidrelétrica"), ENERGY_SOURCES);
        assert_eq!(
            sources,
            BTreeSet::from(["hydro".to_string(), "wind".to_string()])
        );
        let measurements = match_all(&q("geração eólica"), MEASUREMENT_TYPES);
        assert!(measurements.contains("generation"));
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(match_all(&q("what is the weather"), ENERGY_SOURCES).is_empty());
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("Sudeste", REGIONS), Some("southeast"));
        assert_eq!(canonicalize("SOUTH", REGIONS), Some("south"));
        assert_eq!(canonicalize("atlantis", REGIONS), None);
        assert_eq!(canonicalize_or_keep(" Atlantis ", REGIONS), "atlantis");
    }

    #[test]
    fn test_portuguese_function_words_are_not_regions() {
        assert!(match_all(&q("quanto se gerou de energia ontem"), REGIONS).is_empty());
        assert!(match_all(&q("ne pas"), REGIONS).is_empty());
        assert_eq!(canonicalize("SE", REGION_CODES), Some("southeast"));
        assert_eq!(canonicalize("NE", REGION_CODES), Some("northeast"));
    }
}
