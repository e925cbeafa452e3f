//! Natural-Language Query Translation
//!
//! Turns a free-form question about energy data into a Flux or InfluxQL
//! query. Everything here is pure and synchronous:
//!
//! - **normalize**: Case and punctuation folding
//! - **synonyms**: Region, source and measurement vocabularies
//! - **intent**: Weighted keyword classification
//! - **extract**: Parameter extractors with context overrides
//! - **templates**: Read-only `(intent, language)` template registry
//! - **render**: Placeholder substitution and quoting
//! - **translator**: The pipeline tying it together
//!
//! # Example
//!
//! ```rust
//! use gridlens::translate::{QueryLanguage, TranslationContext, Translator};
//!
//! let translator = Translator::default();
//! let result = translator
//!     .translate(
//!         "What was the average hydro generation in the southeast region last week?",
//!         QueryLanguage::Flux,
//!         &TranslationContext::default(),
//!     )
//!     .unwrap();
//!
//! assert!(result.rendered_query.contains("range(start: -7d"));
//! ```

pub mod error;
pub mod extract;
pub mod intent;
pub mod normalize;
pub mod render;
pub mod synonyms;
pub mod templates;
pub mod translator;
pub mod types;

pub use error::{TemplateError, TranslationError, TranslationOutcome};
pub use intent::{classify, Classification};
pub use normalize::NormalizedQuestion;
pub use render::RenderSettings;
pub use templates::{QueryTemplate, TemplateRegistry};
pub use translator::{Clock, FixedClock, SystemClock, Translator};
pub use types::{
    Aggregation, DurationUnit, ParameterKey, QueryIntent, QueryLanguage, QueryParameters,
    RelativeDuration, TimeBound, TimeRange, TranslationContext, TranslationResult,
};
