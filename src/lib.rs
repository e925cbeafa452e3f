//! # Gridlens
//!
//! Natural-language access to energy grid time-series in InfluxDB.
//!
//! ## Features
//!
//! - **Query translation**: Questions become Flux or InfluxQL through
//!   keyword intent scoring and a fixed template registry
//! - **Ingest**: Tabular records are validated and mapped to points with
//!   stable, unit-derived field names
//! - **Resilient client**: Batched writes, bounded retries with jittered
//!   backoff, and a bounded connection pool
//!
//! ## Modules
//!
//! - [`translate`]: Question → query translation
//! - [`convert`]: Record → point conversion
//! - [`client`]: Async InfluxDB client
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridlens::client::{ClientConfig, InfluxClient, QueryRequest};
//! use gridlens::translate::{QueryLanguage, TranslationContext, Translator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let translator = Translator::default();
//!     let result = translator.translate(
//!         "Compare demand between the south and the northeast yesterday",
//!         QueryLanguage::InfluxQl,
//!         &TranslationContext::default(),
//!     )?;
//!
//!     let client = InfluxClient::new(ClientConfig::new("http://localhost:8086"));
//!     let rows = client.query(&QueryRequest::from(&result)).await?;
//!     println!("{} rows", rows.len());
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod translate;

pub use client::{
    ClientConfig, HealthReport, InfluxClient, QueryError, QueryRequest, Row, TransportError,
    WriteError, WriteSummary,
};

pub use config::{Config, ConfigError, LoggingConfig, TranslatorConfig};

pub use convert::{convert, Conversion, DatasetType, Point, Record, RecordValue, RejectReason};

pub use translate::{
    QueryIntent, QueryLanguage, TranslationContext, TranslationError, TranslationResult,
    Translator,
};
