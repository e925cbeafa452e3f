//! Transport seam
//!
//! The client talks to the store only through these traits, so tests and
//! fault injection can swap in scripted transports without a server.

use crate::client::config::ClientConfig;
use crate::client::error::{TransportError, QUERY_FRAGMENT_LEN};
use crate::translate::{QueryLanguage, TranslationResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// One result row, columns in server order
pub type Row = Map<String, Value>;

/// A query to execute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub language: QueryLanguage,
    pub query: String,
    /// Bind parameters passed alongside the query text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Overrides the configured request timeout
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl QueryRequest {
    pub fn new(language: QueryLanguage, query: impl Into<String>) -> Self {
        Self {
            language,
            query: query.into(),
            params: None,
            timeout: None,
        }
    }

    pub fn flux(query: impl Into<String>) -> Self {
        Self::new(QueryLanguage::Flux, query)
    }

    pub fn influxql(query: impl Into<String>) -> Self {
        Self::new(QueryLanguage::InfluxQl, query)
    }

    /// Builder: set bind parameters
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Builder: set a per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// First characters of the query, for error reports
    pub fn fragment(&self) -> String {
        self.query.chars().take(QUERY_FRAGMENT_LEN).collect()
    }
}

impl From<&TranslationResult> for QueryRequest {
    fn from(result: &TranslationResult) -> Self {
        Self::new(result.language, result.rendered_query.clone())
    }
}

/// A live connection to the store
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit line protocol to a bucket
    async fn write(&self, bucket: &str, body: &str) -> Result<(), TransportError>;

    /// Run a query and return its rows
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, TransportError>;

    /// Lightweight liveness probe
    async fn ping(&self) -> Result<(), TransportError>;
}

/// Creates transports; called once, on first use
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_is_bounded() {
        let long = "x".repeat(500);
        let request = QueryRequest::flux(long);
        assert_eq!(request.fragment().len(), QUERY_FRAGMENT_LEN);

        let short = QueryRequest::influxql("SELECT 1");
        assert_eq!(short.fragment(), "SELECT 1");
    }
}
