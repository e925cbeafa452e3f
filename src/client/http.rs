//! HTTP transport over reqwest
//!
//! - Writes: `POST /api/v2/write` with line protocol
//! - Flux: `POST /api/v2/query`, CSV response
//! - InfluxQL: `GET /query` (v1 compatibility API), JSON response
//! - Health: `GET /ping`

use crate::client::config::ClientConfig;
use crate::client::error::TransportError;
use crate::client::response::{error_message, parse_flux_csv, parse_influxql_json};
use crate::client::transport::{Connector, QueryRequest, Row, Transport};
use crate::translate::QueryLanguage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Creates [`HttpTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(HttpTransport::new(config)?))
    }
}

pub struct HttpTransport {
    client: Client,
    base: Url,
    token: String,
    org: String,
    database: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        // Trailing slash so relative joins keep any path prefix
        let base = Url::parse(&format!("{}/", config.base_url()))
            .map_err(|e| TransportError::InvalidConfig(format!("url '{}': {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_connections.max(1))
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
            org: config.org.clone(),
            database: config.bucket.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.header(AUTHORIZATION, format!("Token {}", self.token))
        }
    }

    async fn flux(&self, request: &QueryRequest) -> Result<Vec<Row>, TransportError> {
        let url = self.endpoint("api/v2/query")?;
        let mut body = json!({
            "query": request.query,
            "type": "flux",
            "dialect": {"header": true, "annotations": [], "delimiter": ","},
        });
        if let Some(params) = &request.params {
            body["params"] = serde_json::Value::Object(params.clone());
        }

        let mut builder = self
            .authorized(self.client.post(url))
            .query(&[("org", self.org.as_str())])
            .header(ACCEPT, "application/csv")
            .json(&body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let bytes = read_success_body(send(builder).await?).await?;
        let text = String::from_utf8(bytes).map_err(|e| TransportError::Decode(e.to_string()))?;
        parse_flux_csv(&text)
    }

    async fn influxql(&self, request: &QueryRequest) -> Result<Vec<Row>, TransportError> {
        let url = self.endpoint("query")?;
        let mut query: Vec<(&str, String)> = vec![
            ("db", self.database.clone()),
            ("q", request.query.clone()),
            ("epoch", "ms".to_string()),
        ];
        if let Some(params) = &request.params {
            let encoded = serde_json::to_string(params)
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            query.push(("params", encoded));
        }

        let mut builder = self.authorized(self.client.get(url)).query(&query);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let bytes = read_success_body(send(builder).await?).await?;
        parse_influxql_json(&bytes)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn write(&self, bucket: &str, body: &str) -> Result<(), TransportError> {
        let url = self.endpoint("api/v2/write")?;
        let builder = self
            .authorized(self.client.post(url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", bucket),
                ("precision", "ns"),
            ])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.to_string());

        read_success_body(send(builder).await?).await.map(|_| ())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, TransportError> {
        match request.language {
            QueryLanguage::Flux => self.flux(request).await,
            QueryLanguage::InfluxQl => self.influxql(request).await,
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let url = self.endpoint("ping")?;
        read_success_body(send(self.client.get(url)).await?)
            .await
            .map(|_| ())
    }
}

fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::InvalidConfig(e.to_string())
    } else {
        TransportError::Connect(e.to_string())
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, TransportError> {
    builder.send().await.map_err(classify_send_error)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Read the whole body, mapping non-success statuses to errors
///
/// A timeout after part of the body arrived is reported as
/// `PartialTimeout`, which is never retried.
async fn read_success_body(mut response: Response) -> Result<Vec<u8>, TransportError> {
    let status = response.status();
    let hint = retry_after(response.headers());

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) if e.is_timeout() => {
                return Err(if body.is_empty() {
                    TransportError::Timeout
                } else {
                    TransportError::PartialTimeout { bytes: body.len() }
                });
            }
            Err(e) if body.is_empty() => return Err(TransportError::Connect(e.to_string())),
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        }
    }

    if status.is_success() {
        Ok(body)
    } else {
        Err(TransportError::from_status(
            status.as_u16(),
            error_message(&body),
            hint,
        ))
    }
}
