//! InfluxDB client
//!
//! Writes are split into chunks of `batch_size` points and sent in input
//! order, one chunk at a time. Each chunk is encoded once and re-sent
//! whole on retry. A write that fails partway reports how many points were
//! acknowledged before the failure.

use crate::client::config::ClientConfig;
use crate::client::error::{FailureKind, QueryError, TransportError, WriteError};
use crate::client::http::HttpConnector;
use crate::client::pool::ConnectionPool;
use crate::client::retry::{run_with_retry, RetryPolicy, Sleeper, TokioSleeper};
use crate::client::transport::{Connector, QueryRequest, Row};
use crate::convert::{encode_batch, Point};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub points_written: usize,
    pub chunks: usize,
    /// Every submission, including retries
    pub attempts: u32,
    /// Resubmissions after a failed attempt
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Closed,
}

/// Result of a single liveness probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub pool_active: usize,
    pub pool_idle: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Async client for writes, queries and health checks
pub struct InfluxClient {
    config: ClientConfig,
    pool: ConnectionPool,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl InfluxClient {
    /// Create a client over HTTP; nothing is opened until first use
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(HttpConnector))
    }

    /// Create a client over a custom connector
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let policy = config.retry_policy();
        Self {
            pool: ConnectionPool::new(config.clone(), connector),
            config,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Builder: replace how the client waits between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Write points in chunks; `bucket` defaults to the configured one
    pub async fn write(
        &self,
        points: &[Point],
        bucket: Option<&str>,
    ) -> Result<WriteSummary, WriteError> {
        let op_id = Uuid::new_v4();
        let bucket = bucket.unwrap_or(&self.config.bucket);
        let batch_size = self.config.batch_size.max(1);
        let mut summary = WriteSummary::default();

        if self.pool.is_closed() {
            return Err(WriteError {
                attempted: points.len(),
                succeeded: 0,
                failed: points.len(),
                attempts: 0,
                kind: FailureKind::Terminal,
                source: TransportError::Closed,
            });
        }

        tracing::info!(
            op_id = %op_id,
            points = points.len(),
            bucket,
            batch_size,
            "Writing points"
        );

        for (index, chunk) in points.chunks(batch_size).enumerate() {
            let body = encode_batch(chunk);
            let body = body.as_str();
            let pool = &self.pool;

            let result = run_with_retry(self.policy, self.sleeper.as_ref(), op_id, |_| async move {
                let connection = pool.acquire().await?;
                connection.write(bucket, body).await
            })
            .await;

            match result {
                Ok(((), attempts)) => {
                    summary.points_written += chunk.len();
                    summary.chunks += 1;
                    summary.attempts += attempts;
                    summary.retries += attempts.saturating_sub(1);
                    tracing::debug!(
                        op_id = %op_id,
                        chunk = index,
                        points = chunk.len(),
                        attempts,
                        "Chunk written"
                    );
                }
                Err(failure) => {
                    let err = WriteError {
                        attempted: points.len(),
                        succeeded: summary.points_written,
                        failed: points.len() - summary.points_written,
                        attempts: summary.attempts + failure.attempts,
                        kind: failure.kind,
                        source: failure.error,
                    };
                    tracing::error!(op_id = %op_id, chunk = index, error = %err, "Write failed");
                    return Err(err);
                }
            }
        }

        tracing::info!(
            op_id = %op_id,
            points = summary.points_written,
            chunks = summary.chunks,
            attempts = summary.attempts,
            retries = summary.retries,
            "Write complete"
        );
        Ok(summary)
    }

    /// Execute a query and return its rows
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, QueryError> {
        let op_id = Uuid::new_v4();
        let pool = &self.pool;

        tracing::debug!(
            op_id = %op_id,
            language = %request.language,
            query = %request.fragment(),
            "Running query"
        );

        let result = run_with_retry(self.policy, self.sleeper.as_ref(), op_id, |_| async move {
            let connection = pool.acquire().await?;
            connection.query(request).await
        })
        .await;

        match result {
            Ok((rows, attempts)) => {
                tracing::debug!(op_id = %op_id, rows = rows.len(), attempts, "Query complete");
                Ok(rows)
            }
            Err(failure) => Err(QueryError {
                fragment: request.fragment(),
                attempts: failure.attempts,
                kind: failure.kind,
                source: failure.error,
            }),
        }
    }

    /// Probe the server once; never retried, never an error
    pub async fn health_check(&self) -> HealthReport {
        if self.pool.is_closed() {
            return HealthReport {
                status: HealthStatus::Closed,
                latency_ms: 0,
                pool_active: self.pool.active(),
                pool_idle: 0,
                message: Some(TransportError::Closed.to_string()),
            };
        }

        let started = Instant::now();
        let probe = async {
            let connection = self.pool.acquire().await?;
            connection.ping().await
        };
        let outcome = match tokio::time::timeout(self.config.timeout(), probe).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let (status, message) = match outcome {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        HealthReport {
            status,
            latency_ms,
            pool_active: self.pool.active(),
            pool_idle: self.pool.idle(),
            message,
        }
    }

    /// Release the pool; safe to call more than once
    pub fn close(&self) {
        if self.pool.close() {
            tracing::info!("Client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
