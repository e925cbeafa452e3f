//! Time-Series Client
//!
//! Async access to InfluxDB for batched writes, Flux and InfluxQL queries,
//! and health probes.
//!
//! - **config**: Connection, batching and retry settings
//! - **transport**: `Transport`/`Connector` seam and request types
//! - **http**: reqwest implementation of the transport
//! - **response**: Flux CSV and InfluxQL JSON decoding
//! - **pool**: Semaphore-bounded connection pool
//! - **retry**: Retry state machine with jittered exponential backoff
//! - **influx**: `InfluxClient`, tying it together
//!
//! # Failure Handling
//!
//! ```text
//! attempt ─┬─ ok ─────────────────────────────→ done
//!          ├─ timeout / connect / 429 / 5xx ──→ backoff, retry (bounded)
//!          └─ 4xx / auth / decode / closed ───→ fail immediately
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod influx;
pub mod pool;
pub mod response;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use error::{FailureKind, QueryError, TransportError, WriteError};
pub use http::{HttpConnector, HttpTransport};
pub use influx::{HealthReport, HealthStatus, InfluxClient, WriteSummary};
pub use pool::{ConnectionPool, PooledConnection};
pub use retry::{RetryMachine, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use transport::{Connector, QueryRequest, Row, Transport};
