//! Scripted transport and recording sleeper for client tests

use crate::client::config::ClientConfig;
use crate::client::error::TransportError;
use crate::client::retry::Sleeper;
use crate::client::transport::{Connector, QueryRequest, Row, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport that replays scripted outcomes and records what it was sent
///
/// When a script runs dry, writes and pings succeed and queries return no rows.
#[derive(Default)]
pub struct FakeTransport {
    writes: Mutex<VecDeque<Result<(), TransportError>>>,
    queries: Mutex<VecDeque<Result<Vec<Row>, TransportError>>>,
    pings: Mutex<VecDeque<Result<(), TransportError>>>,
    pub written: Mutex<Vec<(String, String)>>,
    pub queried: Mutex<Vec<QueryRequest>>,
}

impl FakeTransport {
    pub fn script_writes(self, outcomes: Vec<Result<(), TransportError>>) -> Self {
        self.writes.lock().unwrap().extend(outcomes);
        self
    }

    pub fn script_queries(self, outcomes: Vec<Result<Vec<Row>, TransportError>>) -> Self {
        self.queries.lock().unwrap().extend(outcomes);
        self
    }

    pub fn script_pings(self, outcomes: Vec<Result<(), TransportError>>) -> Self {
        self.pings.lock().unwrap().extend(outcomes);
        self
    }

    /// Number of points in each write body, in submission order
    pub fn written_batch_sizes(&self) -> Vec<usize> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.lines().count())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn write(&self, bucket: &str, body: &str) -> Result<(), TransportError> {
        self.written
            .lock()
            .unwrap()
            .push((bucket.to_string(), body.to_string()));
        self.writes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, TransportError> {
        self.queried.lock().unwrap().push(request.clone());
        self.queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.pings.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Hands out one shared fake transport and counts connects
pub struct FakeConnector {
    transport: Arc<FakeTransport>,
    connects: AtomicUsize,
    failure: Option<TransportError>,
}

impl FakeConnector {
    pub fn new(transport: FakeTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            connects: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// A connector whose every connect fails
    pub fn failing(error: TransportError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(FakeTransport::default())
        }
    }

    pub fn transport(&self) -> Arc<FakeTransport> {
        Arc::clone(&self.transport)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn Transport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.transport.clone())
    }
}

/// Records requested sleeps without waiting
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
