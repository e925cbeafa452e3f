//! Connection pool
//!
//! A semaphore bounds in-flight requests. The transport itself is created
//! lazily by the connector on the first acquire and shared afterwards.
//! Closing the semaphore makes every later acquire fail with
//! `TransportError::Closed` instead of waiting.

use crate::client::config::ClientConfig;
use crate::client::error::TransportError;
use crate::client::transport::{Connector, Transport};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};

pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    transport: OnceCell<Arc<dyn Transport>>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let size = config.max_connections.max(1);
        Self {
            connector,
            config,
            transport: OnceCell::new(),
            permits: Arc::new(Semaphore::new(size)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot, connecting on first use
    pub async fn acquire(&self) -> Result<PooledConnection, TransportError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;

        let transport = self
            .transport
            .get_or_try_init(|| async {
                tracing::debug!(url = %self.config.base_url(), "Opening transport");
                self.connector.connect(&self.config).await
            })
            .await?
            .clone();

        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            transport,
            active: Arc::clone(&self.active),
            _permit: permit,
        })
    }

    /// Stop handing out connections; returns false if already closed
    pub fn close(&self) -> bool {
        if self.permits.is_closed() {
            return false;
        }
        self.permits.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Connections currently checked out
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Free slots once connected; zero before the first connect or after close
    pub fn idle(&self) -> usize {
        if self.transport.initialized() && !self.is_closed() {
            self.permits.available_permits()
        } else {
            0
        }
    }
}

/// A checked-out connection; the slot is released when this is dropped
pub struct PooledConnection {
    transport: Arc<dyn Transport>,
    active: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        self.transport.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
