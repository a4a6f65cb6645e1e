//! In-process implementation of the offer transport.
//!
//! Suitable for tests and local development: every reachable endpoint shares
//! one key/value table, the way any node of the distributed table can answer
//! a lookup. Data is lost when the network is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RawOffer, Transport, TransportError, TransportResolver};

type Store = Arc<RwLock<HashMap<String, RawOffer>>>;

/// A set of reachable endpoints over a shared offer table.
#[derive(Default)]
pub struct MemoryNetwork {
    endpoints: RwLock<HashSet<(String, u16)>>,
    store: Store,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address:port` reachable.
    pub fn add_endpoint(&self, address: &str, port: u16) {
        self.endpoints.write().insert((address.to_string(), port));
    }

    /// Take `address:port` offline.
    pub fn remove_endpoint(&self, address: &str, port: u16) {
        self.endpoints.write().remove(&(address.to_string(), port));
    }

    /// Store a value directly, bypassing any endpoint.
    pub fn insert(&self, key: &str, value: RawOffer) {
        self.store.write().insert(key.to_string(), value);
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

#[async_trait]
impl TransportResolver for MemoryNetwork {
    async fn acquire(
        &self,
        address: &str,
        port: u16,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        if !self.endpoints.read().contains(&(address.to_string(), port)) {
            return Err(TransportError::Unreachable {
                address: address.to_string(),
                port,
            });
        }
        tracing::debug!(address, port, "acquired memory transport");
        Ok(Arc::new(MemoryTransport {
            store: Arc::clone(&self.store),
        }))
    }
}

/// Handle onto a [`MemoryNetwork`]'s table.
pub struct MemoryTransport {
    store: Store,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, key: &str) -> Result<Option<RawOffer>, TransportError> {
        Ok(self.store.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: RawOffer) -> Result<(), TransportError> {
        self.store.write().insert(key.to_string(), value);
        Ok(())
    }
}
