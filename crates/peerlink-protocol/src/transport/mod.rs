pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryNetwork, MemoryTransport};

/// Value stored under an offer key.
///
/// Peers reached over a relay hand back the offer wrapped as
/// `{"value": "<message>"}`; peers on the distributed table return the bare
/// message string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOffer {
    Wrapped { value: String },
    Text(String),
}

impl RawOffer {
    /// Reduce either shape to the message string.
    pub fn into_message(self) -> String {
        match self {
            Self::Wrapped { value } | Self::Text(value) => value,
        }
    }
}

impl From<String> for RawOffer {
    fn from(message: String) -> Self {
        Self::Text(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no transport reachable at {address}:{port}")]
    Unreachable { address: String, port: u16 },

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("store failed: {0}")]
    Store(String),
}

/// Key/value access to the distributed offer table.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the value stored under `key`. `Ok(None)` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<RawOffer>, TransportError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: RawOffer) -> Result<(), TransportError>;
}

/// Hands out a transport handle for the network a contact was last seen on.
///
/// The returned handle is owned by the caller; dropping it releases any
/// connection the resolver opened.
#[async_trait]
pub trait TransportResolver: Send + Sync {
    async fn acquire(&self, address: &str, port: u16)
        -> Result<Arc<dyn Transport>, TransportError>;
}
