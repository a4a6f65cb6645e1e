//! Shared fixtures for the resolution integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use peerlink_crypto::{CryptoError, Identity};
use peerlink_protocol::{
    Contact, ContactDescriptor, EnvelopeClaims, EnvelopeCodec, MemoryNetwork, OfferDecryptor,
    ProtocolError, Transport, TransportError, TransportResolver,
};

pub const ADDRESS: &str = "10.0.0.1";
pub const PORT: u16 = 8000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A network with one reachable endpoint at `ADDRESS:PORT`.
pub fn network() -> Arc<MemoryNetwork> {
    let network = Arc::new(MemoryNetwork::new());
    network.add_endpoint(ADDRESS, PORT);
    network
}

/// How `reader` has `peer` stored after an earlier contact exchange.
pub fn stored_contact(name: &str, peer: &Identity) -> Contact {
    Contact {
        descriptor: ContactDescriptor::new(
            name,
            peer.public_key_hash(),
            peer.public_key_b58(),
            peer.public_key_hex(),
        ),
        address: ADDRESS.to_string(),
        port: PORT,
        avatar: Some("avatar-data".to_string()),
    }
}

/// Transport resolver that counts acquisitions.
pub struct CountingResolver {
    pub inner: Arc<MemoryNetwork>,
    pub acquires: AtomicUsize,
}

impl CountingResolver {
    pub fn new(inner: Arc<MemoryNetwork>) -> Self {
        Self {
            inner,
            acquires: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportResolver for CountingResolver {
    async fn acquire(
        &self,
        address: &str,
        port: u16,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(address, port).await
    }
}

/// Real ECDH decryption that counts how often it is asked to decrypt.
pub struct CountingDecryptor {
    pub identity: Arc<Identity>,
    pub calls: AtomicUsize,
}

impl CountingDecryptor {
    pub fn new(identity: Arc<Identity>) -> Self {
        Self {
            identity,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OfferDecryptor for CountingDecryptor {
    fn public_key_hash(&self) -> String {
        self.identity.public_key_hash()
    }

    fn ecdh_decrypt(&self, peer_public_key_hex: &str, cipher: &str) -> Result<String, CryptoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        peerlink_crypto::ecdh_decrypt(&self.identity, peer_public_key_hex, cipher)
    }
}

/// Envelope codec over plain JSON claims, for literal-value scenarios.
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn decode_payload(&self, message: &str) -> Result<EnvelopeClaims, ProtocolError> {
        serde_json::from_str(message).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    fn decode_and_verify(
        &self,
        message: &str,
        _issuer_public_key_hex: &str,
    ) -> Result<EnvelopeClaims, ProtocolError> {
        self.decode_payload(message)
    }
}

/// Codec that blows up on first use.
pub struct PanickingCodec;

impl EnvelopeCodec for PanickingCodec {
    fn decode_payload(&self, _message: &str) -> Result<EnvelopeClaims, ProtocolError> {
        panic!("codec exploded")
    }

    fn decode_and_verify(
        &self,
        _message: &str,
        _issuer_public_key_hex: &str,
    ) -> Result<EnvelopeClaims, ProtocolError> {
        panic!("codec exploded")
    }
}

/// Decryptor whose "ciphertext" is the plaintext, with a fixed local key hash.
pub struct PlainDecryptor {
    pub key_hash: String,
    pub calls: AtomicUsize,
}

impl PlainDecryptor {
    pub fn new(key_hash: &str) -> Self {
        Self {
            key_hash: key_hash.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl OfferDecryptor for PlainDecryptor {
    fn public_key_hash(&self) -> String {
        self.key_hash.clone()
    }

    fn ecdh_decrypt(&self, _peer_public_key_hex: &str, cipher: &str) -> Result<String, CryptoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(cipher.to_string())
    }
}
