use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use peerlink_crypto::Identity;

use crate::envelope::{EnvelopeClaims, SignedEnvelopeCodec};
use crate::error::ProtocolError;
use crate::offer::ConnectionOffer;
use crate::transport::{RawOffer, Transport};

/// Publishes our connection offer for one peer at a time.
///
/// The offer is encrypted to the peer, wrapped in an envelope signed by our
/// identity, and stored under `<our key hash>/<peer key hash>`, which is
/// exactly where the peer's resolver looks for it.
pub struct OfferPublisher {
    identity: Arc<Identity>,
}

impl OfferPublisher {
    pub fn new(identity: Arc<Identity>) -> Self {
        Self { identity }
    }

    /// Key under which the peer with `peer_key_hash` reads our offer.
    pub fn offer_key(&self, peer_key_hash: &str) -> String {
        format!("{}/{peer_key_hash}", self.identity.public_key_hash())
    }

    /// Build an offer announcing `host:port` to `account`'s peers.
    pub fn offer(
        &self,
        account: &str,
        host: &str,
        port: u16,
        protocol: &str,
        symmetric_key: &str,
    ) -> ConnectionOffer {
        ConnectionOffer {
            account: account.to_string(),
            host: host.to_string(),
            port,
            protocol: protocol.to_string(),
            symmetric_key: symmetric_key.to_string(),
            public_key: self.identity.public_key_b58(),
            user_type: None,
        }
    }

    /// Encrypt `offer` to the peer and wrap it in a signed envelope.
    pub fn seal(
        &self,
        offer: &ConnectionOffer,
        peer_public_key_hex: &str,
        issued_at: u64,
    ) -> Result<String, ProtocolError> {
        if offer.public_key != self.identity.public_key_b58() {
            return Err(ProtocolError::Verification(
                "offer public key does not match publishing identity".into(),
            ));
        }
        let plaintext = offer.to_json()?;
        let cipher = peerlink_crypto::ecdh_encrypt(&self.identity, peer_public_key_hex, &plaintext)?;
        let claims = EnvelopeClaims::contact_offer(&self.identity, cipher, issued_at);
        SignedEnvelopeCodec::encode(&self.identity, &claims)
    }

    /// Seal `offer` for the peer and store it on `transport`.
    ///
    /// Returns the key the offer was stored under.
    pub async fn publish(
        &self,
        transport: &dyn Transport,
        offer: &ConnectionOffer,
        peer_key_hash: &str,
        peer_public_key_hex: &str,
    ) -> Result<String, ProtocolError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let envelope = self.seal(offer, peer_public_key_hex, issued_at)?;

        let key = self.offer_key(peer_key_hash);
        transport.put(&key, RawOffer::Text(envelope)).await?;

        tracing::info!(
            key = %key,
            account = %offer.account,
            host = %offer.host,
            port = offer.port,
            "published contact offer"
        );
        Ok(key)
    }
}
