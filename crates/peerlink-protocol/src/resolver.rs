use std::sync::Arc;
use std::time::Duration;

use peerlink_crypto::{CryptoError, Identity};
use tracing::{debug, info, warn};

use crate::contact::{ContactDescriptor, ResolvedContact};
use crate::envelope::{EnvelopeCodec, SignedEnvelopeCodec, MSG_TYPE_CONTACT_OFFER};
use crate::error::ContactError;
use crate::offer::ConnectionOffer;
use crate::transport::Transport;

/// Largest offer message accepted from the transport by default.
pub const DEFAULT_MAX_OFFER_LEN: usize = 64 * 1024;

/// Local key material needed to read offers addressed to us.
pub trait OfferDecryptor: Send + Sync {
    /// Hash of our public key; second half of every offer key we read.
    fn public_key_hash(&self) -> String;

    /// Decrypt `cipher` sent by the peer with the given hex public key.
    fn ecdh_decrypt(&self, peer_public_key_hex: &str, cipher: &str) -> Result<String, CryptoError>;
}

impl OfferDecryptor for Identity {
    fn public_key_hash(&self) -> String {
        Identity::public_key_hash(self)
    }

    fn ecdh_decrypt(&self, peer_public_key_hex: &str, cipher: &str) -> Result<String, CryptoError> {
        peerlink_crypto::ecdh_decrypt(self, peer_public_key_hex, cipher)
    }
}

/// Tuning for offer resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on a single lookup. `None` leaves timing to the transport.
    pub lookup_timeout: Option<Duration>,
    /// Offers longer than this are rejected before decoding.
    pub max_offer_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: None,
            max_offer_len: DEFAULT_MAX_OFFER_LEN,
        }
    }
}

/// Fetches a peer's published offer and turns it into a verified contact.
///
/// Runs lookup, envelope decoding, issuer check, decryption and field
/// validation in that order. The issuer key is compared against the stored
/// contact before anything is decrypted, and the decrypted offer must name
/// the same key again.
pub struct ContactOfferResolver {
    codec: Arc<dyn EnvelopeCodec>,
    local: Arc<dyn OfferDecryptor>,
    config: ResolverConfig,
}

impl ContactOfferResolver {
    pub fn new(
        codec: Arc<dyn EnvelopeCodec>,
        local: Arc<dyn OfferDecryptor>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            codec,
            local,
            config,
        }
    }

    /// Resolver using signed envelopes and `identity` for decryption.
    pub fn with_identity(identity: Arc<Identity>, config: ResolverConfig) -> Self {
        Self::new(Arc::new(SignedEnvelopeCodec), identity, config)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `descriptor` over `transport`.
    ///
    /// `avatar` comes from the caller's stored contact and is copied into the
    /// result unchanged.
    pub async fn resolve(
        &self,
        transport: &dyn Transport,
        descriptor: &ContactDescriptor,
        avatar: Option<&str>,
    ) -> Result<ResolvedContact, ContactError> {
        descriptor.validate()?;
        let account = descriptor.name.as_str();

        let message = self.lookup(transport, descriptor).await?;
        if message.len() > self.config.max_offer_len {
            return Err(malformed(
                account,
                format!("offer exceeds {} bytes", self.config.max_offer_len),
            ));
        }

        let claims = self
            .codec
            .decode_payload(&message)
            .map_err(|e| malformed(account, e.to_string()))?;
        match claims.message_type() {
            Some(MSG_TYPE_CONTACT_OFFER) => {}
            Some(other) => {
                return Err(malformed(account, format!("unexpected message type {other:?}")))
            }
            None => return Err(malformed(account, "missing message type".to_string())),
        }

        if claims.iss != descriptor.public_key {
            warn!(
                account,
                expected = %descriptor.public_key,
                issuer = %claims.iss,
                "contact offer issued by a different key"
            );
            return Err(ContactError::IdentityMismatch {
                account: account.to_string(),
            });
        }
        let issuer = claims.iss;

        let decoded = self
            .codec
            .decode_and_verify(&message, &descriptor.public_key_hex)
            .map_err(|e| malformed(account, format!("invalid decoded payload: {e}")))?;
        let cipher = decoded
            .cipher()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| malformed(account, "invalid decoded payload: no cipher".to_string()))?;

        let plaintext = self
            .local
            .ecdh_decrypt(&descriptor.public_key_hex, cipher)
            .map_err(|e| ContactError::DecryptionFailure {
                account: account.to_string(),
                reason: e.to_string(),
            })?;
        debug!(account, "contact offer decrypted");

        let offer = ConnectionOffer::parse_validated(&plaintext, account, &issuer)?;
        let contact = ResolvedContact::from_offer(offer, descriptor, avatar);

        info!(
            account,
            address = %contact.address,
            port = contact.port,
            protocol = %contact.protocol,
            "contact offer resolved"
        );
        Ok(contact)
    }

    async fn lookup(
        &self,
        transport: &dyn Transport,
        descriptor: &ContactDescriptor,
    ) -> Result<String, ContactError> {
        let account = descriptor.name.as_str();
        let key = descriptor.lookup_key(&self.local.public_key_hash());
        debug!(account, key = %key, "looking up contact offer");

        let lookup = transport.get(&key);
        let result = match self.config.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup).await.map_err(|_| {
                ContactError::TransportUnavailable(format!(
                    "lookup of {key} timed out after {limit:?}"
                ))
            })?,
            None => lookup.await,
        };

        let not_found = |reason: String| ContactError::OfferNotFound {
            account: account.to_string(),
            reason,
        };
        match result {
            Ok(Some(raw)) => {
                let message = raw.into_message();
                if message.trim().is_empty() {
                    return Err(not_found("empty offer".to_string()));
                }
                Ok(message)
            }
            Ok(None) => Err(not_found("no offer published".to_string())),
            Err(e) => {
                debug!(account, key = %key, error = %e, "contact offer lookup failed");
                Err(not_found(e.to_string()))
            }
        }
    }
}

fn malformed(account: &str, reason: String) -> ContactError {
    ContactError::MalformedEnvelope {
        account: account.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::envelope::EnvelopeClaims;
    use crate::error::{OfferField, ProtocolError};
    use crate::transport::{RawOffer, TransportError};

    /// Transport with a fixed answer for every key.
    struct FixedTransport {
        answer: Result<Option<RawOffer>, TransportError>,
        keys: parking_lot::Mutex<Vec<String>>,
    }

    impl FixedTransport {
        fn new(answer: Result<Option<RawOffer>, TransportError>) -> Self {
            Self {
                answer,
                keys: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn get(&self, key: &str) -> Result<Option<RawOffer>, TransportError> {
            self.keys.lock().push(key.to_string());
            self.answer.clone()
        }

        async fn put(&self, _key: &str, _value: RawOffer) -> Result<(), TransportError> {
            Err(TransportError::Store("read-only".into()))
        }
    }

    /// Envelope codec over plain JSON claims, no signatures.
    struct JsonCodec;

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

    /// Returns the cipher unchanged and counts calls.
    #[derive(Default)]
    struct Passthrough {
        calls: AtomicUsize,
    }

    impl OfferDecryptor for Passthrough {
        fn public_key_hash(&self) -> String {
            "LOCAL".into()
        }

        fn ecdh_decrypt(&self, _peer: &str, cipher: &str) -> Result<String, CryptoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(cipher.to_string())
        }
    }

    fn descriptor() -> ContactDescriptor {
        ContactDescriptor::new("alice", "H1", "PK1", "pk1hex")
    }

    fn envelope(iss: &str, msg_type: &str, plaintext: &str) -> RawOffer {
        RawOffer::Text(
            serde_json::json!({
                "iss": iss,
                "data": { "type": msg_type, "cipher": plaintext },
            })
            .to_string(),
        )
    }

    const OFFER: &str = r#"{"account":"alice","host":"10.0.0.5","port":7777,"protocol":"ws","symkey":"S1","public_key":"PK1"}"#;

    fn resolver(local: Arc<Passthrough>, config: ResolverConfig) -> ContactOfferResolver {
        ContactOfferResolver::new(Arc::new(JsonCodec), local, config)
    }

    #[tokio::test]
    async fn looks_up_peer_hash_slash_local_hash() {
        let local = Arc::new(Passthrough::default());
        let transport = FixedTransport::new(Ok(Some(envelope("PK1", MSG_TYPE_CONTACT_OFFER, OFFER))));

        let contact = resolver(local, ResolverConfig::default())
            .resolve(&transport, &descriptor(), Some("a.png"))
            .await
            .unwrap();

        assert_eq!(*transport.keys.lock(), vec!["H1/LOCAL".to_string()]);
        assert_eq!(contact.address, "10.0.0.5");
        assert_eq!(contact.avatar.as_deref(), Some("a.png"));
    }

    #[tokio::test]
    async fn missing_offer_is_not_found() {
        let local = Arc::new(Passthrough::default());
        for answer in [
            Ok(None),
            Ok(Some(RawOffer::Text(String::new()))),
            Err(TransportError::Lookup("no route".into())),
        ] {
            let transport = FixedTransport::new(answer);
            let err = resolver(Arc::clone(&local), ResolverConfig::default())
                .resolve(&transport, &descriptor(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ContactError::OfferNotFound { .. }), "{err}");
        }
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_descriptor_skips_transport() {
        let transport = FixedTransport::new(Ok(None));
        let mut nameless = descriptor();
        nameless.name.clear();

        let err = resolver(Arc::new(Passthrough::default()), ResolverConfig::default())
            .resolve(&transport, &nameless, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::InvalidArgument(_)));
        assert!(transport.keys.lock().is_empty());
    }

    #[tokio::test]
    async fn wrong_message_type_is_malformed() {
        let transport = FixedTransport::new(Ok(Some(envelope("PK1", "presence", OFFER))));
        let err = resolver(Arc::new(Passthrough::default()), ResolverConfig::default())
            .resolve(&transport, &descriptor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::MalformedEnvelope { .. }));
    }

    async fn reject_claims(claims: serde_json::Value) -> (ContactError, usize) {
        let local = Arc::new(Passthrough::default());
        let transport = FixedTransport::new(Ok(Some(RawOffer::Text(claims.to_string()))));
        let err = resolver(Arc::clone(&local), ResolverConfig::default())
            .resolve(&transport, &descriptor(), None)
            .await
            .unwrap_err();
        (err, local.calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn envelope_without_data_is_malformed() {
        let (err, calls) = reject_claims(serde_json::json!({ "iss": "PK1" })).await;
        assert!(
            matches!(&err, ContactError::MalformedEnvelope { reason, .. } if reason.contains("message type")),
            "{err}"
        );
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn envelope_data_without_type_is_malformed() {
        let (err, calls) = reject_claims(serde_json::json!({
            "iss": "PK1",
            "data": { "cipher": OFFER },
        }))
        .await;
        assert!(matches!(err, ContactError::MalformedEnvelope { .. }), "{err}");
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn verified_envelope_without_cipher_is_malformed() {
        for data in [
            serde_json::json!({ "type": MSG_TYPE_CONTACT_OFFER }),
            serde_json::json!({ "type": MSG_TYPE_CONTACT_OFFER, "cipher": "" }),
        ] {
            let (err, calls) = reject_claims(serde_json::json!({ "iss": "PK1", "data": data })).await;
            assert!(
                matches!(
                    &err,
                    ContactError::MalformedEnvelope { reason, .. }
                        if reason.starts_with("invalid decoded payload")
                ),
                "{err}"
            );
            assert_eq!(calls, 0);
        }
    }

    #[tokio::test]
    async fn issuer_mismatch_never_decrypts() {
        let local = Arc::new(Passthrough::default());
        let transport = FixedTransport::new(Ok(Some(envelope("PK2", MSG_TYPE_CONTACT_OFFER, OFFER))));

        let err = resolver(Arc::clone(&local), ResolverConfig::default())
            .resolve(&transport, &descriptor(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ContactError::IdentityMismatch {
                account: "alice".into()
            }
        );
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_offer_is_rejected_before_decoding() {
        let config = ResolverConfig {
            max_offer_len: 16,
            ..ResolverConfig::default()
        };
        let transport = FixedTransport::new(Ok(Some(envelope("PK1", MSG_TYPE_CONTACT_OFFER, OFFER))));
        let err = resolver(Arc::new(Passthrough::default()), config)
            .resolve(&transport, &descriptor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::MalformedEnvelope { .. }));
    }

    #[tokio::test]
    async fn decrypted_account_must_match() {
        let offer = OFFER.replace(r#""account":"alice""#, r#""account":"bob""#);
        let transport = FixedTransport::new(Ok(Some(envelope("PK1", MSG_TYPE_CONTACT_OFFER, &offer))));
        let err = resolver(Arc::new(Passthrough::default()), ResolverConfig::default())
            .resolve(&transport, &descriptor(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ContactError::FieldMismatch {
                field: OfferField::Account,
                account: "alice".into()
            }
        );
    }

    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn get(&self, _key: &str) -> Result<Option<RawOffer>, TransportError> {
            futures::future::pending().await
        }

        async fn put(&self, _key: &str, _value: RawOffer) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn lookup_timeout_reports_unavailable_transport() {
        let config = ResolverConfig {
            lookup_timeout: Some(Duration::from_millis(20)),
            ..ResolverConfig::default()
        };
        let err = resolver(Arc::new(Passthrough::default()), config)
            .resolve(&StalledTransport, &descriptor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::TransportUnavailable(_)));
    }
}
