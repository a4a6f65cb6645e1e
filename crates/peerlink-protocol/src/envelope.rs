use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::Signature;
use peerlink_crypto::{encode_public_key, Identity};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Message type carried by a published connection offer.
pub const MSG_TYPE_CONTACT_OFFER: &str = "contact_offer";

/// Claims carried inside a signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeClaims {
    /// Issuer's Ed25519 public key (base58).
    pub iss: String,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EnvelopeData>,
}

/// Typed body of an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    /// Base64 ciphertext, present on contact offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
}

impl EnvelopeClaims {
    /// Claims for a contact offer issued by `identity`.
    pub fn contact_offer(identity: &Identity, cipher: String, issued_at: u64) -> Self {
        Self {
            iss: identity.public_key_b58(),
            iat: issued_at,
            data: Some(EnvelopeData {
                msg_type: Some(MSG_TYPE_CONTACT_OFFER.to_string()),
                cipher: Some(cipher),
            }),
        }
    }

    pub fn message_type(&self) -> Option<&str> {
        self.data.as_ref()?.msg_type.as_deref()
    }

    pub fn cipher(&self) -> Option<&str> {
        self.data.as_ref()?.cipher.as_deref()
    }
}

/// Decodes signed envelopes read from the offer table.
pub trait EnvelopeCodec: Send + Sync {
    /// Parse the envelope claims without checking the signature.
    fn decode_payload(&self, message: &str) -> Result<EnvelopeClaims, ProtocolError>;

    /// Parse the envelope and verify it was signed by `issuer_public_key_hex`.
    fn decode_and_verify(
        &self,
        message: &str,
        issuer_public_key_hex: &str,
    ) -> Result<EnvelopeClaims, ProtocolError>;
}

/// Compact Ed25519-signed envelope: `base64url(claims JSON).base64url(signature)`.
///
/// The signature covers the ASCII bytes of the first segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedEnvelopeCodec;

impl SignedEnvelopeCodec {
    /// Serialize and sign `claims` with `identity`.
    pub fn encode(identity: &Identity, claims: &EnvelopeClaims) -> Result<String, ProtocolError> {
        let json = serde_json::to_vec(claims)
            .map_err(|e| ProtocolError::Serialization(format!("envelope claims: {e}")))?;
        let body = URL_SAFE_NO_PAD.encode(json);
        let signature = identity.sign(body.as_bytes());
        Ok(format!("{body}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }

    fn split(message: &str) -> Result<(&str, &str), ProtocolError> {
        let (body, signature) = message
            .trim()
            .split_once('.')
            .ok_or_else(|| ProtocolError::Deserialization("envelope has no signature segment".into()))?;
        if body.is_empty() || signature.is_empty() || signature.contains('.') {
            return Err(ProtocolError::Deserialization("malformed envelope segments".into()));
        }
        Ok((body, signature))
    }

    fn parse_claims(body: &str) -> Result<EnvelopeClaims, ProtocolError> {
        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| ProtocolError::Deserialization(format!("envelope body base64: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| ProtocolError::Deserialization(format!("envelope claims: {e}")))
    }
}

impl EnvelopeCodec for SignedEnvelopeCodec {
    fn decode_payload(&self, message: &str) -> Result<EnvelopeClaims, ProtocolError> {
        let (body, _) = Self::split(message)?;
        Self::parse_claims(body)
    }

    fn decode_and_verify(
        &self,
        message: &str,
        issuer_public_key_hex: &str,
    ) -> Result<EnvelopeClaims, ProtocolError> {
        let (body, signature) = Self::split(message)?;

        let verifying_key = Identity::parse_public_key_hex(issuer_public_key_hex)?;
        let sig_bytes: [u8; 64] = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| ProtocolError::Deserialization(format!("signature base64: {e}")))?
            .try_into()
            .map_err(|_| ProtocolError::Verification("signature must be 64 bytes".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        if let Err(e) = Identity::verify(&verifying_key, body.as_bytes(), &signature) {
            tracing::warn!(
                issuer = issuer_public_key_hex,
                error = %e,
                "envelope signature verification failed"
            );
            return Err(ProtocolError::Verification("invalid envelope signature".into()));
        }

        let claims = Self::parse_claims(body)?;
        let expected_iss = encode_public_key(verifying_key.as_bytes());
        if claims.iss != expected_iss {
            return Err(ProtocolError::Verification(
                "envelope issuer does not match signing key".into(),
            ));
        }

        tracing::trace!(issuer = %claims.iss, "envelope signature verified");
        Ok(claims)
    }
}
