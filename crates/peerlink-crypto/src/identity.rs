use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// A peer's cryptographic identity.
///
/// The Ed25519 public key is published in two encodings: base58 (the form
/// carried in envelope `iss` claims and compared against stored contacts) and
/// hex (the form used to address ECDH operations). Offers are stored under
/// key hashes derived from the public key, see [`public_key_hash`].
#[derive(ZeroizeOnDrop)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a new random identity.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Restore an identity from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        Self { signing_key }
    }

    /// Get the public verifying key.
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key as raw bytes (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Get the secret key bytes.
    ///
    /// # Security
    /// Raw private key material.
    pub fn secret_key_bytes(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }

    /// Sign a message with this identity's private key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verify a signature against a public key.
    pub fn verify(
        public_key: &VerifyingKey,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        public_key
            .verify(message, signature)
            .map_err(|e| CryptoError::VerificationError(e.to_string()))
    }

    /// Derive an X25519 static secret from this Ed25519 key for Diffie-Hellman.
    ///
    /// Uses the SHA-512-expanded scalar (same scalar that Ed25519 uses internally)
    /// so that `to_x25519_public()` matches `peer_ed25519_to_x25519()` via the
    /// standard Edwards→Montgomery birational map.
    pub fn to_x25519_secret(&self) -> x25519_dalek::StaticSecret {
        let scalar_bytes = self.signing_key.to_scalar_bytes();
        x25519_dalek::StaticSecret::from(scalar_bytes)
    }

    /// Get the X25519 public key derived from this identity.
    pub fn to_x25519_public(&self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(&self.to_x25519_secret())
    }

    /// Public key as a hex string.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Public key as a base58 string.
    pub fn public_key_b58(&self) -> String {
        encode_public_key(&self.public_key_bytes())
    }

    /// Hash of our own public key, used to namespace offer lookups.
    pub fn public_key_hash(&self) -> String {
        public_key_hash(&self.public_key_bytes())
    }

    /// Decode a hex-encoded Ed25519 public key.
    pub fn parse_public_key_hex(public_key_hex: &str) -> Result<VerifyingKey, CryptoError> {
        let bytes = hex::decode(public_key_hex)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid public key hex: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".into()))?;
        VerifyingKey::from_bytes(&array)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key: {e}")))
    }

    /// Convert a peer's Ed25519 public key bytes to an X25519 public key.
    ///
    /// Uses the standard Edwards→Montgomery birational map (RFC 7748).
    pub fn peer_ed25519_to_x25519(
        ed25519_public_bytes: &[u8; 32],
    ) -> Result<x25519_dalek::PublicKey, CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(ed25519_public_bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key: {e}")))?;
        let montgomery = verifying_key.to_montgomery();
        Ok(x25519_dalek::PublicKey::from(montgomery.to_bytes()))
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

/// Base58 form of a public key, as carried in envelope issuer claims.
pub fn encode_public_key(public_key: &[u8]) -> String {
    bs58::encode(public_key).into_string()
}

/// Base58check-encoded SHA-256 of a public key.
pub fn public_key_hash(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    bs58::encode(digest).with_check().into_string()
}
