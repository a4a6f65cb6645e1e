use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::identity::Identity;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const OFFER_KEY_INFO: &[u8] = b"peerlink-offer-v1";

/// Symmetric key protecting a published connection offer.
///
/// Derived from an X25519 shared secret between the publisher and the
/// intended reader. Both X25519 public keys, sorted, are bound into every
/// ciphertext as associated data, so an offer only opens for the exact pair
/// it was sealed between.
#[derive(ZeroizeOnDrop)]
pub struct OfferKey {
    key: [u8; 32],
    #[zeroize(skip)]
    binding: [u8; 64],
}

impl OfferKey {
    /// Derive the offer key from a DH shared secret.
    pub fn derive(my_secret: &StaticSecret, their_public: &PublicKey) -> Result<Self, CryptoError> {
        let shared = my_secret.diffie_hellman(their_public);
        let my_public = PublicKey::from(my_secret);

        let (low, high) = if my_public.as_bytes() < their_public.as_bytes() {
            (my_public.as_bytes(), their_public.as_bytes())
        } else {
            (their_public.as_bytes(), my_public.as_bytes())
        };
        let mut binding = [0u8; 64];
        binding[..32].copy_from_slice(low);
        binding[32..].copy_from_slice(high);

        let info = [binding.as_slice(), OFFER_KEY_INFO].concat();
        let mut key = [0u8; 32];
        Hkdf::<Sha256>::new(None, shared.as_bytes())
            .expand(&info, &mut key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { key, binding })
    }

    /// Derive the offer key shared between `identity` and the peer whose
    /// Ed25519 public key is given in hex.
    pub fn for_peer(identity: &Identity, peer_public_key_hex: &str) -> Result<Self, CryptoError> {
        let peer_key = Identity::parse_public_key_hex(peer_public_key_hex)?;
        let peer_x25519 = Identity::peer_ed25519_to_x25519(peer_key.as_bytes())?;
        Self::derive(&identity.to_x25519_secret(), &peer_x25519)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    /// Seal `plaintext` as `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: plaintext,
            aad: &self.binding,
        };
        let sealed = self
            .cipher()
            .encrypt(&nonce, payload)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;
        Ok([nonce.as_slice(), sealed.as_slice()].concat())
    }

    /// Open a value produced by [`OfferKey::encrypt`] for the same peer pair.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionError("sealed offer too short".into()));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let payload = Payload {
            msg: sealed,
            aad: &self.binding,
        };
        self.cipher()
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| CryptoError::DecryptionError("offer failed authentication".into()))
    }
}

/// Encrypt a UTF-8 plaintext to a peer, returning base64 ciphertext.
pub fn ecdh_encrypt(
    identity: &Identity,
    peer_public_key_hex: &str,
    plaintext: &str,
) -> Result<String, CryptoError> {
    let key = OfferKey::for_peer(identity, peer_public_key_hex)?;
    let sealed = key.encrypt(plaintext.as_bytes())?;
    Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
}

/// Decrypt base64 ciphertext sent by a peer back into a UTF-8 string.
pub fn ecdh_decrypt(
    identity: &Identity,
    peer_public_key_hex: &str,
    cipher: &str,
) -> Result<String, CryptoError> {
    let sealed = base64::engine::general_purpose::STANDARD
        .decode(cipher)
        .map_err(|e| CryptoError::DecryptionError(format!("invalid base64 cipher: {e}")))?;
    let key = OfferKey::for_peer(identity, peer_public_key_hex)?;
    let plaintext = key.decrypt(&sealed)?;
    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::DecryptionError(format!("plaintext is not UTF-8: {e}")))
}
