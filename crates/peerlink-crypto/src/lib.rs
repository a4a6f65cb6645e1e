pub mod error;
pub mod identity;
pub mod offer_key;

pub use error::CryptoError;
pub use identity::{encode_public_key, public_key_hash, Identity};
pub use offer_key::{ecdh_decrypt, ecdh_encrypt, OfferKey};
