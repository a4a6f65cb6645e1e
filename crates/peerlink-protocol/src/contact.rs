use serde::{Deserialize, Serialize};

use crate::error::ContactError;
use crate::offer::ConnectionOffer;

/// What we know about a peer before looking up its offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDescriptor {
    /// Account name the peer registered with.
    pub name: String,
    /// Hash of the peer's public key; first half of the offer key.
    pub pkeyhash: String,
    /// Peer's public key in base58, compared against envelope issuers.
    pub public_key: String,
    /// Peer's public key in hex, used for signature checks and ECDH.
    pub public_key_hex: String,
}

impl ContactDescriptor {
    pub fn new(
        name: impl Into<String>,
        pkeyhash: impl Into<String>,
        public_key: impl Into<String>,
        public_key_hex: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pkeyhash: pkeyhash.into(),
            public_key: public_key.into(),
            public_key_hex: public_key_hex.into(),
        }
    }

    /// Every field must be non-empty before a lookup is attempted.
    pub fn validate(&self) -> Result<(), ContactError> {
        let fields = [
            ("name", &self.name),
            ("pkeyhash", &self.pkeyhash),
            ("public_key", &self.public_key),
            ("public_key_hex", &self.public_key_hex),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ContactError::InvalidArgument(format!(
                    "contact {field} is missing"
                )));
            }
        }
        Ok(())
    }

    /// Offer key the peer publishes under for the reader whose key hash is
    /// `local_key_hash`.
    pub fn lookup_key(&self, local_key_hash: &str) -> String {
        format!("{}/{local_key_hash}", self.pkeyhash)
    }
}

/// A stored contact: the descriptor plus where we last reached the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub descriptor: ContactDescriptor,
    /// Last known address; may be stale.
    pub address: String,
    pub port: u16,
    pub avatar: Option<String>,
}

/// A contact whose connection offer has been fetched, verified and decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContact {
    pub public_key: String,
    pub address: String,
    pub port: u16,
    pub name: String,
    pub avatar: Option<String>,
    pub user_type: Option<String>,
    pub protocol: String,
    pub pkeyhash: String,
    pub public_key_hex: String,
    /// Session symmetric key for talking to the peer.
    pub connection_key: String,
}

impl ResolvedContact {
    /// Build from an offer that already passed validation against `descriptor`.
    pub(crate) fn from_offer(
        offer: ConnectionOffer,
        descriptor: &ContactDescriptor,
        avatar: Option<&str>,
    ) -> Self {
        Self {
            public_key: offer.public_key,
            address: offer.host,
            port: offer.port,
            name: offer.account,
            avatar: avatar.map(str::to_string),
            user_type: offer.user_type,
            protocol: offer.protocol,
            pkeyhash: descriptor.pkeyhash.clone(),
            public_key_hex: descriptor.public_key_hex.clone(),
            connection_key: offer.symmetric_key,
        }
    }

    /// The stored contact refreshed with the newly published address.
    pub fn to_contact(&self) -> Contact {
        Contact {
            descriptor: ContactDescriptor::new(
                &self.name,
                &self.pkeyhash,
                &self.public_key,
                &self.public_key_hex,
            ),
            address: self.address.clone(),
            port: self.port,
            avatar: self.avatar.clone(),
        }
    }
}
