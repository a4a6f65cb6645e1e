use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Failures of the envelope codec and offer publication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("crypto error: {0}")]
    CryptoError(String),
}

impl From<peerlink_crypto::CryptoError> for ProtocolError {
    fn from(e: peerlink_crypto::CryptoError) -> Self {
        Self::CryptoError(e.to_string())
    }
}

impl From<TransportError> for ProtocolError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A required field of a decrypted connection offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferField {
    Account,
    Host,
    Port,
    Protocol,
    SymmetricKey,
    PublicKey,
}

impl OfferField {
    /// JSON key of this field inside the offer plaintext.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Host => "host",
            Self::Port => "port",
            Self::Protocol => "protocol",
            Self::SymmetricKey => "symkey",
            Self::PublicKey => "public_key",
        }
    }
}

impl fmt::Display for OfferField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Account => "account",
            Self::Host => "address",
            Self::Port => "port",
            Self::Protocol => "protocol",
            Self::SymmetricKey => "connsymmkey",
            Self::PublicKey => "public key",
        };
        f.write_str(label)
    }
}

/// Why a contact could not be resolved.
///
/// Every variant is terminal for the `find` call that produced it. Retrying
/// is the caller's decision; an [`ContactError::IdentityMismatch`] in
/// particular must not be retried, the contact has to be re-established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("invalid contact parameter: {0}")]
    InvalidArgument(String),

    #[error("contact transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("contact offer does not exist for {account}: {reason}")]
    OfferNotFound { account: String, reason: String },

    #[error("invalid contact payload from {account}: {reason}")]
    MalformedEnvelope { account: String, reason: String },

    #[error("public key mismatch with contact {account}; new contact request required")]
    IdentityMismatch { account: String },

    #[error("failed to decrypt offer from {account}: {reason}")]
    DecryptionFailure { account: String, reason: String },

    #[error("no connection details published from contact {account}")]
    MalformedConnectionPayload { account: String },

    #[error("no {field} field is published from contact {account}")]
    MissingField { field: OfferField, account: String },

    #[error("{field} mismatch for contact {account}")]
    FieldMismatch { field: OfferField, account: String },

    #[error("contact resolution aborted: {0}")]
    Internal(String),
}

impl ContactError {
    /// True when the failure means the published identity no longer matches
    /// the trusted one.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            Self::IdentityMismatch { .. }
                | Self::FieldMismatch {
                    field: OfferField::PublicKey,
                    ..
                }
        )
    }
}
