use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContactError, OfferField, ProtocolError};

/// Connection details a peer publishes for one specific reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOffer {
    pub account: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    /// Session key the reader should use for the connection.
    #[serde(rename = "symkey")]
    pub symmetric_key: String,
    /// Publisher's public key (base58); must match the envelope issuer.
    pub public_key: String,
    #[serde(rename = "utype", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl ConnectionOffer {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self)
            .map_err(|e| ProtocolError::Serialization(format!("connection offer: {e}")))
    }

    /// Parse decrypted offer plaintext and check it field by field.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// account, host, port, protocol, symkey, public key.
    pub fn parse_validated(
        plaintext: &str,
        account: &str,
        issuer_key: &str,
    ) -> Result<Self, ContactError> {
        let malformed = || ContactError::MalformedConnectionPayload {
            account: account.to_string(),
        };
        let published = match serde_json::from_str::<Value>(plaintext) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => return Err(malformed()),
            Err(e) => {
                tracing::debug!(account, error = %e, "offer plaintext is not a connection object");
                return Err(malformed());
            }
        };

        let missing = |field| ContactError::MissingField {
            field,
            account: account.to_string(),
        };
        let mismatch = |field| ContactError::FieldMismatch {
            field,
            account: account.to_string(),
        };
        let text = |field: OfferField| text_field(&published, field.wire_name());

        if text(OfferField::Account).as_deref() != Some(account) {
            return Err(mismatch(OfferField::Account));
        }
        let host = text(OfferField::Host).ok_or_else(|| missing(OfferField::Host))?;
        let port = published
            .get(OfferField::Port.wire_name())
            .and_then(parse_port)
            .ok_or_else(|| missing(OfferField::Port))?;
        let protocol = text(OfferField::Protocol).ok_or_else(|| missing(OfferField::Protocol))?;
        let symmetric_key =
            text(OfferField::SymmetricKey).ok_or_else(|| missing(OfferField::SymmetricKey))?;
        let public_key = text(OfferField::PublicKey)
            .filter(|key| key == issuer_key)
            .ok_or_else(|| mismatch(OfferField::PublicKey))?;

        Ok(Self {
            account: account.to_string(),
            host,
            port,
            protocol,
            symmetric_key,
            public_key,
            user_type: text_field(&published, "utype"),
        })
    }
}

/// A non-blank string field. Values of any other JSON type count as absent.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Ports arrive as JSON numbers or numeric strings; zero is treated as absent.
fn parse_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse::<u16>().ok()?,
        _ => return None,
    };
    (port != 0).then_some(port)
}
