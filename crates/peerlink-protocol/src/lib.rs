pub mod contact;
pub mod envelope;
pub mod error;
pub mod finder;
pub mod offer;
pub mod publisher;
pub mod resolver;
pub mod transport;

pub use contact::{Contact, ContactDescriptor, ResolvedContact};
pub use envelope::{EnvelopeClaims, EnvelopeCodec, SignedEnvelopeCodec, MSG_TYPE_CONTACT_OFFER};
pub use error::{ContactError, OfferField, ProtocolError};
pub use finder::ContactFinder;
pub use offer::ConnectionOffer;
pub use publisher::OfferPublisher;
pub use resolver::{ContactOfferResolver, OfferDecryptor, ResolverConfig};
pub use transport::{MemoryNetwork, RawOffer, Transport, TransportError, TransportResolver};
