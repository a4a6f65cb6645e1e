use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use tokio::sync::oneshot;

use crate::contact::{Contact, ResolvedContact};
use crate::error::ContactError;
use crate::resolver::ContactOfferResolver;
use crate::transport::TransportResolver;

/// Entry point for refreshing a stored contact from its published offer.
///
/// Acquires a transport for the contact's last known address, then runs the
/// offer resolver over it. Every call produces exactly one result, including
/// when a collaborator panics.
pub struct ContactFinder {
    transports: Arc<dyn TransportResolver>,
    resolver: ContactOfferResolver,
}

impl ContactFinder {
    pub fn new(transports: Arc<dyn TransportResolver>, resolver: ContactOfferResolver) -> Self {
        Self {
            transports,
            resolver,
        }
    }

    /// Resolve `contact` to its currently published connection details.
    pub async fn find(&self, contact: &Contact) -> Result<ResolvedContact, ContactError> {
        match AssertUnwindSafe(self.find_inner(contact)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                tracing::error!(
                    account = %contact.descriptor.name,
                    reason = %reason,
                    "contact resolution panicked"
                );
                Err(ContactError::Internal(reason))
            }
        }
    }

    /// Resolve `contact` and hand the outcome to `completion`.
    pub async fn find_with<F>(&self, contact: &Contact, completion: F)
    where
        F: FnOnce(Result<ResolvedContact, ContactError>),
    {
        completion(self.find(contact).await);
    }

    /// Resolve `contact` on a background task.
    ///
    /// The receiver yields the single outcome; it reports a closed channel
    /// only if the runtime shuts down first.
    pub fn spawn_find(
        self: &Arc<Self>,
        contact: Contact,
    ) -> oneshot::Receiver<Result<ResolvedContact, ContactError>> {
        let (tx, rx) = oneshot::channel();
        let finder = Arc::clone(self);
        tokio::spawn(async move {
            let result = finder.find(&contact).await;
            let _ = tx.send(result);
        });
        rx
    }

    async fn find_inner(&self, contact: &Contact) -> Result<ResolvedContact, ContactError> {
        contact.descriptor.validate()?;

        let transport = self
            .transports
            .acquire(&contact.address, contact.port)
            .await
            .map_err(|e| ContactError::TransportUnavailable(e.to_string()))?;

        self.resolver
            .resolve(
                transport.as_ref(),
                &contact.descriptor,
                contact.avatar.as_deref(),
            )
            .await
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "collaborator panicked".to_string()
    }
}
