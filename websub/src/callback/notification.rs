use bytes::Bytes;
use websub_common::validate_signature;

use crate::{
    errors::NotificationError,
    events::{Event, Publish},
    util::normalize_url,
    WebSubClient,
};

impl WebSubClient {
    /// Authenticate a content delivery that arrived on `callback` and hand it
    /// to the application as an [`Event::Publish`].
    ///
    /// The first subscription registered with `callback` is used. When it has a
    /// secret, `signature` (the `X-Hub-Signature` header) must match the body.
    pub async fn handle_notification(
        &self,
        callback: &str,
        content_type: Option<&str>,
        signature: Option<&str>,
        body: Bytes,
    ) -> Result<(), NotificationError> {
        let callback = normalize_url(callback);

        let subscription = self
            .store
            .for_callback(&callback)
            .await?
            .into_iter()
            .next()
            .ok_or(NotificationError::NotFound)?;

        if let Some(secret) = subscription.secret.as_deref() {
            let Some(signature) = signature else {
                tracing::warn!(%callback, topic = %subscription.topic, "unsigned delivery rejected");
                return Err(NotificationError::MissingSignature);
            };

            if !validate_signature(&body, secret, signature) {
                tracing::warn!(%callback, topic = %subscription.topic, "delivery with a bad signature rejected");
                return Err(NotificationError::InvalidSignature);
            }
        }

        tracing::debug!(
            %callback,
            topic = %subscription.topic,
            bytes = body.len(),
            "delivery accepted"
        );

        self.emit(Event::Publish(Publish {
            subscription,
            content_type: content_type.map(str::to_string),
            data: body,
        }));

        Ok(())
    }
}
