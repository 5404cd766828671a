//! Subscribe and unsubscribe requests.
//!
//! Both only *ask* the hub: a `202 Accepted` means the request was queued, and
//! the hub later confirms it through the callback endpoint.

use std::time::Duration;

use websub_common::{SubscribeRequest, Subscription, UnsubscribeRequest};

use crate::{
    errors::{Result, StoreError},
    intents::Direction,
    util::{normalize_url, post_form},
    WebSubClient,
};

/// Options of a [`WebSubClient::subscribe`] call.
///
/// Only the topic is required:
/// - without a hub, the topic is fetched and its advertised `self` and `hub`
///   links are used instead,
/// - without a callback, one is derived from the client's callback base,
/// - without a lease, the client's default lease is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct SubscribeOptions {
    /// Hub to send the request to. Skips discovery.
    pub hub: Option<String>,
    /// Topic URL.
    pub topic: String,
    /// Callback URL the hub verifies and delivers to.
    pub callback: Option<String>,
    /// Shared secret the hub signs deliveries with.
    pub secret: Option<String>,
    /// Requested lease.
    pub lease: Option<Duration>,
}

impl SubscribeOptions {
    /// Subscribe to `topic` with every other option left to defaults.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Send the request to `hub` without discovering it.
    pub fn hub(mut self, hub: impl Into<String>) -> Self {
        self.hub = Some(hub.into());
        self
    }

    /// Use an explicit callback URL.
    pub fn callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Ask the hub to sign deliveries with `secret`.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Request a lease other than the client default.
    pub fn lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }
}

impl WebSubClient {
    /// Ask a hub to deliver updates of a topic to a callback.
    ///
    /// The request is validated before anything is sent. A provisional
    /// subscription is stored before the hub is contacted and returned once the
    /// hub accepts the request; its lease is only set when the hub verifies the
    /// intent through the callback endpoint.
    ///
    /// An already stored subscription is left untouched: the requested secret
    /// replaces its secret only once the hub verifies the renewal.
    ///
    /// # Errors
    /// - [`crate::errors::Error::Discovery`] if no hub was given and the topic does not advertise one.
    /// - [`crate::errors::Error::Request`] if the request is invalid, the hub is
    ///   unreachable or it answers with anything but `202 Accepted`.
    /// - [`crate::errors::Error::Store`] if the provisional record cannot be stored.
    pub async fn subscribe(&self, options: SubscribeOptions) -> Result<Subscription> {
        let SubscribeOptions {
            hub,
            topic,
            callback,
            secret,
            lease,
        } = options;

        let (topic, hub) = match hub.filter(|hub| !hub.is_empty()) {
            Some(hub) => (topic, hub),
            None => {
                let discovered = self.discover(&topic).await?;
                (discovered.self_url, discovered.hub_url)
            }
        };

        let callback = callback
            .filter(|callback| !callback.is_empty())
            .or_else(|| self.derive_callback(&topic))
            .map(|callback| normalize_url(&callback))
            .unwrap_or_default();

        let lease_seconds = lease
            .map(|lease| lease.as_secs())
            .filter(|seconds| *seconds > 0)
            .unwrap_or_else(|| self.lease.as_secs());

        let request = SubscribeRequest {
            topic,
            callback,
            secret: secret.filter(|secret| !secret.is_empty()),
            lease_seconds,
        };
        request.validate()?;

        // An existing record stays as it is until the hub confirms; only the
        // intent carries the requested secret.
        let subscription = match self.store.get(&request.topic, &request.callback).await? {
            Some(existing) => Subscription {
                secret: request.secret.clone(),
                ..existing
            },
            None => {
                let provisional = Subscription::new(&request.topic, &request.callback)
                    .with_secret(request.secret.clone());
                self.store.add(provisional.clone()).await?;
                provisional
            }
        };
        self.learn_callback_origin(&subscription.callback).await;

        self.register_intent(Direction::Subscribing, &subscription)
            .await;

        if let Err(error) = post_form(&self.http, &hub, request.to_form()).await {
            self.forget_intent(Direction::Subscribing, &subscription)
                .await;
            return Err(error);
        }

        tracing::info!(
            topic = %subscription.topic,
            callback = %subscription.callback,
            hub = %hub,
            lease_seconds,
            "subscription requested"
        );

        Ok(subscription)
    }

    /// Ask the topic's hub to stop deliveries to `request.callback`.
    ///
    /// The topic is discovered again to find its canonical URL and hub. The
    /// subscription is only removed from the store once the hub confirms.
    ///
    /// # Errors
    /// - [`crate::errors::Error::Store`] with [`StoreError::NotFound`] if there is no such subscription.
    /// - Discovery and request errors as for [`WebSubClient::subscribe`].
    pub async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<()> {
        let discovered = self.discover(&request.topic).await?;

        self.unsubscribe_via(
            &discovered.hub_url,
            UnsubscribeRequest {
                topic: discovered.self_url,
                callback: request.callback,
            },
        )
        .await
    }

    /// Like [`WebSubClient::unsubscribe`] for a topic whose hub is already known.
    ///
    /// `request.topic` must be the canonical topic the subscription was made with.
    pub async fn unsubscribe_via(&self, hub: &str, request: UnsubscribeRequest) -> Result<()> {
        let request = UnsubscribeRequest {
            callback: normalize_url(&request.callback),
            ..request
        };
        request.validate()?;

        let subscription = self
            .store
            .get(&request.topic, &request.callback)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.register_intent(Direction::Unsubscribing, &subscription)
            .await;

        if let Err(error) = post_form(&self.http, hub, request.to_form()).await {
            self.forget_intent(Direction::Unsubscribing, &subscription)
                .await;
            return Err(error);
        }

        tracing::info!(
            topic = %subscription.topic,
            callback = %subscription.callback,
            hub,
            "unsubscription requested"
        );

        Ok(())
    }

    async fn register_intent(&self, direction: Direction, subscription: &Subscription) {
        let replaced = self
            .pending
            .lock()
            .await
            .insert(direction, subscription.clone());

        if replaced.is_some() {
            tracing::warn!(
                topic = %subscription.topic,
                callback = %subscription.callback,
                ?direction,
                "replaced a request still awaiting verification"
            );
        }
    }

    async fn forget_intent(&self, direction: Direction, subscription: &Subscription) {
        self.pending
            .lock()
            .await
            .take(&subscription.topic, &subscription.callback, direction);
    }
}
