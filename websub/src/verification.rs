//! Hub verification of subscription intents.
//!
//! | `hub.mode`    | requires                               | effect                                  |
//! |---------------|----------------------------------------|-----------------------------------------|
//! | `subscribe`   | challenge, pending subscribe intent    | lease committed to the store            |
//! | `unsubscribe` | challenge, pending unsubscribe intent  | subscription removed from the store     |
//! | `denied`      | pending subscribe intent               | intent dropped, denial event emitted    |

use std::time::Duration;

use chrono::Utc;
use url::form_urlencoded;
use websub_common::{model::params, Mode};

use crate::{
    errors::{Result, StoreError, VerificationError},
    events::{Event, SubscriptionDenied},
    intents::Direction,
    util::normalize_url,
    WebSubClient,
};

/// The `hub.*` parameters of a callback request.
///
/// Empty values are treated as absent and the first occurrence of a repeated
/// parameter wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    /// `hub.mode`
    pub mode: Option<String>,
    /// `hub.topic`
    pub topic: Option<String>,
    /// `hub.challenge`
    pub challenge: Option<String>,
    /// `hub.lease_seconds`
    pub lease_seconds: Option<String>,
    /// `hub.reason`
    pub reason: Option<String>,
}

impl CallbackQuery {
    /// Parse a raw query string.
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                params::MODE => &mut parsed.mode,
                params::TOPIC => &mut parsed.topic,
                params::CHALLENGE => &mut parsed.challenge,
                params::LEASE_SECONDS => &mut parsed.lease_seconds,
                params::REASON => &mut parsed.reason,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        parsed
    }
}

impl WebSubClient {
    /// Reconcile a verification request from a hub with the pending intents.
    ///
    /// Returns the challenge to echo back. A denial always ends in
    /// [`VerificationError::Denied`] once its intent has been dropped.
    ///
    /// The callback endpoint of [`WebSubClient::router`] calls this; applications
    /// serving callbacks with their own HTTP stack can call it directly.
    pub async fn verify_subscription(
        &self,
        mode: Mode,
        topic: &str,
        callback: &str,
        query: &CallbackQuery,
    ) -> Result<String> {
        let callback = normalize_url(callback);

        match mode {
            Mode::Subscribe => self.confirm_subscribe(topic, &callback, query).await,
            Mode::Unsubscribe => self.confirm_unsubscribe(topic, &callback, query).await,
            Mode::Denied => Err(self.deny(topic, &callback, query).await.into()),
        }
    }

    async fn confirm_subscribe(&self, topic: &str, callback: &str, query: &CallbackQuery) -> Result<String> {
        let challenge = query.challenge.as_ref().ok_or(VerificationError::NoChallenge)?;

        let mut subscription = self
            .pending
            .lock()
            .await
            .take(topic, callback, Direction::Subscribing)
            .ok_or(VerificationError::NotFound)?;

        let raw_lease = query.lease_seconds.as_deref().unwrap_or_default();
        let Ok(lease_seconds) = raw_lease.trim().parse::<u64>() else {
            return Err(VerificationError::InvalidLease(raw_lease.to_string()).into());
        };
        if subscription
            .confirm(Duration::from_secs(lease_seconds), Utc::now())
            .is_err()
        {
            return Err(VerificationError::InvalidLease(raw_lease.to_string()).into());
        }

        self.store.add(subscription.clone()).await?;

        tracing::info!(
            topic,
            callback,
            lease_seconds,
            expires = ?subscription.expires,
            "subscription verified"
        );

        Ok(challenge.clone())
    }

    async fn confirm_unsubscribe(&self, topic: &str, callback: &str, query: &CallbackQuery) -> Result<String> {
        let challenge = query.challenge.as_ref().ok_or(VerificationError::NoChallenge)?;

        let subscription = {
            let mut pending = self.pending.lock().await;
            pending
                .take(topic, callback, Direction::Unsubscribing)
                .or_else(|| pending.take_by_topic(topic, Direction::Unsubscribing))
        }
        .ok_or(VerificationError::NotFound)?;

        match self.store.remove(&subscription).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::debug!(topic, callback, "subscription was already gone");
            }
            Err(error) => return Err(error.into()),
        }

        tracing::info!(
            topic,
            callback = %subscription.callback,
            "unsubscription verified"
        );

        Ok(challenge.clone())
    }

    async fn deny(&self, topic: &str, callback: &str, query: &CallbackQuery) -> VerificationError {
        let Some(subscription) = self
            .pending
            .lock()
            .await
            .take(topic, callback, Direction::Subscribing)
        else {
            return VerificationError::NotFound;
        };

        let reason = query.reason.clone().unwrap_or_default();
        tracing::warn!(topic, callback, %reason, "subscription denied by hub");

        self.emit(Event::Denied(SubscriptionDenied {
            subscription,
            reason: reason.clone(),
        }));

        VerificationError::Denied { reason }
    }
}
