//! Subscription records and the `hub.*` forms exchanged with a hub.

use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Content type of every request sent to a hub.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Query/form parameter names used by the protocol.
pub mod params {
    /// `hub.mode`
    pub const MODE: &str = "hub.mode";
    /// `hub.topic`
    pub const TOPIC: &str = "hub.topic";
    /// `hub.callback`
    pub const CALLBACK: &str = "hub.callback";
    /// `hub.secret`
    pub const SECRET: &str = "hub.secret";
    /// `hub.lease_seconds`
    pub const LEASE_SECONDS: &str = "hub.lease_seconds";
    /// `hub.challenge`
    pub const CHALLENGE: &str = "hub.challenge";
    /// `hub.reason`
    pub const REASON: &str = "hub.reason";
}

/// Errors produced while building or validating protocol records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `hub.mode` carried a value this subscriber does not understand.
    #[error("unknown hub.mode: {0:?}")]
    UnknownMode(String),

    /// A required field was empty.
    #[error("{field} is required")]
    MissingField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A URL field could not be parsed.
    #[error("{field} is not a valid URL: {source}")]
    InvalidUrl {
        /// Name of the offending field.
        field: &'static str,
        /// Parser failure.
        source: url::ParseError,
    },

    /// The callback must be reachable by the hub over HTTP(S).
    #[error("hub.callback must use http or https, got {0:?}")]
    UnsupportedCallbackScheme(String),

    /// Lease must be a positive number of seconds.
    #[error("hub.lease_seconds must be positive")]
    InvalidLease,

    /// Lease is too large to compute an expiry timestamp.
    #[error("lease of {0:?} cannot be represented as an expiry")]
    LeaseOutOfRange(Duration),
}

/// The `hub.mode` values a subscriber sends or receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Subscribe request, or the hub confirming one.
    Subscribe,
    /// Unsubscribe request, or the hub confirming one.
    Unsubscribe,
    /// The hub refused a subscription.
    Denied,
}

impl Mode {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Subscribe => "subscribe",
            Mode::Unsubscribe => "unsubscribe",
            Mode::Denied => "denied",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Mode::Subscribe),
            "unsubscribe" => Ok(Mode::Unsubscribe),
            "denied" => Ok(Mode::Denied),
            other => Err(Error::UnknownMode(other.to_string())),
        }
    }
}

/// A subscription to a topic, identified by `(topic, callback)`.
///
/// A freshly requested subscription is *provisional*: `lease_time` and `expires`
/// stay unset until the hub verifies the intent, see [`Subscription::confirm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Canonical topic URL.
    pub topic: String,
    /// Callback URL the hub verifies and delivers to.
    pub callback: String,
    /// Shared secret used to sign deliveries, if one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Lease granted by the hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<Duration>,
    /// When the granted lease runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Create a provisional subscription.
    pub fn new(topic: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            callback: callback.into(),
            secret: None,
            lease_time: None,
            expires: None,
        }
    }

    /// Attach a shared secret.
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// Returns true when both `topic` and `callback` match.
    pub fn is_for(&self, topic: &str, callback: &str) -> bool {
        self.topic == topic && self.callback == callback
    }

    /// Record the lease the hub confirmed at `confirmed_at`.
    ///
    /// Sets `expires = confirmed_at + lease`.
    pub fn confirm(&mut self, lease: Duration, confirmed_at: DateTime<Utc>) -> Result<(), Error> {
        let expires = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|delta| confirmed_at.checked_add_signed(delta))
            .ok_or(Error::LeaseOutOfRange(lease))?;

        self.lease_time = Some(lease);
        self.expires = Some(expires);

        Ok(())
    }

    /// Returns true once the hub has confirmed a lease.
    pub fn is_verified(&self) -> bool {
        self.expires.is_some()
    }

    /// Returns true if the confirmed lease has run out at `now`.
    /// Provisional subscriptions never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// `hub.mode=subscribe` request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Topic to subscribe to.
    pub topic: String,
    /// Callback URL.
    pub callback: String,
    /// Optional shared secret.
    pub secret: Option<String>,
    /// Requested lease.
    pub lease_seconds: u64,
}

impl SubscribeRequest {
    /// The mode this request is sent with.
    pub const MODE: Mode = Mode::Subscribe;

    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<(), Error> {
        validate_topic(&self.topic)?;
        validate_callback(&self.callback)?;

        if self.lease_seconds == 0 {
            return Err(Error::InvalidLease);
        }

        Ok(())
    }

    /// Encode as `application/x-www-form-urlencoded`.
    pub fn to_form(&self) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());

        form.append_pair(params::MODE, Self::MODE.as_str())
            .append_pair(params::TOPIC, &self.topic)
            .append_pair(params::CALLBACK, &self.callback);

        if let Some(secret) = self.secret.as_deref().filter(|s| !s.is_empty()) {
            form.append_pair(params::SECRET, secret);
        }

        form.append_pair(params::LEASE_SECONDS, &self.lease_seconds.to_string())
            .finish()
    }
}

/// `hub.mode=unsubscribe` request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeRequest {
    /// Topic to unsubscribe from.
    pub topic: String,
    /// Callback URL the subscription was registered with.
    pub callback: String,
}

impl UnsubscribeRequest {
    /// The mode this request is sent with.
    pub const MODE: Mode = Mode::Unsubscribe;

    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<(), Error> {
        validate_topic(&self.topic)?;
        validate_callback(&self.callback)
    }

    /// Encode as `application/x-www-form-urlencoded`.
    pub fn to_form(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(params::MODE, Self::MODE.as_str())
            .append_pair(params::TOPIC, &self.topic)
            .append_pair(params::CALLBACK, &self.callback)
            .finish()
    }
}

fn validate_topic(topic: &str) -> Result<(), Error> {
    if topic.is_empty() {
        return Err(Error::MissingField { field: "hub.topic" });
    }

    Url::parse(topic).map_err(|source| Error::InvalidUrl {
        field: "hub.topic",
        source,
    })?;

    Ok(())
}

fn validate_callback(callback: &str) -> Result<(), Error> {
    if callback.is_empty() {
        return Err(Error::MissingField {
            field: "hub.callback",
        });
    }

    let url = Url::parse(callback).map_err(|source| Error::InvalidUrl {
        field: "hub.callback",
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::UnsupportedCallbackScheme(other.to_string())),
    }
}
