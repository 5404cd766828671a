//! Events delivered to the application through [`crate::WebSubClient::events`].

use bytes::Bytes;
use websub_common::Subscription;

/// Something the application should know about.
#[derive(Debug, Clone)]
pub enum Event {
    /// The hub delivered new content for a subscription.
    Publish(Publish),
    /// The hub refused a pending subscription.
    Denied(SubscriptionDenied),
}

/// A content delivery that passed signature validation.
#[derive(Debug, Clone)]
pub struct Publish {
    /// Subscription the delivery arrived for.
    pub subscription: Subscription,
    /// `Content-Type` of the delivery, if the hub sent one.
    pub content_type: Option<String>,
    /// Raw request body, untouched.
    pub data: Bytes,
}

/// The hub answered a subscribe request with `hub.mode=denied`.
#[derive(Debug, Clone)]
pub struct SubscriptionDenied {
    /// The provisional subscription that was refused.
    pub subscription: Subscription,
    /// `hub.reason`, empty when the hub gave none.
    pub reason: String,
}

impl Event {
    /// The subscription this event concerns.
    pub fn subscription(&self) -> &Subscription {
        match self {
            Event::Publish(publish) => &publish.subscription,
            Event::Denied(denied) => &denied.subscription,
        }
    }
}
