use std::collections::HashMap;

use websub_common::Subscription;

/// Which request is awaiting the hub's confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A subscribe request was sent.
    Subscribing,
    /// An unsubscribe request was sent.
    Unsubscribing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntentKey {
    topic: String,
    callback: String,
    direction: Direction,
}

/// Requests sent to a hub that have not been verified yet.
///
/// At most one intent exists per `(topic, callback, direction)`. Intents live in
/// process memory only and are lost on restart.
#[derive(Debug, Default)]
pub struct PendingIntents {
    intents: HashMap<IntentKey, Subscription>,
}

impl PendingIntents {
    /// Register an intent for `subscription`.
    ///
    /// Returns the intent it replaced, if one was already pending for the same key.
    pub fn insert(&mut self, direction: Direction, subscription: Subscription) -> Option<Subscription> {
        let key = IntentKey {
            topic: subscription.topic.clone(),
            callback: subscription.callback.clone(),
            direction,
        };
        self.intents.insert(key, subscription)
    }

    /// Remove and return the intent for the exact key.
    pub fn take(&mut self, topic: &str, callback: &str, direction: Direction) -> Option<Subscription> {
        let key = IntentKey {
            topic: topic.to_string(),
            callback: callback.to_string(),
            direction,
        };
        self.intents.remove(&key)
    }

    /// Remove and return any intent for `topic` in `direction`, whatever its callback.
    pub fn take_by_topic(&mut self, topic: &str, direction: Direction) -> Option<Subscription> {
        let key = self
            .intents
            .keys()
            .find(|key| key.direction == direction && key.topic == topic)?
            .clone();
        self.intents.remove(&key)
    }

    /// Returns true if an intent exists for the exact key.
    pub fn contains(&self, topic: &str, callback: &str, direction: Direction) -> bool {
        self.intents.contains_key(&IntentKey {
            topic: topic.to_string(),
            callback: callback.to_string(),
            direction,
        })
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }
}
