use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use websub_common::Subscription;

use super::{Store, StoreError};

type Key = (String, String);

/// In-process [`Store`]. Records are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscriptions: RwLock<HashMap<Key, Subscription>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}

fn key_of(subscription: &Subscription) -> Key {
    (subscription.topic.clone(), subscription.callback.clone())
}

#[async_trait]
impl Store for MemoryStore {
    async fn add(&self, subscription: Subscription) -> Result<(), StoreError> {
        self.subscriptions
            .write()
            .await
            .insert(key_of(&subscription), subscription);
        Ok(())
    }

    async fn get(&self, topic: &str, callback: &str) -> Result<Option<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .get(&(topic.to_string(), callback.to_string()))
            .cloned())
    }

    async fn remove(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.subscriptions
            .write()
            .await
            .remove(&key_of(subscription))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn for_callback(&self, callback: &str) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        let mut matching: Vec<Subscription> = subscriptions
            .values()
            .filter(|sub| sub.callback == callback)
            .cloned()
            .collect();
        // Stable order for callers that pick the first match.
        matching.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(matching)
    }
}
