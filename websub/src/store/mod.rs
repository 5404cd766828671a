//! Durable home of subscription records.
//!
//! The client only keeps transient copies; a [`Store`] owns every committed
//! [`Subscription`], keyed by `(topic, callback)`.

use async_trait::async_trait;
use websub_common::Subscription;

mod memory;

pub use memory::MemoryStore;

/// Errors a [`Store`] implementation may report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No subscription exists for the given key.
    #[error("subscription not found")]
    NotFound,

    /// The backing storage failed.
    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Subscription storage.
///
/// Implementations must be internally consistent for each call; nothing spans a
/// subscribe request and its later verification callback.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Insert or replace the subscription stored under `(topic, callback)`.
    async fn add(&self, subscription: Subscription) -> Result<(), StoreError>;

    /// Look up the subscription stored under `(topic, callback)`.
    async fn get(&self, topic: &str, callback: &str) -> Result<Option<Subscription>, StoreError>;

    /// Remove the subscription stored under the key of `subscription`.
    ///
    /// Returns [`StoreError::NotFound`] if nothing was stored.
    async fn remove(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// All subscriptions registered with `callback`.
    async fn for_callback(&self, callback: &str) -> Result<Vec<Subscription>, StoreError>;
}
