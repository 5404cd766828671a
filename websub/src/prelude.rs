//! Common imports for quick starts.

// Common
pub use crate::{BuildError, Error, Result};

// Subscriber
pub use crate::{SubscribeOptions, WebSubClient, WebSubClientBuilder};

// What the application receives
pub use crate::{Event, Publish, Subscription, SubscriptionDenied};

// Storage
pub use crate::{MemoryStore, Store};

// Unsubscribing
pub use crate::UnsubscribeRequest;
