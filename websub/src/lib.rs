#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

mod callback;
mod client;
pub mod config;
mod discovery;
pub mod errors;
pub mod events;
mod intents;
mod lifecycle;
mod logging;
pub mod store;
mod util;
mod verification;

pub mod prelude;

// --- PUBLIC API EXPORTS ---
// Subscriber handle
pub use client::core::{
    WebSubClient, WebSubClientBuilder, DEFAULT_LEASE, DEFAULT_REQUEST_TIMEOUT,
    EVENT_CHANNEL_CAPACITY,
};
// Requests and callbacks
pub use callback::MAX_NOTIFICATION_BYTES;
pub use discovery::{Discovered, LinkSource};
pub use intents::Direction;
pub use lifecycle::SubscribeOptions;
pub use verification::CallbackQuery;

// Events and storage
pub use events::{Event, Publish, SubscriptionDenied};
pub use store::{MemoryStore, Store, StoreError};

// Errors and logging
pub use errors::{BuildError, Error, Result};
pub use logging::init_tracing_logs_with_config;

// Re-exports
pub use websub_common::{
    sign, validate_signature, Mode, SignatureAlgorithm, SubscribeRequest, Subscription,
    UnsubscribeRequest, SIGNATURE_HEADER,
};
