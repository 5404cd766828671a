//! Unified error types for the `websub` crate.
//!
//! Every failure a subscriber can hit is mapped into the top-level [`Error`]
//! enum, grouped by where it happened: talking to a hub or topic
//! ([`RequestError`]), locating the hub ([`DiscoveryError`]), reconciling a hub
//! callback ([`VerificationError`]) or persisting records ([`StoreError`]).
//! Deliveries that fail authentication are described by [`NotificationError`],
//! which stays between the callback endpoint and the hub.

use thiserror::Error;

pub use crate::store::StoreError;

// --- Build-Time Error ---

/// Errors that can occur while building a [`crate::WebSubClient`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to build the HTTP client (reqwest configuration).
    #[error("Failed to build the HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured callback base is not an absolute http(s) URL.
    #[error("Invalid callback base {0:?}")]
    CallbackBase(String),
}

// --- The Main Operational Error Enum ---

/// The crate's top-level error type.
///
/// - [`Error::Request`]: HTTP transport, unexpected hub responses, invalid requests
/// - [`Error::Discovery`]: the topic does not advertise a hub and self URL
/// - [`Error::Verification`]: a hub callback could not be reconciled
/// - [`Error::Store`]: the subscription store failed
/// - [`Error::Parse`]: URL parsing failures
/// - [`Error::Build`]: construction of the client failed
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request/response failed (transport, server, validation).
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// Hub discovery failed.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A verification callback was rejected.
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// The subscription store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// URL parsing failed while preparing a request.
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] url::ParseError),

    /// Building the client failed.
    #[error("Client build failed: {0}")]
    Build(#[from] BuildError),
}

// --- Consolidated Request Error ---

/// Transport and server-side HTTP errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network/protocol failure from reqwest (timeouts, TLS, I/O, etc.).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The hub answered with something other than `202 Accepted`.
    #[error("unexpected response code {status}: {message}")]
    Server {
        /// The HTTP status code returned by the hub.
        status: reqwest::StatusCode,
        /// The response body, kept for diagnostics.
        message: String,
    },

    /// The request failed structural validation and was never sent.
    #[error("Invalid request: {0}")]
    Validation(#[from] websub_common::model::Error),
}

// --- Discovery Error ---

/// Failures while locating a topic's hub and self URL.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No hub link was advertised.
    #[error("hub not found")]
    NoHubFound,

    /// No self link was advertised.
    #[error("self link not found")]
    NoSelfFound,

    /// The XML document is not an RSS, Atom or RDF feed.
    #[error("unexpected feed type: {0:?}")]
    UnexpectedFeedType(String),

    /// A `rss`/`rdf` document ended before its `channel` element.
    #[error("feed has no channel element")]
    MissingChannel,

    /// The feed body is not well-formed XML.
    #[error("feed is not valid XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<quick_xml::events::attributes::AttrError> for DiscoveryError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        DiscoveryError::Xml(error.into())
    }
}

// --- Verification Error ---

/// Reasons a hub callback is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// `hub.mode` is missing a required `hub.challenge`.
    #[error("no challenge specified")]
    NoChallenge,

    /// The callback does not match any pending intent or stored subscription.
    #[error("subscription not found")]
    NotFound,

    /// `hub.lease_seconds` is not a non-negative integer.
    #[error("invalid lease duration: {0:?}")]
    InvalidLease(String),

    /// The hub refused the subscription.
    #[error("subscription denied: {reason}")]
    Denied {
        /// Reason supplied by the hub in `hub.reason`.
        reason: String,
    },

    /// `hub.mode` carried an unknown value.
    #[error("unknown hub.mode: {0:?}")]
    UnknownMode(String),

    /// `hub.topic` is missing.
    #[error("no topic specified")]
    MissingTopic,
}

// --- Notification Error ---

/// Reasons a content delivery is refused.
///
/// They are answered to the hub with an HTTP status and never reach the
/// application as events.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No subscription uses the callback the delivery arrived on.
    #[error("no subscription for this callback")]
    NotFound,

    /// The subscription has a secret but the delivery is unsigned.
    #[error("missing X-Hub-Signature")]
    MissingSignature,

    /// The signature does not match the body.
    #[error("invalid X-Hub-Signature")]
    InvalidSignature,

    /// The subscription store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A specialized `Result` type for `websub` operations.
pub type Result<T> = std::result::Result<T, Error>;

// Ergonomic "Staircase" From Implementations ---
// A macro to reduce boilerplate for converting base errors into the top-level Error.
macro_rules! impl_from_for_error {
    ($from_type:ty, $to_variant:path) => {
        impl From<$from_type> for Error {
            fn from(err: $from_type) -> Self {
                $to_variant(err.into())
            }
        }
    };
}

// Request Errors
impl_from_for_error!(reqwest::Error, Error::Request);
impl_from_for_error!(websub_common::model::Error, Error::Request);

// Discovery Errors
impl_from_for_error!(quick_xml::Error, Error::Discovery);
