use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::{
    config::ClientToml,
    errors::BuildError,
    events::Event,
    intents::{Direction, PendingIntents},
    store::{MemoryStore, Store},
};

const DEFAULT_USER_AGENT: &str = concat!("websub-rs", "@", env!("CARGO_PKG_VERSION"),);

/// Lease requested from hubs when neither the call nor the builder names one.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout applied to discovery and hub requests unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Events buffered for the application before new ones are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
#[must_use]
/// Configures a [`WebSubClient`] before construction.
///
/// # Defaults
/// - Store: a fresh [`MemoryStore`]
/// - Callback base: none, so every subscribe call must name its callback
/// - Lease: [`DEFAULT_LEASE`]
/// - HTTP request timeout: [`DEFAULT_REQUEST_TIMEOUT`]
/// - User-agent: `websub-rs@<crate-version>` plus any [`Self::user_agent_extra`]
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// # use websub::WebSubClient;
/// let client = WebSubClient::builder()
///     .callback_base("https://subscriber.example/websub".parse().unwrap())
///     .lease_duration(Duration::from_secs(3600))
///     .build()?;
/// # Ok::<_, websub::BuildError>(())
/// ```
pub struct WebSubClientBuilder {
    store: Option<Arc<dyn Store>>,
    callback_base: Option<Url>,
    lease: Duration,
    http_request_timeout: Option<Duration>,
    http: Option<reqwest::Client>,

    /// Optional user-agent segment appended to the default UA.
    user_agent_extra: Option<String>,
}

impl Default for WebSubClientBuilder {
    fn default() -> Self {
        Self {
            store: None,
            callback_base: None,
            lease: DEFAULT_LEASE,
            http_request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            http: None,
            user_agent_extra: None,
        }
    }
}

impl WebSubClientBuilder {
    /// Apply the `[client]` section of a configuration file.
    pub fn from_config(config: &ClientToml) -> Self {
        Self {
            callback_base: config.callback_base.clone(),
            lease: config.lease(),
            http_request_timeout: config.request_timeout(),
            user_agent_extra: config.user_agent_extra.clone(),
            ..Self::default()
        }
    }

    /// Set the subscription store.
    pub fn store<S: Store + 'static>(&mut self, store: S) -> &mut Self {
        self.store = Some(Arc::new(store));

        self
    }

    /// Share an existing subscription store.
    pub fn shared_store(&mut self, store: Arc<dyn Store>) -> &mut Self {
        self.store = Some(store);

        self
    }

    /// Base URL callbacks are derived from when a subscribe call names none.
    ///
    /// Its origin is also used to rebuild the callback URL of inbound requests.
    pub fn callback_base(&mut self, base: Url) -> &mut Self {
        self.callback_base = Some(base);

        self
    }

    /// Lease requested when a subscribe call does not name one.
    pub fn lease_duration(&mut self, lease: Duration) -> &mut Self {
        self.lease = lease;

        self
    }

    /// Set HTTP requests timeout.
    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.http_request_timeout = Some(timeout);

        self
    }

    /// Use a preconfigured reqwest client. Timeout and user agent settings are ignored.
    pub fn http_client(&mut self, client: reqwest::Client) -> &mut Self {
        self.http = Some(client);

        self
    }

    /// Append an extra user-agent segment after the default `websub-rs@<version>`.
    pub fn user_agent_extra<S: Into<String>>(&mut self, extra: S) -> &mut Self {
        self.user_agent_extra = Some(extra.into());

        self
    }

    /// Build [WebSubClient]
    pub fn build(&self) -> Result<WebSubClient, BuildError> {
        if let Some(base) = &self.callback_base {
            if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
                return Err(BuildError::CallbackBase(base.to_string()));
            }
        }

        let http = match &self.http {
            Some(http) => http.clone(),
            None => {
                let user_agent = match self.user_agent_extra.as_deref().map(str::trim) {
                    Some(extra) if !extra.is_empty() => format!("{DEFAULT_USER_AGENT} {extra}"),
                    _ => DEFAULT_USER_AGENT.to_string(),
                };

                let mut http_builder = reqwest::Client::builder().user_agent(user_agent);
                if let Some(timeout) = self.http_request_timeout {
                    http_builder = http_builder.timeout(timeout);
                }
                http_builder.build()?
            }
        };

        let (events_tx, events_rx) = flume::bounded(EVENT_CHANNEL_CAPACITY);

        Ok(WebSubClient {
            http,
            store: self
                .store
                .clone()
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            pending: Arc::new(Mutex::new(PendingIntents::default())),
            callback_base: self.callback_base.clone(),
            learned_origin: Arc::new(RwLock::new(None)),
            lease: self.lease,
            events_tx,
            events_rx,
        })
    }
}

/// A WebSub subscriber.
///
/// `WebSubClient` negotiates leases with hubs ([`WebSubClient::subscribe`],
/// [`WebSubClient::unsubscribe`]), answers their verification callbacks and
/// authenticates content deliveries ([`WebSubClient::router`]).
///
/// It is a cheap handle: clones share the HTTP connection pool, the store, the
/// pending intents and the event channel. Hand a clone to the HTTP server that
/// exposes the callback endpoint and keep another to issue requests.
///
/// ```no_run
/// # use websub::{WebSubClient, SubscribeOptions, Event};
/// # async fn run() -> websub::Result<()> {
/// let client = WebSubClient::builder()
///     .callback_base("https://subscriber.example".parse().unwrap())
///     .build()?;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
/// let router = client.router();
/// tokio::spawn(async move { axum::serve(listener, router).await });
///
/// client.subscribe(SubscribeOptions::new("https://blog.example/feed.xml")).await?;
///
/// let events = client.events();
/// while let Ok(event) = events.recv_async().await {
///     if let Event::Publish(publish) = event {
///         println!("{} bytes from {}", publish.data.len(), publish.subscription.topic);
///     }
/// }
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct WebSubClient {
    pub(crate) http: reqwest::Client,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) pending: Arc<Mutex<PendingIntents>>,
    pub(crate) callback_base: Option<Url>,
    /// Origin of the first explicit callback, used in place of a missing base.
    pub(crate) learned_origin: Arc<RwLock<Option<String>>>,
    pub(crate) lease: Duration,
    events_tx: flume::Sender<Event>,
    events_rx: flume::Receiver<Event>,
}

impl WebSubClient {
    /// Creates a client with default settings and an in-memory store.
    pub fn new() -> Result<WebSubClient, BuildError> {
        Self::builder().build()
    }

    /// Returns a builder to edit settings before creating [`WebSubClient`].
    pub fn builder() -> WebSubClientBuilder {
        WebSubClientBuilder::default()
    }

    // === Getters ===

    /// The subscription store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The configured callback base, if any.
    pub fn callback_base(&self) -> Option<&Url> {
        self.callback_base.as_ref()
    }

    /// Lease requested when a subscribe call does not name one.
    pub fn lease_duration(&self) -> Duration {
        self.lease
    }

    /// A receiver for notifications and denials.
    ///
    /// Receivers compete: each event is delivered to exactly one of them.
    pub fn events(&self) -> flume::Receiver<Event> {
        self.events_rx.clone()
    }

    /// Returns true while a request for `(topic, callback)` awaits verification.
    pub async fn is_pending(&self, topic: &str, callback: &str, direction: Direction) -> bool {
        self.pending.lock().await.contains(topic, callback, direction)
    }

    /// Number of requests awaiting verification.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    // === Internals ===

    /// Callback derived from the configured base and the SHA-256 of `topic`.
    pub(crate) fn derive_callback(&self, topic: &str) -> Option<String> {
        let base = self.callback_base.as_ref()?;
        let digest = hex::encode(Sha256::digest(topic.as_bytes()));

        Some(format!("{}/{digest}", base.as_str().trim_end_matches('/')))
    }

    /// Adopt the origin of an explicit callback when no base is configured.
    ///
    /// The first callback wins; later ones with another origin are not matched
    /// by [`WebSubClient::router`].
    pub(crate) async fn learn_callback_origin(&self, callback: &str) {
        if self.callback_base.is_some() {
            return;
        }
        let Ok(url) = Url::parse(callback) else {
            return;
        };

        let mut learned = self.learned_origin.write().await;
        if learned.is_none() {
            let origin = url.origin().ascii_serialization();
            tracing::debug!(%origin, "using the callback origin for inbound requests");
            *learned = Some(origin);
        }
    }

    /// Hand an event to the application without blocking.
    pub(crate) fn emit(&self, event: Event) {
        if let Err(error) = self.events_tx.try_send(event) {
            tracing::warn!(%error, "dropping websub event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_callbacks_are_stable_per_topic() {
        let client = WebSubClient::builder()
            .callback_base(Url::parse("https://sub.example/websub/").unwrap())
            .build()
            .unwrap();

        let a = client.derive_callback("https://a.example/feed").unwrap();
        let b = client.derive_callback("https://b.example/feed").unwrap();

        assert_eq!(a, client.derive_callback("https://a.example/feed").unwrap());
        assert_ne!(a, b);
        assert_eq!(
            a,
            format!(
                "https://sub.example/websub/{}",
                hex::encode(Sha256::digest(b"https://a.example/feed"))
            )
        );
        // Not the digest of the empty input.
        assert!(!a.ends_with("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"));
    }

    #[test]
    fn no_base_no_derived_callback() {
        let client = WebSubClient::new().unwrap();
        assert_eq!(client.derive_callback("https://a.example/feed"), None);
    }

    #[test]
    fn rejects_non_http_callback_base() {
        let result = WebSubClient::builder()
            .callback_base(Url::parse("mailto:me@example.com").unwrap())
            .build();

        assert!(matches!(result, Err(BuildError::CallbackBase(_))));
    }

    #[test]
    fn builder_from_config() {
        let config = crate::config::ConfigToml::from_str_with_defaults(
            "[client]\ncallback_base = \"https://sub.example/cb\"\nlease_seconds = 60\n",
        )
        .unwrap();

        let client = WebSubClientBuilder::from_config(&config.client)
            .build()
            .unwrap();

        assert_eq!(client.lease_duration(), Duration::from_secs(60));
        assert_eq!(
            client.callback_base().map(Url::as_str),
            Some("https://sub.example/cb")
        );
    }

    #[tokio::test]
    async fn events_are_dropped_when_full() {
        let client = WebSubClient::new().unwrap();
        let subscription =
            websub_common::Subscription::new("https://a.example/feed", "https://sub.example/cb");

        for _ in 0..EVENT_CHANNEL_CAPACITY + 5 {
            client.emit(Event::Denied(crate::events::SubscriptionDenied {
                subscription: subscription.clone(),
                reason: "full".into(),
            }));
        }

        assert_eq!(client.events().len(), EVENT_CHANNEL_CAPACITY);
    }
}
