use std::time::Duration;

use axum_test::TestServer;
use bytes::Bytes;
use chrono::Utc;
use httpmock::prelude::*;
use sha2::{Digest, Sha256};
use websub::{
    errors::DiscoveryError, sign, Error, Event, LinkSource, SignatureAlgorithm, StoreError,
    SubscribeOptions, UnsubscribeRequest, WebSubClient,
};

const CALLBACK_BASE: &str = "https://subscriber.example/websub";
const SECRET: &str = "s3cret";
const DELIVERY: &[u8] = b"<rss><channel><item><title>new post</title></item></channel></rss>";

struct Harness {
    remote: MockServer,
    client: WebSubClient,
    callbacks: TestServer,
}

impl Harness {
    async fn start() -> Self {
        let remote = MockServer::start_async().await;
        let client = WebSubClient::builder()
            .callback_base(CALLBACK_BASE.parse().unwrap())
            .build()
            .unwrap();
        let callbacks = TestServer::new(client.router()).unwrap();

        Self {
            remote,
            client,
            callbacks,
        }
    }

    fn topic(&self) -> String {
        self.remote.url("/feed.xml")
    }

    fn hub(&self) -> String {
        self.remote.url("/hub")
    }

    /// Serve an RSS feed advertising the hub.
    async fn serve_feed(&self) {
        let feed = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
              <channel>
                <title>Blog</title>
                <atom:link rel="self" href="{}"/>
                <atom:link rel="hub" href="{}"/>
              </channel>
            </rss>"#,
            self.topic(),
            self.hub()
        );

        self.remote
            .mock_async(|when, then| {
                when.method(GET).path("/feed.xml");
                then.status(200)
                    .header("content-type", "application/rss+xml; charset=utf-8")
                    .body(feed);
            })
            .await;
    }

    /// Subscribe to the served feed and let the hub confirm a lease.
    async fn subscribe_and_verify(&self, lease_seconds: u64) {
        self.serve_feed().await;
        self.remote
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hub")
                    .x_www_form_urlencoded_tuple("hub.mode", "subscribe");
                then.status(202);
            })
            .await;

        self.client
            .subscribe(SubscribeOptions::new(self.topic()).secret(SECRET))
            .await
            .unwrap();

        self.callbacks
            .get(&callback_path(&self.topic()))
            .add_query_param("hub.mode", "subscribe")
            .add_query_param("hub.topic", self.topic())
            .add_query_param("hub.challenge", "challenge")
            .add_query_param("hub.lease_seconds", lease_seconds)
            .await
            .assert_status_ok();
    }
}

fn callback_path(topic: &str) -> String {
    format!("/websub/{}", hex::encode(Sha256::digest(topic.as_bytes())))
}

fn callback_url(topic: &str) -> String {
    format!("https://subscriber.example{}", callback_path(topic))
}

#[tokio::test]
async fn subscribe_verify_and_receive() {
    let harness = Harness::start().await;
    let topic = harness.topic();
    let callback = callback_url(&topic);

    harness.serve_feed().await;
    let hub = harness
        .remote
        .mock_async(|when, then| {
            when.method(POST)
                .path("/hub")
                .header("content-type", "application/x-www-form-urlencoded")
                .x_www_form_urlencoded_tuple("hub.mode", "subscribe")
                .x_www_form_urlencoded_tuple("hub.topic", &topic)
                .x_www_form_urlencoded_tuple("hub.callback", &callback)
                .x_www_form_urlencoded_tuple("hub.secret", SECRET)
                .x_www_form_urlencoded_tuple("hub.lease_seconds", "600");
            then.status(202);
        })
        .await;

    let provisional = harness
        .client
        .subscribe(
            SubscribeOptions::new(&topic)
                .secret(SECRET)
                .lease(Duration::from_secs(600)),
        )
        .await
        .unwrap();

    hub.assert_async().await;
    assert_eq!(provisional.topic, topic);
    assert_eq!(provisional.callback, callback);
    assert_eq!(provisional.expires, None);

    // The hub verifies the intent.
    let before = Utc::now();
    let response = harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "subscribe")
        .add_query_param("hub.topic", &topic)
        .add_query_param("hub.challenge", "kTk1Qw-challenge")
        .add_query_param("hub.lease_seconds", "600")
        .await;
    let after = Utc::now();

    response.assert_status_ok();
    response.assert_text("kTk1Qw-challenge");

    let stored = harness
        .client
        .store()
        .get(&topic, &callback)
        .await
        .unwrap()
        .unwrap();
    let expires = stored.expires.unwrap();
    assert_eq!(stored.lease_time, Some(Duration::from_secs(600)));
    assert!(expires >= before + chrono::Duration::seconds(600));
    assert!(expires <= after + chrono::Duration::seconds(600));

    // The hub delivers signed content.
    let events = harness.client.events();
    harness
        .callbacks
        .post(&callback_path(&topic))
        .add_header("content-type", "application/rss+xml")
        .add_header("x-hub-signature", sign(SignatureAlgorithm::Sha1, SECRET, DELIVERY))
        .bytes(Bytes::from_static(DELIVERY))
        .await
        .assert_status_ok();

    match events.try_recv().unwrap() {
        Event::Publish(publish) => {
            assert_eq!(publish.subscription.topic, topic);
            assert_eq!(publish.content_type.as_deref(), Some("application/rss+xml"));
            assert_eq!(publish.data.as_ref(), DELIVERY);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn forged_deliveries_are_forbidden() {
    let harness = Harness::start().await;
    harness.subscribe_and_verify(3600).await;
    let events = harness.client.events();
    let path = callback_path(&harness.topic());

    harness
        .callbacks
        .post(&path)
        .bytes(Bytes::from_static(DELIVERY))
        .await
        .assert_status_forbidden();

    harness
        .callbacks
        .post(&path)
        .add_header("x-hub-signature", sign(SignatureAlgorithm::Sha256, "guess", DELIVERY))
        .bytes(Bytes::from_static(DELIVERY))
        .await
        .assert_status_forbidden();

    let mut tampered = DELIVERY.to_vec();
    tampered[0] ^= 1;
    harness
        .callbacks
        .post(&path)
        .add_header("x-hub-signature", sign(SignatureAlgorithm::Sha256, SECRET, DELIVERY))
        .bytes(Bytes::from(tampered))
        .await
        .assert_status_forbidden();

    assert!(events.is_empty());
}

#[tokio::test]
async fn denied_renewal_keeps_the_stored_secret() {
    let harness = Harness::start().await;
    let topic = harness.topic();
    let callback = callback_url(&topic);
    harness.subscribe_and_verify(3600).await;

    // Renew without a secret; the hub accepts, then denies.
    let renewal = harness
        .client
        .subscribe(SubscribeOptions::new(&topic))
        .await
        .unwrap();
    assert_eq!(renewal.secret, None);

    let stored = harness.client.store().get(&topic, &callback).await.unwrap().unwrap();
    assert_eq!(stored.secret.as_deref(), Some(SECRET));

    harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "denied")
        .add_query_param("hub.topic", &topic)
        .await
        .assert_status_ok();

    let stored = harness.client.store().get(&topic, &callback).await.unwrap().unwrap();
    assert_eq!(stored.secret.as_deref(), Some(SECRET));
    assert!(stored.is_verified());

    let events = harness.client.events();
    while events.try_recv().is_ok() {}

    harness
        .callbacks
        .post(&callback_path(&topic))
        .bytes(Bytes::from_static(b"forged"))
        .await
        .assert_status_forbidden();
    assert!(events.is_empty());
}

#[tokio::test]
async fn verified_renewal_commits_the_new_secret() {
    let harness = Harness::start().await;
    let topic = harness.topic();
    let callback = callback_url(&topic);
    harness.subscribe_and_verify(3600).await;

    harness
        .client
        .subscribe(SubscribeOptions::new(&topic).secret("rotated"))
        .await
        .unwrap();
    assert_eq!(
        harness
            .client
            .store()
            .get(&topic, &callback)
            .await
            .unwrap()
            .unwrap()
            .secret
            .as_deref(),
        Some(SECRET)
    );

    harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "subscribe")
        .add_query_param("hub.topic", &topic)
        .add_query_param("hub.challenge", "again")
        .add_query_param("hub.lease_seconds", "7200")
        .await
        .assert_text("again");

    let stored = harness.client.store().get(&topic, &callback).await.unwrap().unwrap();
    assert_eq!(stored.secret.as_deref(), Some("rotated"));
    assert_eq!(stored.lease_time, Some(Duration::from_secs(7200)));
}

#[tokio::test]
async fn delivery_to_unknown_callback_is_not_found() {
    let harness = Harness::start().await;

    harness
        .callbacks
        .post("/websub/unknown")
        .bytes(Bytes::from_static(DELIVERY))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn verification_without_intent_is_not_found() {
    let harness = Harness::start().await;
    let topic = harness.topic();

    harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "subscribe")
        .add_query_param("hub.topic", &topic)
        .add_query_param("hub.challenge", "c")
        .add_query_param("hub.lease_seconds", "60")
        .await
        .assert_status_not_found();

    assert_eq!(
        harness
            .client
            .store()
            .get(&topic, &callback_url(&topic))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn malformed_verifications_are_bad_requests() {
    let harness = Harness::start().await;
    let path = callback_path(&harness.topic());

    harness
        .callbacks
        .get(&path)
        .add_query_param("hub.mode", "publish")
        .add_query_param("hub.topic", harness.topic())
        .await
        .assert_status_bad_request();

    harness
        .callbacks
        .get(&path)
        .add_query_param("hub.mode", "subscribe")
        .add_query_param("hub.challenge", "c")
        .await
        .assert_status_bad_request();

    harness
        .callbacks
        .get(&path)
        .add_query_param("hub.mode", "subscribe")
        .add_query_param("hub.topic", harness.topic())
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn denial_is_acknowledged_and_reported() {
    let harness = Harness::start().await;
    let topic = harness.topic();
    harness.serve_feed().await;
    harness
        .remote
        .mock_async(|when, then| {
            when.method(POST).path("/hub");
            then.status(202);
        })
        .await;

    harness
        .client
        .subscribe(SubscribeOptions::new(&topic))
        .await
        .unwrap();
    assert_eq!(harness.client.pending_count().await, 1);

    let events = harness.client.events();
    let response = harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "denied")
        .add_query_param("hub.topic", &topic)
        .add_query_param("hub.reason", "topic is private")
        .await;

    response.assert_status_ok();
    response.assert_text("");
    assert_eq!(harness.client.pending_count().await, 0);

    match events.try_recv().unwrap() {
        Event::Denied(denied) => {
            assert_eq!(denied.reason, "topic is private");
            assert_eq!(denied.subscription.callback, callback_url(&topic));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // A second denial has nothing left to match.
    harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "denied")
        .add_query_param("hub.topic", &topic)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn unsubscribe_round_trip() {
    let harness = Harness::start().await;
    let topic = harness.topic();
    let callback = callback_url(&topic);
    harness.subscribe_and_verify(3600).await;

    let hub = harness
        .remote
        .mock_async(|when, then| {
            when.method(POST)
                .path("/hub")
                .x_www_form_urlencoded_tuple("hub.mode", "unsubscribe")
                .x_www_form_urlencoded_tuple("hub.topic", &topic)
                .x_www_form_urlencoded_tuple("hub.callback", &callback);
            then.status(202);
        })
        .await;

    harness
        .client
        .unsubscribe(UnsubscribeRequest {
            topic: topic.clone(),
            callback: callback.clone(),
        })
        .await
        .unwrap();
    hub.assert_async().await;

    // Still subscribed until the hub confirms.
    assert!(harness
        .client
        .store()
        .get(&topic, &callback)
        .await
        .unwrap()
        .is_some());

    harness
        .callbacks
        .get(&callback_path(&topic))
        .add_query_param("hub.mode", "unsubscribe")
        .add_query_param("hub.topic", &topic)
        .add_query_param("hub.challenge", "bye")
        .await
        .assert_text("bye");

    assert_eq!(harness.client.store().get(&topic, &callback).await.unwrap(), None);
}

#[tokio::test]
async fn unsubscribe_unknown_subscription() {
    let harness = Harness::start().await;
    harness.serve_feed().await;

    let result = harness
        .client
        .unsubscribe(UnsubscribeRequest {
            topic: harness.topic(),
            callback: callback_url(&harness.topic()),
        })
        .await;

    assert!(matches!(result, Err(Error::Store(StoreError::NotFound))));
}

#[tokio::test]
async fn link_headers_take_precedence_over_the_body() {
    let harness = Harness::start().await;
    let link = format!(
        r#"<{}>; rel="hub", <{}>; rel="self""#,
        harness.remote.url("/header-hub"),
        harness.remote.url("/canonical")
    );
    let body = r#"<html><head>
        <link rel="self" href="https://body.example/self">
        <link rel="hub" href="https://body.example/hub">
    </head></html>"#;

    harness
        .remote
        .mock_async(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .header("content-type", "text/html")
                .header("link", link)
                .body(body);
        })
        .await;

    let discovered = harness
        .client
        .discover(&harness.remote.url("/page"))
        .await
        .unwrap();

    assert_eq!(discovered.source, LinkSource::LinkHeader);
    assert_eq!(discovered.hub_url, harness.remote.url("/header-hub"));
    assert_eq!(discovered.self_url, harness.remote.url("/canonical"));
}

#[tokio::test]
async fn incomplete_link_headers_fall_back_to_the_body() {
    let harness = Harness::start().await;

    harness
        .remote
        .mock_async(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .header("link", r#"<https://header.example/hub>; rel="hub""#)
                .body(
                    r#"<html><head>
                    <link rel="self" href="https://body.example/self">
                    <link rel="hub" href="https://body.example/hub">
                    </head></html>"#,
                );
        })
        .await;

    let discovered = harness
        .client
        .discover(&harness.remote.url("/page"))
        .await
        .unwrap();

    assert_eq!(discovered.source, LinkSource::Html);
    assert_eq!(discovered.self_url, "https://body.example/self");
    assert_eq!(discovered.hub_url, "https://body.example/hub");
}

#[tokio::test]
async fn atom_feed_discovery() {
    let harness = Harness::start().await;

    harness
        .remote
        .mock_async(|when, then| {
            when.method(GET).path("/atom");
            then.status(200)
                .header("content-type", "application/atom+xml")
                .body(
                    r#"<?xml version="1.0" encoding="utf-8"?>
                    <feed xmlns="http://www.w3.org/2005/Atom">
                      <link rel="hub" href="https://hub.example/"/>
                      <link rel="self" href="/atom"/>
                    </feed>"#,
                );
        })
        .await;

    let discovered = harness
        .client
        .discover(&harness.remote.url("/atom"))
        .await
        .unwrap();

    assert_eq!(discovered.source, LinkSource::Feed);
    assert_eq!(discovered.hub_url, "https://hub.example/");
    // Relative links resolve against the topic.
    assert_eq!(discovered.self_url, harness.remote.url("/atom"));
}

#[tokio::test]
async fn rss_without_channel_fails_before_contacting_a_hub() {
    let harness = Harness::start().await;

    harness
        .remote
        .mock_async(|when, then| {
            when.method(GET).path("/feed.xml");
            then.status(200)
                .header("content-type", "text/xml")
                .body(r#"<rss version="2.0"><item><title>orphan</title></item></rss>"#);
        })
        .await;
    let hub = harness
        .remote
        .mock_async(|when, then| {
            when.method(POST);
            then.status(202);
        })
        .await;

    let result = harness
        .client
        .subscribe(SubscribeOptions::new(harness.topic()))
        .await;

    assert!(matches!(
        result,
        Err(Error::Discovery(DiscoveryError::MissingChannel))
    ));
    hub.assert_hits_async(0).await;
}

#[tokio::test]
async fn unsupported_content_type_has_no_hub() {
    let harness = Harness::start().await;

    harness
        .remote
        .mock_async(|when, then| {
            when.method(GET).path("/data");
            then.status(200)
                .header("content-type", "application/json")
                .body("{}");
        })
        .await;

    let result = harness
        .client
        .discover(&harness.remote.url("/data"))
        .await;

    assert!(matches!(
        result,
        Err(Error::Discovery(DiscoveryError::NoHubFound))
    ));
}
