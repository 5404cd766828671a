//! The callback endpoint hubs talk to.
//!
//! Requests carrying `hub.mode` are verification requests, anything else is a
//! content delivery.

mod http_error;
mod notification;
mod trace;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, OriginalUri, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Router,
};
use websub_common::{Mode, SIGNATURE_HEADER};

use crate::{
    errors::{Error, VerificationError},
    verification::CallbackQuery,
    WebSubClient,
};

use http_error::HttpResult;

/// Largest delivery body accepted by [`WebSubClient::router`].
pub const MAX_NOTIFICATION_BYTES: usize = 10 * 1024 * 1024;

impl WebSubClient {
    /// An [`axum::Router`] serving every callback of this client.
    ///
    /// It answers on any path and method. Mount it at the root of the server
    /// that the callback base points to, or nest it and keep the callback base
    /// path in sync.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .fallback(callback)
            .layer(DefaultBodyLimit::max(MAX_NOTIFICATION_BYTES))
            .with_state(self.clone());

        trace::with_trace_layer(router)
    }

    /// The callback URL a request was sent to.
    ///
    /// The origin comes from the callback base when one is configured, then from
    /// the first explicit callback subscribed with, otherwise from the `Host`
    /// header over plain HTTP.
    pub(crate) async fn inbound_callback_url(&self, headers: &HeaderMap, path: &str) -> String {
        let origin = match &self.callback_base {
            Some(base) => base.origin().ascii_serialization(),
            None => match self.learned_origin.read().await.clone() {
                Some(origin) => origin,
                None => {
                    let host = headers
                        .get(HOST)
                        .and_then(|host| host.to_str().ok())
                        .unwrap_or("localhost");
                    format!("http://{host}")
                }
            },
        };

        format!("{origin}{path}")
    }
}

async fn callback(
    State(client): State<WebSubClient>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Response> {
    let query = CallbackQuery::parse(uri.query().unwrap_or_default());
    let callback = client.inbound_callback_url(&headers, uri.path()).await;

    let Some(mode) = query.mode.as_deref() else {
        let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());

        client
            .handle_notification(&callback, content_type, signature, body)
            .await?;

        return Ok(StatusCode::OK.into_response());
    };

    let mode = match mode.parse::<Mode>() {
        Ok(mode) => mode,
        Err(_) => return Err(VerificationError::UnknownMode(mode.to_string()).into()),
    };
    let topic = query
        .topic
        .as_deref()
        .ok_or(VerificationError::MissingTopic)?;

    match client.verify_subscription(mode, topic, &callback, &query).await {
        Ok(challenge) => Ok((StatusCode::OK, challenge).into_response()),
        // The hub only needs to know the denial arrived.
        Err(Error::Verification(VerificationError::Denied { .. })) => {
            Ok(StatusCode::OK.into_response())
        }
        Err(error) => Err(error.into()),
    }
}
