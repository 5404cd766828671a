use axum::{extract::Request, Router};
use tower_http::trace::TraceLayer;
use tracing::Level;

/// Wrap the callback endpoint in a request span.
///
/// Only the path is recorded: verification queries carry challenges.
pub(crate) fn with_trace_layer(router: Router) -> Router {
    router.layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::span!(
            Level::INFO,
            "callback",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }))
}
