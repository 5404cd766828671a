//! HTTP helpers shared by discovery and the subscription lifecycle.

use reqwest::{header::CONTENT_TYPE, Response, StatusCode};
use websub_common::model::FORM_CONTENT_TYPE;

use crate::errors::{Error, RequestError, Result};

/// Hubs acknowledge subscription requests with `202 Accepted` and nothing else.
pub(crate) async fn check_accepted(response: Response) -> Result<Response> {
    if response.status() == StatusCode::ACCEPTED {
        return Ok(response);
    }

    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| {
        status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string()
    });

    Err(Error::from(RequestError::Server { status, message }))
}

/// POST a form-encoded body to `hub`, requiring `202 Accepted`.
pub(crate) async fn post_form(http: &reqwest::Client, hub: &str, form: String) -> Result<()> {
    tracing::debug!(hub, "sending hub request");

    let response = http
        .post(hub)
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(form)
        .send()
        .await?;

    check_accepted(response).await?;

    Ok(())
}

/// The media type of a `Content-Type` value, lowercased and without parameters.
pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Canonical string form of a callback URL, or the input unchanged if it does not parse.
pub(crate) fn normalize_url(raw: &str) -> String {
    url::Url::parse(raw)
        .map(String::from)
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_strips_parameters() {
        assert_eq!(media_type("text/html; charset=ISO-8859-1"), "text/html");
        assert_eq!(media_type("Application/RSS+XML"), "application/rss+xml");
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn normalize_url_is_canonical() {
        assert_eq!(normalize_url("HTTPS://Sub.Example/cb"), "https://sub.example/cb");
        assert_eq!(normalize_url("https://sub.example"), "https://sub.example/");
        assert_eq!(normalize_url("not a url"), "not a url");
    }
}
