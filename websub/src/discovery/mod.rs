//! Hub discovery.
//!
//! A topic advertises its hub and canonical URL either in `Link` response
//! headers, which take precedence, or in its body: `<link>` elements of an
//! RSS, RDF or Atom feed, or of an HTML page.

mod feed;
mod html;
mod link_header;

use std::io;

use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_TYPE, LINK};
use tokio_util::io::StreamReader;
use url::Url;

use crate::{
    errors::{DiscoveryError, Result},
    util::media_type,
    WebSubClient,
};

/// Where the links of a topic were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    /// `Link` response headers.
    LinkHeader,
    /// An RSS, RDF or Atom document.
    Feed,
    /// An HTML page.
    Html,
}

impl LinkSource {
    /// The body parser for a media type, if it is one that can carry links.
    fn for_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "text/xml" | "application/xml" | "application/rss+xml" | "application/atom+xml"
            | "application/rdf+xml" => Some(LinkSource::Feed),
            "text/html" => Some(LinkSource::Html),
            _ => None,
        }
    }
}

/// A topic's canonical URL and hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// The `self` link: the topic URL to subscribe with.
    pub self_url: String,
    /// The `hub` link: where subscription requests go.
    pub hub_url: String,
    /// Where the links were found.
    pub source: LinkSource,
}

impl WebSubClient {
    /// Fetch `topic` and find its `self` and `hub` links.
    ///
    /// Relative links are resolved against the final URL of the response.
    pub async fn discover(&self, topic: &str) -> Result<Discovered> {
        let topic_url = Url::parse(topic)?;

        tracing::debug!(topic, "discovering hub");

        let response = self.http.get(topic_url).send().await?;
        if !response.status().is_success() {
            tracing::debug!(topic, status = %response.status(), "topic answered with an error status");
        }

        let base = response.url().clone();

        let links = link_header::parse_all(
            response
                .headers()
                .get_all(LINK)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        if let (Some(self_url), Some(hub_url)) = (
            link_header::find_rel(&links, "self"),
            link_header::find_rel(&links, "hub"),
        ) {
            return Ok(Discovered {
                self_url: absolute(&base, self_url),
                hub_url: absolute(&base, hub_url),
                source: LinkSource::LinkHeader,
            });
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type)
            .unwrap_or_default();

        tracing::debug!(topic, %media_type, "no usable Link headers, reading body");

        let (self_url, hub_url, source) = match LinkSource::for_media_type(&media_type) {
            Some(LinkSource::Feed) => {
                let stream = response.bytes_stream().map_err(io::Error::other);
                let links = feed::extract(StreamReader::new(Box::pin(stream))).await?;

                let self_url = links.self_url.ok_or(DiscoveryError::NoSelfFound)?;
                let hub_url = links.hub_url.ok_or(DiscoveryError::NoHubFound)?;
                (self_url, hub_url, LinkSource::Feed)
            }
            Some(LinkSource::Html) => {
                let body = response.text().await?;
                let (self_url, hub_url) = html::extract(&body)?;
                (self_url, hub_url, LinkSource::Html)
            }
            Some(LinkSource::LinkHeader) | None => return Err(DiscoveryError::NoHubFound.into()),
        };

        Ok(Discovered {
            self_url: absolute(&base, &self_url),
            hub_url: absolute(&base, &hub_url),
            source,
        })
    }
}

/// Absolute links are kept verbatim, relative ones are joined to `base`.
fn absolute(base: &Url, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }

    base.join(href)
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}
