//! `<link rel="self">` / `<link rel="hub">` extraction from HTML pages.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::errors::DiscoveryError;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link").expect("static selector is valid"));

/// Returns the `(self, hub)` hrefs of the first matching `<link>` elements.
///
/// A page without any `<link>` has no hub. Otherwise the self link is
/// required first, then the hub link.
pub(crate) fn extract(body: &str) -> Result<(String, String), DiscoveryError> {
    let document = Html::parse_document(body);

    let links: Vec<(&str, &str)> = document
        .select(&LINK_SELECTOR)
        .map(|element| {
            let element = element.value();
            (
                element.attr("rel").unwrap_or_default(),
                element.attr("href").unwrap_or_default().trim(),
            )
        })
        .collect();

    if links.is_empty() {
        return Err(DiscoveryError::NoHubFound);
    }

    let first = |wanted: &str| {
        links
            .iter()
            .find(|(rel, href)| {
                !href.is_empty()
                    && rel
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case(wanted))
            })
            .map(|(_, href)| href.to_string())
    };

    let self_url = first("self").ok_or(DiscoveryError::NoSelfFound)?;
    let hub_url = first("hub").ok_or(DiscoveryError::NoHubFound)?;

    Ok((self_url, hub_url))
}
