//! Single pass extraction of `self` and `hub` links from RSS, RDF and Atom feeds.
//!
//! The document is pulled from the response stream one event at a time.
//! Elements that cannot hold the links are skipped without being decoded.

use quick_xml::{
    events::{BytesStart, Event},
    name::QName,
    Decoder, Reader,
};
use tokio::io::AsyncBufRead;

use crate::errors::DiscoveryError;

/// Links found in a feed. Either may be missing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FeedLinks {
    pub self_url: Option<String>,
    pub hub_url: Option<String>,
}

impl FeedLinks {
    fn is_complete(&self) -> bool {
        self.self_url.is_some() && self.hub_url.is_some()
    }

    fn record(&mut self, element: &Element) {
        let (Some(rel), Some(href)) = (&element.rel, &element.href) else {
            return;
        };
        let href = href.trim();
        if href.is_empty() {
            return;
        }

        for rel in rel.split_whitespace() {
            if rel.eq_ignore_ascii_case("self") && self.self_url.is_none() {
                self.self_url = Some(href.to_string());
            } else if rel.eq_ignore_ascii_case("hub") && self.hub_url.is_none() {
                self.hub_url = Some(href.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Rdf,
    Atom,
}

/// An owned start tag. `rel` and `href` are only read for `link` elements.
#[derive(Debug)]
struct Element {
    name: Vec<u8>,
    local: Vec<u8>,
    empty: bool,
    rel: Option<String>,
    href: Option<String>,
}

impl Element {
    fn read(start: &BytesStart<'_>, decoder: Decoder, empty: bool) -> Result<Self, DiscoveryError> {
        let mut element = Element {
            name: start.name().as_ref().to_vec(),
            local: start.local_name().as_ref().to_ascii_lowercase(),
            empty,
            rel: None,
            href: None,
        };

        if element.local == b"link" {
            for attribute in start.attributes() {
                let attribute = attribute?;
                let key = attribute.key.local_name();
                if key.as_ref().eq_ignore_ascii_case(b"rel") {
                    element.rel = Some(attribute.decode_and_unescape_value(decoder)?.into_owned());
                } else if key.as_ref().eq_ignore_ascii_case(b"href") {
                    element.href = Some(attribute.decode_and_unescape_value(decoder)?.into_owned());
                }
            }
        }

        Ok(element)
    }
}

enum Tag {
    Open(Element),
    Close,
    Eof,
}

/// Extract the feed's `self` and `hub` links.
///
/// Fails with [`DiscoveryError::UnexpectedFeedType`] when the root is not `rss`,
/// `rdf` or `feed`, and with [`DiscoveryError::MissingChannel`] when an RSS or
/// RDF document has no `channel`. Scanning stops once both links are known.
pub(crate) async fn extract<R>(source: R) -> Result<FeedLinks, DiscoveryError>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();

    let root = loop {
        match next_tag(&mut reader, &mut buf).await? {
            Tag::Open(element) => break element,
            Tag::Close => continue,
            Tag::Eof => return Err(DiscoveryError::UnexpectedFeedType(String::new())),
        }
    };

    let kind = match root.local.as_slice() {
        b"rss" => FeedKind::Rss,
        b"rdf" => FeedKind::Rdf,
        b"feed" => FeedKind::Atom,
        _ => {
            return Err(DiscoveryError::UnexpectedFeedType(
                String::from_utf8_lossy(&root.name).into_owned(),
            ))
        }
    };
    tracing::debug!(?kind, "scanning feed for links");

    let mut links = FeedLinks::default();

    let container = match kind {
        FeedKind::Atom => root,
        FeedKind::Rss | FeedKind::Rdf => {
            if root.empty {
                return Err(DiscoveryError::MissingChannel);
            }
            find_channel(&mut reader, &mut buf).await?
        }
    };

    if !container.empty {
        scan(&mut reader, &mut buf, &mut links).await?;
    }

    Ok(links)
}

async fn find_channel<R>(reader: &mut Reader<R>, buf: &mut Vec<u8>) -> Result<Element, DiscoveryError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match next_tag(reader, buf).await? {
            Tag::Open(element) if element.local == b"channel" => return Ok(element),
            Tag::Open(element) => skip(reader, buf, &element).await?,
            Tag::Close | Tag::Eof => return Err(DiscoveryError::MissingChannel),
        }
    }
}

/// Visit the children of the current container until both links are found
/// or the container closes.
async fn scan<R>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    links: &mut FeedLinks,
) -> Result<(), DiscoveryError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match next_tag(reader, buf).await? {
            Tag::Open(element) => {
                if element.local == b"link" {
                    links.record(&element);
                    if links.is_complete() {
                        return Ok(());
                    }
                }
                skip(reader, buf, &element).await?;
            }
            Tag::Close | Tag::Eof => return Ok(()),
        }
    }
}

async fn skip<R>(reader: &mut Reader<R>, buf: &mut Vec<u8>, element: &Element) -> Result<(), DiscoveryError>
where
    R: AsyncBufRead + Unpin,
{
    if !element.empty {
        buf.clear();
        reader
            .read_to_end_into_async(QName(&element.name), buf)
            .await?;
    }
    Ok(())
}

async fn next_tag<R>(reader: &mut Reader<R>, buf: &mut Vec<u8>) -> Result<Tag, DiscoveryError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        let event = reader.read_event_into_async(buf).await?;
        // The encoding may have just been detected from a BOM or declaration.
        let decoder = reader.decoder();

        return Ok(match event {
            Event::Start(start) => Tag::Open(Element::read(&start, decoder, false)?),
            Event::Empty(start) => Tag::Open(Element::read(&start, decoder, true)?),
            Event::End(_) => Tag::Close,
            Event::Eof => Tag::Eof,
            _ => continue,
        });
    }
}
