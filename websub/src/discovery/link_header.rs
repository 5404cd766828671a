//! `Link` header parsing (RFC 8288).
//!
//! ```text
//! Link: <https://hub.example/>; rel="hub", <https://blog.example/feed>; rel="self"
//! ```

/// One link value: a target and the relations it was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub target: String,
    pub rels: Vec<String>,
}

impl Link {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r.eq_ignore_ascii_case(rel))
    }
}

/// Parse every value of a (possibly repeated) `Link` header.
pub(crate) fn parse_all<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<Link> {
    values.into_iter().flat_map(parse).collect()
}

/// Parse a single `Link` header value, skipping malformed entries.
pub(crate) fn parse(value: &str) -> Vec<Link> {
    split_unquoted(value, ',')
        .into_iter()
        .filter_map(parse_link)
        .collect()
}

/// Target of the first link declaring `rel`.
pub(crate) fn find_rel<'a>(links: &'a [Link], rel: &str) -> Option<&'a str> {
    links
        .iter()
        .find(|link| link.has_rel(rel) && !link.target.is_empty())
        .map(|link| link.target.as_str())
}

fn parse_link(segment: &str) -> Option<Link> {
    let rest = segment.trim().strip_prefix('<')?;
    let (target, params) = rest.split_once('>')?;

    let mut rels = Vec::new();
    for param in split_unquoted(params, ';') {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("rel") {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        rels.extend(value.split_whitespace().map(str::to_ascii_lowercase));
    }

    Some(Link {
        target: target.trim().to_string(),
        rels,
    })
}

/// Split on `separator` outside of `<...>` targets and quoted strings.
fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_target = false;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' if !in_target => in_quotes = !in_quotes,
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            c if c == separator && !in_target && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect()
}
