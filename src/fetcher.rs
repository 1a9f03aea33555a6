use std::time::Duration;

use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::{Client, Proxy};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ErrorChannel, FetchError};

pub const USER_AGENT: &str = "Mozilla/5.0";

/// Timeout for news-search queries.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Timeout for mirror feeds, the fallback query and enrichment lookups.
pub const MIRROR_TIMEOUT: Duration = Duration::from_secs(15);

/// One provider-supplied entry. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
}

impl RawEntry {
    pub fn title(&self) -> &str {
        self.title.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn link(&self) -> &str {
        self.link.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn summary(&self) -> &str {
        self.summary.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn published(&self) -> &str {
        self.published.as_deref().map(str::trim).unwrap_or_default()
    }
}

impl From<Entry> for RawEntry {
    fn from(entry: Entry) -> Self {
        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc2822());

        let summary = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        Self {
            title: entry.title.map(|t| t.content),
            link: entry.links.into_iter().next().map(|l| l.href),
            summary,
            published,
        }
    }
}

/// Entries of a single fetch, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeed {
    pub entries: Vec<RawEntry>,
}

impl RawFeed {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct Fetcher {
    client: Client,
    errors: ErrorChannel,
}

impl Fetcher {
    /// Build a fetcher. When `proxy` is set, both HTTP and HTTPS go through it.
    pub fn new(proxy: Option<&str>, errors: ErrorChannel) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .user_agent(USER_AGENT);

        builder = match proxy {
            Some(address) => builder.proxy(Proxy::all(address).map_err(FetchError::Client)?),
            // Ignore HTTP(S)_PROXY from the environment as well.
            None => builder.no_proxy(),
        };

        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self { client, errors })
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Fetch and parse a feed. Any failure is reported on the error channel
    /// and yields an empty feed.
    pub async fn fetch(&self, origin: &str, url: &str, timeout: Duration) -> RawFeed {
        match self.try_fetch(url, timeout).await {
            Ok(feed) => {
                info!(origin, url, entries = feed.len(), "Fetched feed");
                feed
            }
            Err(e) => {
                self.errors.report(origin, &e);
                RawFeed::default()
            }
        }
    }

    async fn try_fetch(&self, url: &str, timeout: Duration) -> Result<RawFeed, FetchError> {
        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body_len: bytes.len(),
            });
        }

        parse_feed(&bytes).ok_or_else(|| FetchError::Parse {
            url: url.to_string(),
        })
    }
}

/// Parse a feed document, salvaging what we can from broken XML.
///
/// Returns `None` only when nothing at all could be recovered.
pub fn parse_feed(bytes: &[u8]) -> Option<RawFeed> {
    match parser::parse(bytes) {
        Ok(feed) => {
            let mut entries: Vec<RawEntry> =
                feed.entries.into_iter().map(RawEntry::from).collect();
            restore_raw_links(bytes, &mut entries);
            Some(RawFeed { entries })
        }
        Err(e) => {
            debug!(error = %e, "Feed parser rejected document, salvaging entries");
            let entries = salvage_entries(bytes);
            if entries.is_empty() {
                None
            } else {
                Some(RawFeed { entries })
            }
        }
    }
}

/// feed-rs normalises link URLs (`http://y` comes back as `http://y/`).
/// Put back the link text each entry actually carried, provided the raw
/// blocks line up one-to-one with the parsed entries.
fn restore_raw_links(xml_bytes: &[u8], entries: &mut [RawEntry]) {
    let xml = String::from_utf8_lossy(xml_bytes);
    let blocks = entry_blocks(&xml);
    if blocks.len() != entries.len() {
        return;
    }

    for (entry, block) in entries.iter_mut().zip(blocks) {
        if let Some(link) = block_link(block) {
            entry.link = Some(link);
        }
    }
}

/// Scan raw `<item>` / `<entry>` blocks for the fields we care about.
pub fn salvage_entries(xml_bytes: &[u8]) -> Vec<RawEntry> {
    let xml = String::from_utf8_lossy(xml_bytes);

    entry_blocks(&xml)
        .into_iter()
        .map(|block| RawEntry {
            title: extract_xml_element(block, "title"),
            link: block_link(block),
            summary: extract_xml_element(block, "description")
                .or_else(|| extract_xml_element(block, "summary")),
            published: extract_xml_element(block, "pubDate")
                .or_else(|| extract_xml_element(block, "published"))
                .or_else(|| extract_xml_element(block, "updated")),
        })
        .filter(|entry| entry.title.is_some() || entry.link.is_some())
        .collect()
}

/// Bodies of the `<item>` blocks, or of the `<entry>` blocks if there are
/// no items.
fn entry_blocks(xml: &str) -> Vec<&str> {
    for tag in ["item", "entry"] {
        let start_tag = format!("<{}>", tag);
        let end_tag = format!("</{}>", tag);

        let blocks: Vec<&str> = xml
            .split(start_tag.as_str())
            .skip(1)
            .map(|block| {
                // The last block of a truncated document has no closing tag.
                let block_end = block.find(&end_tag).unwrap_or(block.len());
                &block[..block_end]
            })
            .collect();

        if !blocks.is_empty() {
            return blocks;
        }
    }

    Vec::new()
}

fn block_link(block: &str) -> Option<String> {
    extract_xml_element(block, "link")
        .filter(|l| !l.is_empty())
        .or_else(|| extract_xml_attribute(block, "link", "href"))
}

/// Locate `<tag ...>`, returning the offset just past it and the text between
/// the angle brackets.
fn find_open_tag<'a>(xml: &'a str, tag: &str) -> Option<(usize, &'a str)> {
    let needle = format!("<{}", tag);
    let mut from = 0;

    while let Some(pos) = xml[from..].find(&needle) {
        let start = from + pos;
        let after = start + needle.len();
        match xml[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => {
                let close = xml[after..].find('>')? + after;
                return Some((close + 1, &xml[start + 1..close]));
            }
            _ => from = after,
        }
    }

    None
}

pub fn extract_xml_element(xml: &str, tag: &str) -> Option<String> {
    let (start, head) = find_open_tag(xml, tag)?;
    if head.ends_with('/') {
        return None;
    }

    let end_tag = format!("</{}>", tag);
    let end = xml[start..].find(&end_tag)? + start;

    Some(unescape(strip_cdata(xml[start..end].trim())))
}

pub fn extract_xml_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let (_, head) = find_open_tag(xml, tag)?;
    let needle = format!("{}=\"", attr);
    let start = head.find(&needle)? + needle.len();
    let end = head[start..].find('"')? + start;

    Some(unescape(&head[start..end]))
}

fn strip_cdata(text: &str) -> &str {
    text.strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(text)
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
