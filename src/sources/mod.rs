//! Source adapters: news-search queries for the agencies and the mirror
//! fallback chain for the social feed.

pub mod agency;
pub mod musk;

use std::fmt;

use serde::Serialize;

pub use agency::AgencySource;
pub use musk::MirrorSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reuters,
    Bloomberg,
    Musk,
}

impl Source {
    pub fn name(&self) -> &'static str {
        match self {
            Source::Reuters => "Reuters",
            Source::Bloomberg => "Bloomberg",
            Source::Musk => "Musk",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A headline as produced by the scraped adapter path, without a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub link: String,
    pub summary: String,
}

/// A display-ready record. `published`, `summary` and `title_translated` may
/// be filled in after the adapter produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub source: Source,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: String,
    pub title_translated: Option<String>,
}

impl FeedItem {
    pub fn new(source: Source, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            source,
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            published: String::new(),
            title_translated: None,
        }
    }
}

/// Build a news-search feed URL, e.g. `...?q=when:24h+site:reuters.com&hl=en-US`.
pub fn search_url(base: &str, query: &str, language: &str) -> String {
    format!("{}?q={}&hl={}", base, query.replace(' ', "+"), language)
}

/// The rolling 24 hour, single publisher query.
pub fn site_query(domain: &str) -> String {
    format!("when:24h site:{}", domain)
}
