use std::time::Duration;

use tracing::info;

use crate::config::SourcesConfig;
use crate::fetcher::{Fetcher, RawFeed, MIRROR_TIMEOUT, SEARCH_TIMEOUT};
use crate::sources::{search_url, site_query, FeedItem, Headline, Source};

/// A news-search query scoped to one publisher (or one search phrase).
#[derive(Debug, Clone)]
pub struct AgencySource {
    source: Source,
    url: String,
    timeout: Duration,
}

impl AgencySource {
    pub fn new(source: Source, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            source,
            url: url.into(),
            timeout,
        }
    }

    /// Last 24 hours of headlines from `domain`.
    pub fn for_site(source: Source, config: &SourcesConfig, domain: &str) -> Self {
        let url = search_url(&config.search_url, &site_query(domain), &config.language);
        Self::new(source, url, SEARCH_TIMEOUT)
    }

    /// An unrestricted search for `query`.
    pub fn for_query(source: Source, config: &SourcesConfig, query: &str) -> Self {
        let url = search_url(&config.search_url, query, &config.language);
        Self::new(source, url, MIRROR_TIMEOUT)
    }

    pub fn reuters(config: &SourcesConfig) -> Self {
        Self::for_site(Source::Reuters, config, &config.reuters_domain)
    }

    pub fn bloomberg(config: &SourcesConfig) -> Self {
        Self::for_site(Source::Bloomberg, config, &config.bloomberg_domain)
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Scraped path: title, link and summary of the newest `limit` entries.
    pub async fn fetch_latest(&self, fetcher: &Fetcher, limit: usize) -> Vec<Headline> {
        let feed = fetcher
            .fetch(self.source.name(), &self.url, self.timeout)
            .await;
        let headlines = headlines_from(&feed, limit);
        info!(source = %self.source, count = headlines.len(), "Collected headlines");
        headlines
    }

    /// Direct path: complete items, timestamps taken straight from the feed.
    pub async fn fetch_items(&self, fetcher: &Fetcher, limit: usize) -> Vec<FeedItem> {
        let feed = fetcher
            .fetch(self.source.name(), &self.url, self.timeout)
            .await;
        items_from(self.source, &feed, limit)
    }
}

/// The first `limit` entries in feed order, minus any without a title.
pub fn headlines_from(feed: &RawFeed, limit: usize) -> Vec<Headline> {
    feed.entries
        .iter()
        .take(limit)
        .filter(|entry| !entry.title().is_empty())
        .map(|entry| Headline {
            title: entry.title().to_string(),
            link: entry.link().to_string(),
            summary: entry.summary().to_string(),
        })
        .collect()
}

pub fn items_from(source: Source, feed: &RawFeed, limit: usize) -> Vec<FeedItem> {
    feed.entries
        .iter()
        .take(limit)
        .filter(|entry| !entry.title().is_empty())
        .map(|entry| FeedItem {
            summary: entry.summary().to_string(),
            published: entry.published().to_string(),
            ..FeedItem::new(source, entry.title(), entry.link())
        })
        .collect()
}
