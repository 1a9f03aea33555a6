//! Recover publish time and summary for scraped headlines by joining them,
//! on exact title text, against a second fetch of the same query.

use std::collections::HashMap;

use tracing::debug;

use crate::fetcher::{Fetcher, RawFeed, MIRROR_TIMEOUT};
use crate::sources::{AgencySource, FeedItem, Headline};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub published: String,
    pub summary: String,
}

/// Exact-title lookup table. A title seen twice keeps the later entry.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentIndex {
    entries: HashMap<String, IndexEntry>,
}

impl EnrichmentIndex {
    pub fn from_feed(feed: &RawFeed) -> Self {
        let mut entries = HashMap::with_capacity(feed.len());
        for entry in &feed.entries {
            entries.insert(
                entry.title().to_string(),
                IndexEntry {
                    published: entry.published().to_string(),
                    summary: entry.summary().to_string(),
                },
            );
        }
        Self { entries }
    }

    pub fn get(&self, title: &str) -> Option<&IndexEntry> {
        self.entries.get(title)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach published/summary to each headline. Misses leave both empty.
    pub fn apply(&self, adapter: &AgencySource, headlines: Vec<Headline>) -> Vec<FeedItem> {
        headlines
            .into_iter()
            .map(|headline| {
                let found = self.get(&headline.title).cloned().unwrap_or_else(|| {
                    debug!(title = %headline.title, "No index entry for headline");
                    IndexEntry::default()
                });
                FeedItem {
                    published: found.published,
                    summary: found.summary,
                    ..FeedItem::new(adapter.source(), headline.title, headline.link)
                }
            })
            .collect()
    }
}

/// Fetch the adapter's query again and use it to enrich `headlines`. The
/// lookup uses [`MIRROR_TIMEOUT`] whatever the adapter's own timeout is.
pub async fn enrich(
    fetcher: &Fetcher,
    adapter: &AgencySource,
    headlines: Vec<Headline>,
) -> Vec<FeedItem> {
    if headlines.is_empty() {
        return Vec::new();
    }

    let feed = fetcher
        .fetch(adapter.source().name(), adapter.url(), MIRROR_TIMEOUT)
        .await;
    EnrichmentIndex::from_feed(&feed).apply(adapter, headlines)
}
