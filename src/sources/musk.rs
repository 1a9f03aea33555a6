use tracing::{debug, info, warn};

use crate::config::SourcesConfig;
use crate::fetcher::{Fetcher, RawEntry, MIRROR_TIMEOUT};
use crate::sources::{AgencySource, FeedItem, Headline, Source};

/// A social feed served by several mirrors, with a news-search fallback.
#[derive(Debug, Clone)]
pub struct MirrorSource {
    source: Source,
    mirrors: Vec<String>,
    fallback: AgencySource,
}

impl MirrorSource {
    pub fn new(source: Source, mirrors: Vec<String>, fallback: AgencySource) -> Self {
        Self {
            source,
            mirrors,
            fallback,
        }
    }

    pub fn musk(config: &SourcesConfig) -> Self {
        Self::new(
            Source::Musk,
            config.musk_mirrors.clone(),
            AgencySource::for_query(Source::Musk, config, &config.musk_query),
        )
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Display strings for the newest `limit` posts.
    ///
    /// Mirrors are tried in order until one yields at least one entry; later
    /// mirrors are never contacted. If every mirror comes up empty, one
    /// fallback search is issued.
    pub async fn fetch_latest(&self, fetcher: &Fetcher, limit: usize) -> Vec<String> {
        for mirror in &self.mirrors {
            let feed = fetcher
                .fetch(self.source.name(), mirror, MIRROR_TIMEOUT)
                .await;
            if feed.is_empty() {
                debug!(mirror = %mirror, "Mirror returned no entries, trying next");
                continue;
            }

            let posts: Vec<String> = feed
                .entries
                .iter()
                .filter_map(display_text)
                .take(limit)
                .collect();
            info!(mirror = %mirror, count = posts.len(), "Collected posts from mirror");
            return posts;
        }

        warn!(
            source = %self.source,
            mirrors = self.mirrors.len(),
            "All mirrors failed, falling back to news search"
        );

        let posts: Vec<String> = self
            .fallback
            .fetch_latest(fetcher, limit)
            .await
            .iter()
            .map(headline_display)
            .take(limit)
            .collect();

        if posts.is_empty() {
            warn!(source = %self.source, "No posts or related news available");
        }
        posts
    }

    /// Posts split back into display records.
    pub async fn fetch_items(&self, fetcher: &Fetcher, limit: usize) -> Vec<FeedItem> {
        self.fetch_latest(fetcher, limit)
            .await
            .iter()
            .map(|post| {
                let (title, link) = split_display(post);
                FeedItem::new(self.source, title, link)
            })
            .collect()
    }
}

/// Title, else the longer text field, with the link appended in parentheses
/// unless the text already carries a URL.
pub fn display_text(entry: &RawEntry) -> Option<String> {
    let text = match entry.title() {
        "" => entry.summary(),
        title => title,
    };
    if text.is_empty() {
        return None;
    }

    let link = entry.link();
    if link.is_empty() || contains_url(text) {
        Some(text.to_string())
    } else {
        Some(format!("{}  ({})", text, link))
    }
}

fn headline_display(headline: &Headline) -> String {
    if headline.link.is_empty() {
        headline.title.clone()
    } else {
        format!("{}  ({})", headline.title, headline.link)
    }
}

fn contains_url(text: &str) -> bool {
    text.contains("http://") || text.contains("https://")
}

/// Split a trailing `(http...)` off a display string.
pub fn split_display(post: &str) -> (String, String) {
    if let Some(inner) = post.strip_suffix(')') {
        if let Some(idx) = inner.rfind('(') {
            let link = inner[idx + 1..].trim();
            if link.starts_with("http") {
                return (inner[..idx].trim().to_string(), link.to_string());
            }
        }
    }
    (post.to_string(), String::new())
}
