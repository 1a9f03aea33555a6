use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::{Config, Settings, SourcesConfig};
use crate::enrich;
use crate::errors::{drain, ErrorChannel};
use crate::fetcher::Fetcher;
use crate::sources::{AgencySource, FeedItem, MirrorSource};
use crate::translate::{GoogleTranslate, Translator};

/// One complete refresh: an ordered list per source plus whatever went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    pub fetched_at: DateTime<Utc>,
    pub reuters: Vec<FeedItem>,
    pub bloomberg: Vec<FeedItem>,
    pub musk: Vec<FeedItem>,
    pub notices: Vec<String>,
}

impl AggregatedResult {
    pub fn empty() -> Self {
        Self {
            fetched_at: Utc::now(),
            reuters: Vec::new(),
            bloomberg: Vec::new(),
            musk: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reuters.is_empty() && self.bloomberg.is_empty() && self.musk.is_empty()
    }
}

pub struct Aggregator {
    reuters: AgencySource,
    bloomberg: AgencySource,
    musk: MirrorSource,
    translator: Option<Translator>,
    last: RwLock<Option<Arc<AggregatedResult>>>,
    /// Held for the whole of a refresh pass.
    refresh_lock: Mutex<()>,
}

impl Aggregator {
    pub fn new(sources: &SourcesConfig, translator: Option<Translator>) -> Self {
        Self {
            reuters: AgencySource::reuters(sources),
            bloomberg: AgencySource::bloomberg(sources),
            musk: MirrorSource::musk(sources),
            translator,
            last: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Translation goes through the same proxy as the feeds.
    pub fn from_config(config: &Config, settings: &Settings) -> anyhow::Result<Self> {
        let translator = if config.translation.enabled {
            let backend = GoogleTranslate::new(&config.translation.endpoint, settings.proxy())?;
            Some(
                Translator::new(Arc::new(backend), &config.translation.target)
                    .with_concurrency(config.translation.concurrency),
            )
        } else {
            None
        };

        Ok(Self::new(&config.sources, translator))
    }

    /// Run one pass over every source. Never fails; each source list is
    /// either complete or empty.
    pub async fn aggregate(&self, settings: &Settings) -> AggregatedResult {
        let (errors, mut rx) = ErrorChannel::new();
        let fetched_at = Utc::now();

        let fetcher = match Fetcher::new(settings.proxy(), errors.clone()) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                errors.report("Fetcher", &e);
                return AggregatedResult {
                    fetched_at,
                    notices: drain(&mut rx).iter().map(ToString::to_string).collect(),
                    ..AggregatedResult::empty()
                };
            }
        };

        let limit = settings.limit;
        let (reuters, bloomberg, musk) = tokio::join!(
            self.agency_items(&self.reuters, &fetcher, settings),
            self.agency_items(&self.bloomberg, &fetcher, settings),
            self.musk.fetch_items(&fetcher, limit),
        );

        let (reuters, bloomberg, musk) = tokio::join!(
            self.annotate(reuters),
            self.annotate(bloomberg),
            self.annotate(musk),
        );

        let notices: Vec<String> = drain(&mut rx).iter().map(ToString::to_string).collect();
        info!(
            reuters = reuters.len(),
            bloomberg = bloomberg.len(),
            musk = musk.len(),
            failures = notices.len(),
            "Aggregation pass complete"
        );

        AggregatedResult {
            fetched_at,
            reuters,
            bloomberg,
            musk,
            notices,
        }
    }

    /// With the proxy on, headlines are scraped then joined against a second
    /// fetch for timestamps; otherwise the feed is read directly.
    async fn agency_items(
        &self,
        adapter: &AgencySource,
        fetcher: &Fetcher,
        settings: &Settings,
    ) -> Vec<FeedItem> {
        if settings.use_proxy {
            let headlines = adapter.fetch_latest(fetcher, settings.limit).await;
            enrich::enrich(fetcher, adapter, headlines).await
        } else {
            adapter.fetch_items(fetcher, settings.limit).await
        }
    }

    async fn annotate(&self, mut items: Vec<FeedItem>) -> Vec<FeedItem> {
        let Some(translator) = &self.translator else {
            return items;
        };

        let titles: Vec<String> = items.iter().map(|item| item.title.clone()).collect();
        let translated = translator.translate_all(&titles).await;
        for (item, title) in items.iter_mut().zip(translated) {
            item.title_translated = Some(title);
        }
        items
    }

    pub async fn is_refreshing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    pub async fn latest(&self) -> Option<Arc<AggregatedResult>> {
        self.last.read().await.clone()
    }

    /// Replace the cached result wholesale.
    pub async fn publish(&self, result: AggregatedResult) -> Arc<AggregatedResult> {
        let result = Arc::new(result);
        *self.last.write().await = Some(result.clone());
        result
    }

    /// Aggregate and publish. Returns `None` if a refresh is already running.
    pub async fn refresh(&self, settings: &Settings) -> Option<Arc<AggregatedResult>> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            info!("Refresh already in progress, skipping");
            return None;
        };

        let result = self.aggregate(settings).await;
        Some(self.publish(result).await)
    }

    /// The cached result, fetching one first if nothing has been fetched yet.
    /// A refresh already in flight is waited for rather than duplicated.
    pub async fn latest_or_refresh(&self, settings: &Settings) -> Arc<AggregatedResult> {
        if let Some(result) = self.latest().await {
            return result;
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(result) = self.latest().await {
            return result;
        }
        let result = self.aggregate(settings).await;
        self.publish(result).await
    }
}
