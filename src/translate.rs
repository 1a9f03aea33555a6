//! Best-effort headline translation.
//!
//! Failure policy: whenever the backend fails, the original text is returned
//! unchanged. This holds for single calls and for [`Translator::translate_all`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy};
use serde_json::Value;
use tracing::debug;

use crate::fetcher::USER_AGENT;

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> anyhow::Result<String>;
}

/// Google's public `translate_a/single` endpoint.
pub struct GoogleTranslate {
    client: Client,
    endpoint: String,
}

impl GoogleTranslate {
    /// With no `proxy`, reqwest's environment proxies (`HTTPS_PROXY` and
    /// friends) still apply.
    pub fn new(endpoint: impl Into<String>, proxy: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .timeout(TRANSLATE_TIMEOUT)
            .user_agent(USER_AGENT);
        if let Some(address) = proxy {
            builder = builder.proxy(
                Proxy::all(address)
                    .with_context(|| format!("invalid translation proxy {address}"))?,
            );
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslate {
    async fn translate(&self, text: &str, target: &str) -> anyhow::Result<String> {
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("translation response is not JSON")?;

        parse_response(&body)
    }
}

/// Join the translated segments of a `[[["text", "orig", ...], ...], ...]`
/// response.
pub fn parse_response(body: &Value) -> anyhow::Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("translation response has no segment list"))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return Err(anyhow!("translation response has no translated text"));
    }
    Ok(text)
}

#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    target: String,
    concurrency: usize,
}

impl Translator {
    pub fn new(backend: Arc<dyn TranslationBackend>, target: impl Into<String>) -> Self {
        Self {
            backend,
            target: target.into(),
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Translate `text`, or hand it back untouched if anything goes wrong.
    /// Empty input never reaches the backend.
    pub async fn translate(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        match self.backend.translate(text, &self.target).await {
            Ok(translated) => translated,
            Err(e) => {
                debug!(error = %e, "Translation failed, keeping original text");
                text.to_string()
            }
        }
    }

    /// Translate every text, keeping input order.
    pub async fn translate_all(&self, texts: &[String]) -> Vec<String> {
        stream::iter(texts.iter().cloned())
            .map(|text| async move { self.translate(&text).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
