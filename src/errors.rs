//! Failure reporting for upstream fetches.
//!
//! Fetch failures never propagate to callers as errors; they are sent to an
//! [`ErrorChannel`] and the caller receives an empty result instead.

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status} (response length {body_len})")]
    Status {
        url: String,
        status: StatusCode,
        body_len: usize,
    },

    #[error("{url} did not contain a readable feed")]
    Parse { url: String },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A reported failure, tagged with the component that hit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub origin: String,
    pub message: String,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.origin, self.message)
    }
}

/// Side channel for fetch failures, separate from return values.
#[derive(Debug, Clone, Default)]
pub struct ErrorChannel {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl ErrorChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A channel that only logs.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, origin: &str, err: &FetchError) {
        warn!(origin, error = %err, "Fetch failed");
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is collecting; logging above is enough.
            let _ = tx.send(Notice {
                origin: origin.to_string(),
                message: err.to_string(),
            });
        }
    }
}

/// Collect everything currently queued on a receiver.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
