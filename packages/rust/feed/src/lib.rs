//! Client for the ranked item feed.
//!
//! This crate provides:
//! - [`FeedClient`]: top story ids and item records, fetched concurrently
//! - [`retry`]: the retry/backoff loop shared with the content fetcher

pub mod retry;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use hnsift_shared::{CrawlerSettings, HnSiftError, Item, ItemKind, Result, RetryPolicy};

pub use retry::{AttemptError, RetryFailure, with_retry};

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("hnsift/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Item record as served by the API. Every field but `id` may be missing.
#[derive(Debug, Deserialize)]
struct RawItem {
    id: u64,
    #[serde(rename = "type", default)]
    kind: ItemKind,
    by: Option<String>,
    time: Option<i64>,
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    descendants: Option<u64>,
    kids: Option<Vec<u64>>,
    text: Option<String>,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        Self {
            id: raw.id,
            kind: raw.kind,
            author: raw.by,
            created_at: raw.time.unwrap_or(0),
            title: raw.title.unwrap_or_default(),
            url: raw.url.filter(|u| !u.is_empty()),
            score: raw.score.unwrap_or(0),
            descendant_count: raw.descendants.unwrap_or(0),
            child_ids: raw.kids.unwrap_or_default(),
            text: raw.text,
        }
    }
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// Read-only client for the item API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl FeedClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(retry.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HnSiftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Create a client from runtime settings.
    pub fn from_settings(settings: &CrawlerSettings) -> Result<Self> {
        Self::new(&settings.feed_base_url, settings.retry.clone())
    }

    /// Ranked top story ids, truncated to `limit`, in upstream order.
    ///
    /// Empty only when the list could not be fetched at all.
    #[instrument(skip(self))]
    pub async fn fetch_top_ids(&self, limit: usize) -> Vec<u64> {
        let url = format!("{}/topstories.json", self.base_url);

        match self.get_json::<Vec<u64>>(&url).await {
            Ok(mut ids) => {
                ids.truncate(limit);
                info!(count = ids.len(), "fetched top story ids");
                ids
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch top story ids");
                Vec::new()
            }
        }
    }

    /// Fetch one item. Missing items, failed fetches and untitled stories are `None`.
    pub async fn fetch_item(&self, id: u64) -> Option<Item> {
        let url = format!("{}/item/{id}.json", self.base_url);

        let raw = match self.get_json::<Option<RawItem>>(&url).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(id, "item does not exist");
                return None;
            }
            Err(e) => {
                warn!(id, error = %e, "failed to fetch item");
                return None;
            }
        };

        let item = Item::from(raw);
        if item.is_story() && item.title.trim().is_empty() {
            warn!(id, "story has no title, dropping");
            return None;
        }

        debug!(id, kind = ?item.kind, "fetched item");
        Some(item)
    }

    /// Fetch many items concurrently. Absent items are dropped; the rest keep `ids` order.
    pub async fn fetch_items(&self, ids: &[u64]) -> Vec<Item> {
        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let client = self.clone();
                tokio::spawn(async move { client.fetch_item(id).await })
            })
            .collect();

        let mut items = Vec::with_capacity(ids.len());
        for handle in handles {
            match handle.await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "item fetch task failed"),
            }
        }

        debug!(requested = ids.len(), fetched = items.len(), "fetched items");
        items
    }

    /// GET `url` and decode the JSON body, under the retry policy.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, RetryFailure> {
        with_retry(&self.retry, url, |_| self.attempt_json(url)).await
    }

    async fn attempt_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(format!("body read failed: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| AttemptError::Permanent(format!("invalid JSON from {url}: {e}")))
    }
}
