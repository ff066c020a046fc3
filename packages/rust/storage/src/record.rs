//! Persisted projections of pipeline values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use hnsift_shared::{ClassifiedArticle, Confidence, FetchOutcome, HighValueComment, Item, Topic};

/// Reason recorded for stories whose content fetch failed.
pub const CONTENT_FETCH_FAILED: &str = "content_fetch_failed";

/// One row of `articles.json`. Lossy: content is cut to a fixed number of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub item_id: u64,
    pub title: String,
    pub url: Option<String>,
    pub author: String,
    pub score: i64,
    pub descendants: u64,
    /// Story creation time (unix seconds).
    pub timestamp: i64,
    /// `YYYY-MM-DD` of the crawl.
    pub crawl_date: String,
    /// RFC 3339 time of the crawl.
    pub crawl_time: String,

    pub content_type: FetchOutcome,
    /// Character count of the full content before truncation.
    pub content_length: usize,
    pub content_summary: Option<String>,
    /// SHA-256 hex digest of the full content.
    pub content_hash: Option<String>,

    pub comments_summary: String,
    pub top_comments: Vec<HighValueComment>,
    /// Top-level comments included in `comments_summary`.
    pub comment_count: usize,

    pub topic: Topic,
    pub tags: Vec<String>,
    pub classification_confidence: Option<Confidence>,
    /// `classified`, `fallback` or `skipped`.
    pub classification_status: String,
}

impl StoredArticle {
    /// Project a classified article, truncating content to `cap` characters.
    pub fn from_classified(
        article: &ClassifiedArticle,
        cap: usize,
        crawled_at: DateTime<Utc>,
    ) -> Self {
        let item = article.item();
        let comments = article.comments();
        let content = article.content();

        Self {
            item_id: item.id,
            title: item.title.clone(),
            url: item.url.clone(),
            author: item.author_or_anonymous().to_string(),
            score: item.score,
            descendants: item.descendant_count,
            timestamp: item.created_at,
            crawl_date: crawled_at.format("%Y-%m-%d").to_string(),
            crawl_time: crawled_at.to_rfc3339(),

            content_type: article.content_outcome().clone(),
            content_length: content.map_or(0, |c| c.chars().count()),
            content_summary: content.map(|c| truncate_chars(c, cap)),
            content_hash: content.map(content_hash),

            comments_summary: comments.formatted_text.clone(),
            top_comments: comments.high_value_comments.clone(),
            comment_count: comments.selected_count,

            topic: article.topic(),
            tags: article.classification.tags().to_vec(),
            classification_confidence: article.classification.confidence(),
            classification_status: article.classification.status().to_string(),
        }
    }
}

/// One entry of `failed_items.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: u64,
    pub title: String,
    pub url: Option<String>,
    pub reason: String,
}

impl FailedItem {
    /// Entry for a story whose content could not be fetched.
    pub fn content_fetch_failed(item: &Item) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            url: item.url.clone(),
            reason: CONTENT_FETCH_FAILED.to_string(),
        }
    }
}

/// First `cap` characters of `s`.
pub fn truncate_chars(s: &str, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
