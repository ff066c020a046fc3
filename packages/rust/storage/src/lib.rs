//! JSON-file persistence for crawl state.
//!
//! The [`DedupStore`] owns three whole-file documents under a data directory:
//! - `crawled_ids.json`: every id ever persisted (the dedup set)
//! - `articles.json`: stored article records
//! - `failed_items.json`: append-only log of stories whose content fetch failed
//!
//! Every write replaces the whole document through a temp file and a rename.
//! A document that exists but cannot be parsed is an error, never silently
//! replaced. One writer per data directory at a time is the caller's job.

pub mod record;

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hnsift_shared::{HnSiftError, Result};

pub use record::{CONTENT_FETCH_FAILED, FailedItem, StoredArticle, truncate_chars};

/// Dedup set file name.
pub const IDS_FILE: &str = "crawled_ids.json";
/// Article store file name.
pub const ARTICLES_FILE: &str = "articles.json";
/// Failed-item log file name.
pub const FAILED_FILE: &str = "failed_items.json";

// ---------------------------------------------------------------------------
// On-disk documents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct IdsDocument {
    ids: Vec<u64>,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArticlesDocument {
    articles: Vec<StoredArticle>,
    count: usize,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FailedDocument {
    items: Vec<FailedItem>,
    count: usize,
    updated_at: String,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How [`DedupStore::save_articles`] treats existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Keep existing records, add batch records whose id is not stored yet.
    #[default]
    Append,
    /// Write exactly the batch.
    Replace,
}

/// Result of a batch save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    /// Records newly written by this save.
    pub added: usize,
    /// Records in the store after the save.
    pub total_articles: usize,
    /// Ids in the dedup set after the save.
    pub total_ids: usize,
}

/// Snapshot of what is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub article_count: usize,
    pub dedup_id_count: usize,
    pub failed_count: usize,
    pub articles_path: PathBuf,
    pub articles_exists: bool,
    pub articles_size_bytes: u64,
}

// ---------------------------------------------------------------------------
// DedupStore
// ---------------------------------------------------------------------------

/// Handle on a data directory.
#[derive(Debug, Clone)]
pub struct DedupStore {
    dir: PathBuf,
}

impl DedupStore {
    /// Open (creating if needed) the data directory at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HnSiftError::io(&dir, e))?;
        debug!(dir = %dir.display(), "opened data directory");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn articles_path(&self) -> PathBuf {
        self.dir.join(ARTICLES_FILE)
    }

    fn ids_path(&self) -> PathBuf {
        self.dir.join(IDS_FILE)
    }

    fn failed_path(&self) -> PathBuf {
        self.dir.join(FAILED_FILE)
    }

    /// Every id ever persisted. Empty when nothing has been saved yet.
    pub async fn load_ids(&self) -> Result<HashSet<u64>> {
        let doc: Option<IdsDocument> = read_document(&self.ids_path()).await?;
        Ok(doc.map(|d| d.ids.into_iter().collect()).unwrap_or_default())
    }

    /// All stored article records, in file order.
    pub async fn load_articles(&self) -> Result<Vec<StoredArticle>> {
        let doc: Option<ArticlesDocument> = read_document(&self.articles_path()).await?;
        Ok(doc.map(|d| d.articles).unwrap_or_default())
    }

    /// Every failed-item log entry, oldest first.
    pub async fn load_failed(&self) -> Result<Vec<FailedItem>> {
        let doc: Option<FailedDocument> = read_document(&self.failed_path()).await?;
        Ok(doc.map(|d| d.items).unwrap_or_default())
    }

    /// Persist a batch of articles, then add every batch id to the dedup set.
    ///
    /// The dedup set is only touched once the article store is written.
    pub async fn save_articles(
        &self,
        batch: &[StoredArticle],
        mode: SaveMode,
    ) -> Result<SaveSummary> {
        let (articles, added) = match mode {
            SaveMode::Append => {
                let mut articles = self.load_articles().await?;
                let mut seen: HashSet<u64> = articles.iter().map(|a| a.item_id).collect();
                let before = articles.len();
                for record in batch {
                    if seen.insert(record.item_id) {
                        articles.push(record.clone());
                    }
                }
                let added = articles.len() - before;
                (articles, added)
            }
            SaveMode::Replace => (batch.to_vec(), batch.len()),
        };

        let now = Utc::now().to_rfc3339();
        let total_articles = articles.len();
        write_document(
            &self.articles_path(),
            &ArticlesDocument {
                count: total_articles,
                articles,
                updated_at: now.clone(),
            },
        )
        .await?;

        let mut ids = self.load_ids().await?;
        ids.extend(batch.iter().map(|a| a.item_id));
        let mut ids: Vec<u64> = ids.into_iter().collect();
        ids.sort_unstable();
        let total_ids = ids.len();
        write_document(&self.ids_path(), &IdsDocument { ids, updated_at: now }).await?;

        info!(added, total_articles, total_ids, ?mode, "saved articles");
        Ok(SaveSummary {
            added,
            total_articles,
            total_ids,
        })
    }

    /// Append entries to the failed-item log. Entries are never deduplicated.
    /// Returns the log length after the append.
    pub async fn append_failed(&self, entries: &[FailedItem]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(self.load_failed().await?.len());
        }

        let mut items = self.load_failed().await?;
        items.extend_from_slice(entries);
        let count = items.len();
        write_document(
            &self.failed_path(),
            &FailedDocument {
                items,
                count,
                updated_at: Utc::now().to_rfc3339(),
            },
        )
        .await?;

        debug!(appended = entries.len(), count, "appended failed items");
        Ok(count)
    }

    /// Counts and article file details.
    pub async fn stats(&self) -> Result<StorageStats> {
        let articles_path = self.articles_path();
        let (articles_exists, articles_size_bytes) = match tokio::fs::metadata(&articles_path).await
        {
            Ok(meta) => (true, meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => (false, 0),
            Err(e) => return Err(HnSiftError::io(&articles_path, e)),
        };

        Ok(StorageStats {
            article_count: self.load_articles().await?.len(),
            dedup_id_count: self.load_ids().await?.len(),
            failed_count: self.load_failed().await?.len(),
            articles_path,
            articles_exists,
            articles_size_bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Read and parse a document. Missing file is `None`; unparseable file is an error.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HnSiftError::io(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| HnSiftError::Storage(format!("corrupt state file {}: {e}", path.display())))
}

/// Serialize `doc` next to `path` and rename it into place.
async fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| HnSiftError::Storage(format!("failed to serialize {}: {e}", path.display())))?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| HnSiftError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| HnSiftError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsift_shared::{FetchOutcome, Topic};
    use uuid::Uuid;

    async fn test_store() -> DedupStore {
        let dir = std::env::temp_dir().join(format!("hnsift_test_{}", Uuid::now_v7()));
        DedupStore::open(&dir).await.expect("open test store")
    }

    fn record(id: u64, title: &str) -> StoredArticle {
        StoredArticle {
            item_id: id,
            title: title.into(),
            url: None,
            author: "anonymous".into(),
            score: 1,
            descendants: 0,
            timestamp: 0,
            crawl_date: "2024-01-01".into(),
            crawl_time: "2024-01-01T00:00:00+00:00".into(),
            content_type: FetchOutcome::NoUrl,
            content_length: 0,
            content_summary: None,
            content_hash: None,
            comments_summary: String::new(),
            top_comments: Vec::new(),
            comment_count: 0,
            topic: Topic::FALLBACK,
            tags: Vec::new(),
            classification_confidence: None,
            classification_status: "skipped".into(),
        }
    }

    #[tokio::test]
    async fn empty_store_loads_empty() {
        let store = test_store().await;
        assert!(store.load_ids().await.unwrap().is_empty());
        assert!(store.load_articles().await.unwrap().is_empty());
        assert!(store.load_failed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_skips_known_ids_but_records_them() {
        let store = test_store().await;
        store
            .save_articles(&[record(1, "one"), record(2, "two")], SaveMode::Append)
            .await
            .unwrap();

        let summary = store
            .save_articles(&[record(2, "two again"), record(3, "three")], SaveMode::Append)
            .await
            .unwrap();

        assert_eq!(
            summary,
            SaveSummary {
                added: 1,
                total_articles: 3,
                total_ids: 3
            }
        );
        let articles = store.load_articles().await.unwrap();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn resaving_same_batch_is_idempotent() {
        let store = test_store().await;
        let batch = [record(5, "five")];
        store.save_articles(&batch, SaveMode::Append).await.unwrap();
        let summary = store.save_articles(&batch, SaveMode::Append).await.unwrap();
        assert_eq!(summary.added, 0);
        assert_eq!(store.load_articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_writes_exactly_the_batch_and_keeps_ids() {
        let store = test_store().await;
        store
            .save_articles(&[record(1, "one"), record(2, "two")], SaveMode::Append)
            .await
            .unwrap();
        store
            .save_articles(&[record(9, "nine")], SaveMode::Replace)
            .await
            .unwrap();

        let ids: Vec<u64> = store
            .load_articles()
            .await
            .unwrap()
            .iter()
            .map(|a| a.item_id)
            .collect();
        assert_eq!(ids, vec![9]);

        let dedup = store.load_ids().await.unwrap();
        assert_eq!(dedup, HashSet::from([1, 2, 9]));
    }

    #[tokio::test]
    async fn failed_log_is_append_only() {
        let store = test_store().await;
        let entry = FailedItem {
            id: 7,
            title: "t".into(),
            url: Some("https://example.com".into()),
            reason: CONTENT_FETCH_FAILED.into(),
        };
        assert_eq!(store.append_failed(&[entry.clone()]).await.unwrap(), 1);
        assert_eq!(store.append_failed(&[entry.clone()]).await.unwrap(), 2);
        assert_eq!(store.load_failed().await.unwrap(), vec![entry.clone(), entry]);
    }

    #[tokio::test]
    async fn corrupt_state_is_an_error() {
        let store = test_store().await;
        std::fs::write(store.dir().join(IDS_FILE), "{not json").unwrap();
        let err = store.load_ids().await.unwrap_err();
        assert!(err.to_string().contains("corrupt state file"));
    }

    #[tokio::test]
    async fn documents_have_counts_and_no_temp_files_remain() {
        let store = test_store().await;
        store
            .save_articles(&[record(1, "one")], SaveMode::Append)
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.articles_path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["count"], 1);
        assert!(doc["updated_at"].is_string());

        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn stats_reflect_disk() {
        let store = test_store().await;
        let before = store.stats().await.unwrap();
        assert!(!before.articles_exists);
        assert_eq!(before.articles_size_bytes, 0);

        store
            .save_articles(&[record(1, "one"), record(2, "two")], SaveMode::Append)
            .await
            .unwrap();
        store
            .append_failed(&[FailedItem {
                id: 3,
                title: "three".into(),
                url: None,
                reason: CONTENT_FETCH_FAILED.into(),
            }])
            .await
            .unwrap();

        let after = store.stats().await.unwrap();
        assert!(after.articles_exists);
        assert!(after.articles_size_bytes > 0);
        assert_eq!(after.article_count, 2);
        assert_eq!(after.dedup_id_count, 2);
        assert_eq!(after.failed_count, 1);
    }
}
