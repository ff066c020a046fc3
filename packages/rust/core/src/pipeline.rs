//! End-to-end crawl: top ids → new ids → stories → content ∥ comments →
//! classification → persisted batch.
//!
//! Stages run strictly in order; work inside a stage is spawned per story and
//! awaited as a batch. A single story going wrong never aborts the run. Only
//! failing to read or write the persisted state does.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use hnsift_crawler::{CommentWalker, ContentFetcher};
use hnsift_feed::FeedClient;
use hnsift_shared::{
    Classification, ClassifiedArticle, CrawlerSettings, FetchOutcome, FetchedItem, Item, Result,
};
use hnsift_storage::{DedupStore, FailedItem, SaveMode, StoredArticle};

use crate::classifier::{Classifier, classify_article};

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    FetchIds,
    FilterNew,
    FetchDetails,
    FetchContentAndComments,
    Classify,
    PersistBatch,
    Done,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchIds => "Fetching top stories",
            Self::FilterNew => "Filtering known stories",
            Self::FetchDetails => "Fetching story details",
            Self::FetchContentAndComments => "Fetching content and comments",
            Self::Classify => "Classifying articles",
            Self::PersistBatch => "Saving articles",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters for one run, threaded through every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Ids returned by the feed.
    pub total_ids: usize,
    /// Stories fetched successfully.
    pub total_fetched: usize,
    /// Records added to the article store.
    pub new_articles: usize,
    /// Ids dropped because they were already persisted.
    pub skipped_existing: usize,
    pub content_success: usize,
    pub content_failed: usize,
    pub content_skipped: usize,
    /// Top-level comments included across all summaries.
    pub comments_parsed: usize,
    pub classified: usize,
    pub classification_fallbacks: usize,
    pub failed_logged: usize,
}

impl RunStats {
    fn start() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            finished_at: None,
            total_ids: 0,
            total_fetched: 0,
            new_articles: 0,
            skipped_existing: 0,
            content_success: 0,
            content_failed: 0,
            content_skipped: 0,
            comments_parsed: 0,
            classified: 0,
            classification_fallbacks: 0,
            failed_logged: 0,
        }
    }

    fn record_content(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Article => self.content_success += 1,
            FetchOutcome::Failed => self.content_failed += 1,
            _ => self.content_skipped += 1,
        }
    }

    fn record_classification(&mut self, classification: &Classification) {
        match classification {
            Classification::Classified { .. } => self.classified += 1,
            Classification::UnknownTopic { .. } | Classification::Fallback { .. } => {
                self.classification_fallbacks += 1
            }
            Classification::Skipped => {}
        }
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Top stories to consider.
    pub limit: usize,
    /// Drop ids already in the dedup set.
    pub skip_existing: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: 30,
            skip_existing: true,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub stats: RunStats,
    /// Records handed to the store this run, in feed order.
    pub articles: Vec<StoredArticle>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, stage: Stage);
    /// Called once with the final counters.
    fn done(&self, stats: &RunStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn done(&self, _stats: &RunStats) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The crawl orchestrator. `classifier: None` runs without classification.
pub struct Pipeline<C> {
    feed: FeedClient,
    content: ContentFetcher,
    walker: CommentWalker,
    classifier: Option<Arc<C>>,
    store: DedupStore,
    content_summary_chars: usize,
}

impl<C: Classifier> Pipeline<C> {
    pub fn new(
        feed: FeedClient,
        content: ContentFetcher,
        walker: CommentWalker,
        classifier: Option<C>,
        store: DedupStore,
        content_summary_chars: usize,
    ) -> Self {
        Self {
            feed,
            content,
            walker,
            classifier: classifier.map(Arc::new),
            store,
            content_summary_chars,
        }
    }

    /// Wire every component from runtime settings.
    pub async fn from_settings(settings: &CrawlerSettings, classifier: Option<C>) -> Result<Self> {
        let feed = FeedClient::from_settings(settings)?;
        let content = ContentFetcher::from_settings(settings)?;
        let walker = CommentWalker::new(feed.clone(), settings.comments);
        let store = DedupStore::open(&settings.data_dir).await?;
        Ok(Self::new(
            feed,
            content,
            walker,
            classifier,
            store,
            settings.content_summary_chars,
        ))
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Run every stage once.
    #[instrument(skip_all, fields(limit = opts.limit, skip_existing = opts.skip_existing))]
    pub async fn run(
        &self,
        opts: &RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<CrawlReport> {
        let mut stats = RunStats::start();
        info!(run_id = %stats.run_id, "starting crawl");

        progress.stage(Stage::FetchIds);
        let ids = self.feed.fetch_top_ids(opts.limit).await;
        stats.total_ids = ids.len();

        progress.stage(Stage::FilterNew);
        let new_ids = self.filter_new(ids, opts.skip_existing, &mut stats).await?;
        if new_ids.is_empty() {
            info!("no new stories");
            return Ok(self.finish(stats, Vec::new(), progress));
        }

        progress.stage(Stage::FetchDetails);
        let stories = self.fetch_details(&new_ids, &mut stats).await;
        if stories.is_empty() {
            info!("no stories fetched");
            return Ok(self.finish(stats, Vec::new(), progress));
        }

        progress.stage(Stage::FetchContentAndComments);
        let fetched = self.fetch_content_and_comments(stories, &mut stats).await;

        progress.stage(Stage::Classify);
        let classified = self.classify(fetched, &mut stats).await;

        progress.stage(Stage::PersistBatch);
        let articles = self.persist(&classified, &mut stats).await?;

        Ok(self.finish(stats, articles, progress))
    }

    async fn filter_new(
        &self,
        ids: Vec<u64>,
        skip_existing: bool,
        stats: &mut RunStats,
    ) -> Result<Vec<u64>> {
        if !skip_existing {
            return Ok(ids);
        }

        let known = self.store.load_ids().await?;
        let total = ids.len();
        let new_ids: Vec<u64> = ids.into_iter().filter(|id| !known.contains(id)).collect();
        stats.skipped_existing = total - new_ids.len();

        info!(
            new = new_ids.len(),
            existing = stats.skipped_existing,
            "filtered known stories"
        );
        Ok(new_ids)
    }

    async fn fetch_details(&self, ids: &[u64], stats: &mut RunStats) -> Vec<Item> {
        let stories: Vec<Item> = self
            .feed
            .fetch_items(ids)
            .await
            .into_iter()
            .filter(Item::is_story)
            .collect();
        stats.total_fetched = stories.len();
        info!(requested = ids.len(), stories = stories.len(), "fetched story details");
        stories
    }

    async fn fetch_content_and_comments(
        &self,
        stories: Vec<Item>,
        stats: &mut RunStats,
    ) -> Vec<FetchedItem> {
        let handles: Vec<_> = stories
            .into_iter()
            .map(|item| {
                let content = self.content.clone();
                let walker = self.walker.clone();
                tokio::spawn(async move {
                    let (fetch, comments) =
                        tokio::join!(content.fetch_article_data(&item), walker.walk(&item));
                    FetchedItem {
                        item,
                        content: fetch,
                        comments,
                    }
                })
            })
            .collect();

        let mut fetched = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(item) => {
                    stats.record_content(item.content.outcome());
                    stats.comments_parsed += item.comments.selected_count;
                    fetched.push(item);
                }
                Err(e) => warn!(error = %e, "story task failed, dropping story"),
            }
        }

        info!(
            success = stats.content_success,
            failed = stats.content_failed,
            skipped = stats.content_skipped,
            comments = stats.comments_parsed,
            "fetched content and comments"
        );
        fetched
    }

    async fn classify(
        &self,
        fetched: Vec<FetchedItem>,
        stats: &mut RunStats,
    ) -> Vec<ClassifiedArticle> {
        let Some(classifier) = &self.classifier else {
            info!("classification disabled");
            return fetched
                .into_iter()
                .map(|fetched| ClassifiedArticle {
                    fetched,
                    classification: Classification::Skipped,
                })
                .collect();
        };

        let handles: Vec<_> = fetched
            .into_iter()
            .map(|item| {
                let classifier = Arc::clone(classifier);
                tokio::spawn(async move {
                    let classification = classify_article(classifier.as_ref(), &item).await;
                    ClassifiedArticle {
                        fetched: item,
                        classification,
                    }
                })
            })
            .collect();

        let mut classified = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(article) => {
                    stats.record_classification(&article.classification);
                    classified.push(article);
                }
                Err(e) => warn!(error = %e, "classification task failed, dropping story"),
            }
        }

        info!(
            classified = stats.classified,
            fallbacks = stats.classification_fallbacks,
            "classification complete"
        );
        classified
    }

    async fn persist(
        &self,
        classified: &[ClassifiedArticle],
        stats: &mut RunStats,
    ) -> Result<Vec<StoredArticle>> {
        let crawled_at = Utc::now();
        let articles: Vec<StoredArticle> = classified
            .iter()
            .map(|a| StoredArticle::from_classified(a, self.content_summary_chars, crawled_at))
            .collect();

        let summary = self.store.save_articles(&articles, SaveMode::Append).await?;
        stats.new_articles = summary.added;

        // Only log failures for a batch that actually landed.
        let failed: Vec<FailedItem> = classified
            .iter()
            .filter(|a| a.content_outcome() == &FetchOutcome::Failed)
            .map(|a| FailedItem::content_fetch_failed(a.item()))
            .collect();

        if !failed.is_empty() {
            match self.store.append_failed(&failed).await {
                Ok(_) => stats.failed_logged = failed.len(),
                Err(e) => warn!(error = %e, count = failed.len(), "failed to log failed items"),
            }
        }

        Ok(articles)
    }

    fn finish(
        &self,
        mut stats: RunStats,
        articles: Vec<StoredArticle>,
        progress: &dyn ProgressReporter,
    ) -> CrawlReport {
        stats.finished_at = Some(Utc::now());
        progress.stage(Stage::Done);
        progress.done(&stats);

        info!(
            run_id = %stats.run_id,
            total_ids = stats.total_ids,
            new_articles = stats.new_articles,
            skipped_existing = stats.skipped_existing,
            content_success = stats.content_success,
            content_failed = stats.content_failed,
            content_skipped = stats.content_skipped,
            classified = stats.classified,
            "crawl complete"
        );

        CrawlReport { stats, articles }
    }
}
