//! Crawl orchestration for hnsift.
//!
//! This crate ties the feed client, content fetcher, comment walker,
//! classifier and dedup store together into one crawl run.

pub mod classifier;
pub mod pipeline;

pub use classifier::{
    ChatClassifier, ClassificationRequest, Classifier, RawClassification, classify_article,
    resolve,
};
pub use pipeline::{
    CrawlReport, Pipeline, ProgressReporter, RunOptions, RunStats, SilentProgress, Stage,
};
