//! Shared types, error model, and configuration for hnsift.
//!
//! This crate is the foundation depended on by all other hnsift crates.
//! It provides:
//! - [`HnSiftError`]: the unified error type
//! - Domain types ([`Item`], [`FetchOutcome`], [`CommentSummary`], [`ClassifiedArticle`])
//! - Configuration ([`AppConfig`], [`CrawlerSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, CommentLimits, CommentsConfig, CrawlerSettings, FeedConfig,
    FetchConfig, RetryPolicy, StorageConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{HnSiftError, Result};
pub use types::{
    Classification, ClassifiedArticle, CommentSummary, Confidence, ContentFetch, FetchOutcome,
    FetchedItem, HighValueComment, Item, ItemKind, Topic,
};
