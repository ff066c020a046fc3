//! Application configuration for hnsift.
//!
//! User config lives at `~/.hnsift/hnsift.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HnSiftError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hnsift.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hnsift";

// ---------------------------------------------------------------------------
// Config structs (matching hnsift.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream item feed.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Content-extraction proxy and retry settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Comment tree selection bounds.
    #[serde(default)]
    pub comments: CommentsConfig,

    /// Topic classification service.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Persisted state location and record shaping.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the item API (no trailing slash).
    #[serde(default = "default_feed_base_url")]
    pub api_base_url: String,

    /// How many top stories a crawl considers.
    #[serde(default = "default_max_stories")]
    pub max_stories: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_feed_base_url(),
            max_stories: default_max_stories(),
        }
    }
}

fn default_feed_base_url() -> String {
    "https://hacker-news.firebaseio.com/v0".into()
}
fn default_max_stories() -> usize {
    30
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL of the content-extraction proxy. Article URLs are appended.
    #[serde(default = "default_reader_base_url")]
    pub reader_base_url: String,

    /// Attempts per request before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backoff unit in ms; attempt `n` sleeps `unit * 2^n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Extracted bodies shorter than this many characters count as failures.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            reader_base_url: default_reader_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

fn default_reader_base_url() -> String {
    "https://r.jina.ai".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_min_content_chars() -> usize {
    100
}

/// `[comments]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsConfig {
    /// Top-level comments kept per story.
    #[serde(default = "default_max_top_level")]
    pub max_top_level: usize,

    /// Replies kept under each kept top-level comment.
    #[serde(default = "default_max_replies")]
    pub max_replies_per_comment: usize,

    /// Comments scoring at least this much are extracted as high-value.
    #[serde(default = "default_high_score_threshold")]
    pub high_score_threshold: i64,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            max_top_level: default_max_top_level(),
            max_replies_per_comment: default_max_replies(),
            high_score_threshold: default_high_score_threshold(),
        }
    }
}

fn default_max_top_level() -> usize {
    10
}
fn default_max_replies() -> usize {
    3
}
fn default_high_score_threshold() -> i64 {
    20
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Whether crawls classify articles by default.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible API (no trailing slash).
    #[serde(default = "default_classifier_base_url")]
    pub api_base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for classification.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base_url: default_classifier_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_classifier_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `articles.json`, `crawled_ids.json` and `failed_items.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Stored content is cut to this many characters.
    #[serde(default = "default_content_summary_chars")]
    pub content_summary_chars: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            content_summary_chars: default_content_summary_chars(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_content_summary_chars() -> usize {
    2000
}

// ---------------------------------------------------------------------------
// Runtime settings (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Retry discipline shared by every upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (at least one is always made).
    pub max_retries: u32,
    /// Backoff unit; attempt `n` (from 0) sleeps `backoff_base * 2^n` before the next try.
    pub backoff_base: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Sleep after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(fetch: &FetchConfig) -> Self {
        Self {
            max_retries: fetch.max_retries,
            backoff_base: Duration::from_millis(fetch.backoff_base_ms),
            timeout: Duration::from_secs(fetch.timeout_secs),
        }
    }
}

/// Breadth and scoring bounds of the comment walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentLimits {
    pub max_top_level: usize,
    pub max_replies_per_comment: usize,
    pub high_score_threshold: i64,
}

impl Default for CommentLimits {
    fn default() -> Self {
        Self::from(&CommentsConfig::default())
    }
}

impl From<&CommentsConfig> for CommentLimits {
    fn from(comments: &CommentsConfig) -> Self {
        Self {
            max_top_level: comments.max_top_level,
            max_replies_per_comment: comments.max_replies_per_comment,
            high_score_threshold: comments.high_score_threshold,
        }
    }
}

/// Runtime crawler configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// Item API base URL.
    pub feed_base_url: String,
    /// Content-extraction proxy base URL.
    pub reader_base_url: String,
    /// Stories considered per run.
    pub max_stories: usize,
    /// Retry discipline for feed and proxy requests.
    pub retry: RetryPolicy,
    /// Minimum extracted body length in characters.
    pub min_content_chars: usize,
    /// Comment walk bounds.
    pub comments: CommentLimits,
    /// Where persisted state lives.
    pub data_dir: PathBuf,
    /// Stored content cap in characters.
    pub content_summary_chars: usize,
}

impl From<&AppConfig> for CrawlerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            feed_base_url: config.feed.api_base_url.trim_end_matches('/').to_string(),
            reader_base_url: config.fetch.reader_base_url.trim_end_matches('/').to_string(),
            max_stories: config.feed.max_stories,
            retry: RetryPolicy::from(&config.fetch),
            min_content_chars: config.fetch.min_content_chars,
            comments: CommentLimits::from(&config.comments),
            data_dir: PathBuf::from(&config.storage.data_dir),
            content_summary_chars: config.storage.content_summary_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hnsift/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HnSiftError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hnsift/hnsift.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HnSiftError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HnSiftError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HnSiftError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HnSiftError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HnSiftError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the classifier API key env var is set and non-empty.
/// Returns the key so the caller never has to read the env twice.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.classifier.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(HnSiftError::config(format!(
            "classifier API key not found. Set the {var_name} environment variable \
             or run with --no-classify."
        ))),
    }
}
