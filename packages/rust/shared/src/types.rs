//! Core domain types flowing through the crawl pipeline.
//!
//! Each stage produces a new value: [`Item`] → [`FetchedItem`] →
//! [`ClassifiedArticle`] → (storage) `StoredArticle`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Kind of node in the upstream discussion graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    /// Jobs, polls, poll options and anything the API adds later.
    #[default]
    #[serde(other)]
    Other,
}

/// An immutable record fetched from the item API.
///
/// Missing upstream fields take the documented defaults: no author, time 0,
/// empty title, score 0, no descendants, no children, no body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub kind: ItemKind,
    pub author: Option<String>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub title: String,
    pub url: Option<String>,
    pub score: i64,
    /// Total comment count as reported upstream; informational only.
    pub descendant_count: u64,
    /// Child item ids in upstream order (not score-sorted).
    pub child_ids: Vec<u64>,
    /// Comment body as an HTML fragment.
    pub text: Option<String>,
}

impl Item {
    /// Author name, or `anonymous` for deleted/missing authors.
    pub fn author_or_anonymous(&self) -> &str {
        self.author.as_deref().unwrap_or("anonymous")
    }

    pub fn is_story(&self) -> bool {
        self.kind == ItemKind::Story
    }

    pub fn is_comment(&self) -> bool {
        self.kind == ItemKind::Comment
    }
}

// ---------------------------------------------------------------------------
// FetchOutcome / ContentFetch
// ---------------------------------------------------------------------------

/// Typed result of attempting to fetch an article's rendered content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FetchOutcome {
    /// Content was extracted.
    Article,
    /// Network failure, non-retryable status, exhausted retries or an empty extraction.
    Failed,
    /// Hosted on a video platform.
    Video,
    Pdf,
    /// Another blocked file extension, stored without its leading dot (`zip`, `mp4`, ...).
    Extension(String),
    NoUrl,
    InvalidUrl,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Failed => "failed",
            Self::Video => "video",
            Self::Pdf => "pdf",
            Self::Extension(ext) => ext.as_str(),
            Self::NoUrl => "no-url",
            Self::InvalidUrl => "invalid-url",
        }
    }

    /// Outcome for a blocked extension (given with or without the dot).
    pub fn for_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.') {
            "pdf" => Self::Pdf,
            other => Self::Extension(other.to_string()),
        }
    }

    /// True when the URL was rejected by policy before any network call.
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::Article | Self::Failed)
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FetchOutcome> for String {
    fn from(outcome: FetchOutcome) -> Self {
        outcome.as_str().to_string()
    }
}

impl From<String> for FetchOutcome {
    fn from(s: String) -> Self {
        match s.as_str() {
            "article" => Self::Article,
            "failed" => Self::Failed,
            "video" => Self::Video,
            "no-url" => Self::NoUrl,
            "invalid-url" => Self::InvalidUrl,
            other => Self::for_extension(other),
        }
    }
}

/// Outcome of a content fetch plus the content itself.
///
/// `content` is present iff the outcome is [`FetchOutcome::Article`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFetch {
    outcome: FetchOutcome,
    content: Option<String>,
}

impl ContentFetch {
    /// Successful extraction. Empty text degrades to [`FetchOutcome::Failed`].
    pub fn article(content: String) -> Self {
        if content.is_empty() {
            return Self::unavailable(FetchOutcome::Failed);
        }
        Self {
            outcome: FetchOutcome::Article,
            content: Some(content),
        }
    }

    /// A fetch that produced no content.
    pub fn unavailable(outcome: FetchOutcome) -> Self {
        let outcome = match outcome {
            FetchOutcome::Article => FetchOutcome::Failed,
            other => other,
        };
        Self {
            outcome,
            content: None,
        }
    }

    pub fn outcome(&self) -> &FetchOutcome {
        &self.outcome
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// A selected comment or reply whose score met the high-value threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighValueComment {
    pub author: String,
    pub text: String,
    pub score: i64,
}

/// Bounded textual summary of a story's comment tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSummary {
    /// Selected comments, blank-line separated, replies indented under their parent.
    pub formatted_text: String,
    pub high_value_comments: Vec<HighValueComment>,
    /// Number of top-level comments included.
    pub selected_count: usize,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Closed set of article topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "AI/ML")]
    AiMl,
    #[serde(rename = "Programming Languages")]
    ProgrammingLanguages,
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Databases")]
    Databases,
    #[serde(rename = "Security/Privacy")]
    SecurityPrivacy,
    #[serde(rename = "Startups/Business")]
    StartupsBusiness,
    #[serde(rename = "Hardware/IoT")]
    HardwareIot,
    #[serde(rename = "Science")]
    Science,
    #[serde(rename = "Open Source")]
    OpenSource,
    #[serde(rename = "Career/Jobs")]
    CareerJobs,
}

impl Topic {
    /// Every topic, in prompt order.
    pub const ALL: [Topic; 10] = [
        Topic::AiMl,
        Topic::ProgrammingLanguages,
        Topic::WebDevelopment,
        Topic::Databases,
        Topic::SecurityPrivacy,
        Topic::StartupsBusiness,
        Topic::HardwareIot,
        Topic::Science,
        Topic::OpenSource,
        Topic::CareerJobs,
    ];

    /// Used whenever no valid classification is available.
    pub const FALLBACK: Topic = Topic::OpenSource;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiMl => "AI/ML",
            Self::ProgrammingLanguages => "Programming Languages",
            Self::WebDevelopment => "Web Development",
            Self::Databases => "Databases",
            Self::SecurityPrivacy => "Security/Privacy",
            Self::StartupsBusiness => "Startups/Business",
            Self::HardwareIot => "Hardware/IoT",
            Self::Science => "Science",
            Self::OpenSource => "Open Source",
            Self::CareerJobs => "Career/Jobs",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    /// Case-insensitive match against the closed set.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown topic '{wanted}'"))
    }
}

/// Classifier confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Parse a free-form label; anything unrecognized is `Low`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// How an article ended up with its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The classifier answered with a valid topic.
    Classified {
        topic: Topic,
        tags: Vec<String>,
        confidence: Confidence,
    },
    /// The classifier answered with a topic outside the set. Its tags and
    /// confidence are kept; the topic is [`Topic::FALLBACK`].
    UnknownTopic {
        answered: String,
        tags: Vec<String>,
        confidence: Confidence,
    },
    /// The call failed or its answer could not be read.
    Fallback { reason: String },
    /// Classification was disabled for the run.
    Skipped,
}

impl Classification {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Classified { topic, .. } => *topic,
            Self::UnknownTopic { .. } | Self::Fallback { .. } | Self::Skipped => Topic::FALLBACK,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Classified { tags, .. } | Self::UnknownTopic { tags, .. } => tags,
            Self::Fallback { .. } | Self::Skipped => &[],
        }
    }

    /// `None` when classification never ran.
    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Self::Classified { confidence, .. } | Self::UnknownTopic { confidence, .. } => {
                Some(*confidence)
            }
            Self::Fallback { .. } => Some(Confidence::Low),
            Self::Skipped => None,
        }
    }

    /// Short status label for persisted records.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Classified { .. } => "classified",
            Self::UnknownTopic { .. } | Self::Fallback { .. } => "fallback",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }
}

// ---------------------------------------------------------------------------
// Stage values
// ---------------------------------------------------------------------------

/// A story after content fetch and comment walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    pub item: Item,
    pub content: ContentFetch,
    pub comments: CommentSummary,
}

/// A story after the (optional) classification stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedArticle {
    pub fetched: FetchedItem,
    pub classification: Classification,
}

impl ClassifiedArticle {
    pub fn id(&self) -> u64 {
        self.fetched.item.id
    }

    pub fn item(&self) -> &Item {
        &self.fetched.item
    }

    pub fn content_outcome(&self) -> &FetchOutcome {
        self.fetched.content.outcome()
    }

    pub fn content(&self) -> Option<&str> {
        self.fetched.content.content()
    }

    pub fn comments(&self) -> &CommentSummary {
        &self.fetched.comments
    }

    pub fn topic(&self) -> Topic {
        self.classification.topic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_outcome_labels() {
        assert_eq!(FetchOutcome::Video.to_string(), "video");
        assert_eq!(FetchOutcome::for_extension(".zip").to_string(), "zip");
        assert_eq!(FetchOutcome::for_extension("pdf"), FetchOutcome::Pdf);
        assert_eq!(FetchOutcome::NoUrl.to_string(), "no-url");
        assert!(FetchOutcome::InvalidUrl.is_skip());
        assert!(!FetchOutcome::Failed.is_skip());
    }

    #[test]
    fn fetch_outcome_serializes_as_label() {
        let json = serde_json::to_string(&FetchOutcome::Extension("mp4".into())).unwrap();
        assert_eq!(json, "\"mp4\"");
        let parsed: FetchOutcome = serde_json::from_str("\"invalid-url\"").unwrap();
        assert_eq!(parsed, FetchOutcome::InvalidUrl);
        let parsed: FetchOutcome = serde_json::from_str("\"pdf\"").unwrap();
        assert_eq!(parsed, FetchOutcome::Pdf);
    }

    #[test]
    fn content_present_iff_article() {
        let ok = ContentFetch::article("body".into());
        assert_eq!(ok.outcome(), &FetchOutcome::Article);
        assert_eq!(ok.content(), Some("body"));

        let empty = ContentFetch::article(String::new());
        assert_eq!(empty.outcome(), &FetchOutcome::Failed);
        assert!(empty.content().is_none());

        let forced = ContentFetch::unavailable(FetchOutcome::Article);
        assert_eq!(forced.outcome(), &FetchOutcome::Failed);
    }

    #[test]
    fn item_kind_unknown_types_are_other() {
        let kind: ItemKind = serde_json::from_str("\"pollopt\"").unwrap();
        assert_eq!(kind, ItemKind::Other);
        let kind: ItemKind = serde_json::from_str("\"story\"").unwrap();
        assert_eq!(kind, ItemKind::Story);
    }

    #[test]
    fn topic_parsing_is_closed() {
        assert_eq!("Databases".parse::<Topic>(), Ok(Topic::Databases));
        assert_eq!(" ai/ml ".parse::<Topic>(), Ok(Topic::AiMl));
        assert!("Cooking".parse::<Topic>().is_err());
        assert_eq!(
            serde_json::to_string(&Topic::SecurityPrivacy).unwrap(),
            "\"Security/Privacy\""
        );
    }

    #[test]
    fn fallback_and_skipped_share_topic_but_not_status() {
        let fallback = Classification::Fallback {
            reason: "timeout".into(),
        };
        let skipped = Classification::Skipped;
        assert_eq!(fallback.topic(), Topic::OpenSource);
        assert_eq!(skipped.topic(), Topic::OpenSource);
        assert_eq!(fallback.confidence(), Some(Confidence::Low));
        assert_eq!(skipped.confidence(), None);
        assert_ne!(fallback.status(), skipped.status());
        assert!(!fallback.is_classified());
    }

    #[test]
    fn unknown_topic_keeps_tags_and_confidence() {
        let unknown = Classification::UnknownTopic {
            answered: "Cooking".into(),
            tags: vec!["rust".into()],
            confidence: Confidence::High,
        };
        assert_eq!(unknown.topic(), Topic::FALLBACK);
        assert_eq!(unknown.tags(), ["rust".to_string()]);
        assert_eq!(unknown.confidence(), Some(Confidence::High));
        assert_eq!(unknown.status(), "fallback");
        assert!(!unknown.is_classified());
    }

    #[test]
    fn confidence_is_lenient() {
        assert_eq!(Confidence::parse_lenient("HIGH"), Confidence::High);
        assert_eq!(Confidence::parse_lenient("medium"), Confidence::Medium);
        assert_eq!(Confidence::parse_lenient("very sure"), Confidence::Low);
    }
}
