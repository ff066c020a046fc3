//! Topic classification of fetched stories.
//!
//! The service behind [`Classifier`] is opaque and may answer with anything;
//! [`resolve`] turns its answer (or failure) into a [`Classification`] whose
//! topic is always a member of [`Topic::ALL`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hnsift_shared::{
    Classification, ClassifierConfig, Confidence, FetchedItem, HnSiftError, Result, Topic,
};

/// Content characters sent along with the title.
pub const SNIPPET_CHARS: usize = 500;

/// Tags kept from an answer.
pub const MAX_TAGS: usize = 3;

const NO_CONTENT: &str = "No content available";

// ---------------------------------------------------------------------------
// Request / answer
// ---------------------------------------------------------------------------

/// Everything the service gets to see about a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub title: String,
    /// First [`SNIPPET_CHARS`] characters of content, or a placeholder.
    pub snippet: String,
    pub topics: Vec<Topic>,
}

impl ClassificationRequest {
    pub fn for_item(fetched: &FetchedItem) -> Self {
        let snippet = match fetched.content.content() {
            Some(text) => text.chars().take(SNIPPET_CHARS).collect(),
            None => NO_CONTENT.to_string(),
        };
        Self {
            title: fetched.item.title.clone(),
            snippet,
            topics: Topic::ALL.to_vec(),
        }
    }
}

/// Unvalidated answer from the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawClassification {
    pub topic: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub confidence: String,
}

/// Seam for the classification service.
pub trait Classifier: Send + Sync + 'static {
    fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> impl Future<Output = Result<RawClassification>> + Send;
}

/// Validate an answer. A failed call becomes a fallback; an unknown topic is
/// replaced but the rest of the answer is kept.
pub fn resolve(answer: Result<RawClassification>) -> Classification {
    let raw = match answer {
        Ok(raw) => raw,
        Err(e) => {
            return Classification::Fallback {
                reason: e.to_string(),
            };
        }
    };

    let tags = clean_tags(raw.tags);
    let confidence = Confidence::parse_lenient(&raw.confidence);
    match raw.topic.parse::<Topic>() {
        Ok(topic) => Classification::Classified {
            topic,
            tags,
            confidence,
        },
        Err(_) => Classification::UnknownTopic {
            answered: raw.topic,
            tags,
            confidence,
        },
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

/// Classify one story. Untitled stories fall back without calling the service.
pub async fn classify_article<C: Classifier>(
    classifier: &C,
    fetched: &FetchedItem,
) -> Classification {
    if fetched.item.title.trim().is_empty() {
        warn!(story_id = fetched.item.id, "story has no title, skipping classification");
        return Classification::Fallback {
            reason: "empty title".into(),
        };
    }

    let request = ClassificationRequest::for_item(fetched);
    let classification = resolve(classifier.classify(&request).await);

    match &classification {
        Classification::Fallback { reason } => {
            warn!(story_id = fetched.item.id, %reason, "classification fell back");
        }
        Classification::UnknownTopic { answered, .. } => {
            warn!(story_id = fetched.item.id, %answered, "unknown topic, using default");
        }
        other => {
            debug!(story_id = fetched.item.id, topic = %other.topic(), "classified");
        }
    }
    classification
}

// ---------------------------------------------------------------------------
// ChatClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Classifier backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct ChatClassifier {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for ChatClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClassifier")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatClassifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HnSiftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Build from the `[classifier]` config section and an already-validated key.
    pub fn from_config(config: &ClassifierConfig, api_key: String) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            api_key,
            &config.model,
            config.temperature,
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| HnSiftError::config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| HnSiftError::Classification(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HnSiftError::Classification(format!(
                "API error ({status}): {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| HnSiftError::Classification(format!("malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| HnSiftError::Classification("empty response".into()))
    }
}

impl Classifier for ChatClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RawClassification> {
        debug!(model = %self.model, title = %request.title, "classification request");
        let answer = self.complete(build_prompt(request)).await?;
        parse_answer(&answer)
    }
}

/// Prompt listing the topic set, the title and the snippet.
pub fn build_prompt(request: &ClassificationRequest) -> String {
    let topics = request
        .topics
        .iter()
        .map(Topic::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Classify this tech news article into exactly one topic \
         and suggest up to {MAX_TAGS} short tags.\n\n\
         Topics: {topics}\n\n\
         Title: {title}\n\n\
         Content (first {SNIPPET_CHARS} characters):\n{snippet}\n\n\
         Answer with a single JSON object and nothing else:\n\
         {{\"topic\": \"<one of the topics>\", \"tags\": [\"...\"], \
         \"confidence\": \"high|medium|low\"}}",
        title = request.title,
        snippet = request.snippet,
    )
}

/// Pull the JSON object out of a reply, tolerating code fences and chatter.
pub fn parse_answer(reply: &str) -> Result<RawClassification> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    };
    serde_json::from_str(json)
        .map_err(|e| HnSiftError::parse(format!("unparseable classification answer: {e}")))
}
