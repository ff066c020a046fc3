//! Article content retrieval through the extraction proxy.
//!
//! Every story gets exactly one [`FetchOutcome`]. URLs that point at video
//! hosts, binary downloads or nothing at all are rejected by [`classify_url`]
//! before any request is made.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use hnsift_feed::{AttemptError, with_retry};
use hnsift_shared::{
    ContentFetch, CrawlerSettings, FetchOutcome, HnSiftError, Item, Result, RetryPolicy,
};

/// User-Agent string for proxy requests.
const USER_AGENT: &str = concat!("hnsift/", env!("CARGO_PKG_VERSION"));

/// Hosts whose pages are video players rather than articles.
const BLOCKED_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com"];

/// Path suffixes for content the proxy cannot turn into text.
const BLOCKED_EXTENSIONS: &[&str] = &[
    ".pdf", ".mp4", ".mp3", ".avi", ".mov", ".zip", ".tar", ".gz",
];

// ---------------------------------------------------------------------------
// URL policy
// ---------------------------------------------------------------------------

/// Decision taken for a story URL before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    /// Worth sending through the proxy.
    Fetch(String),
    /// Never fetched; recorded with this outcome.
    Skip(FetchOutcome),
}

/// Apply the fetch-or-skip policy to a story URL.
pub fn classify_url(url: Option<&str>) -> UrlVerdict {
    let raw = match url.map(str::trim) {
        Some(u) if !u.is_empty() => u,
        _ => return UrlVerdict::Skip(FetchOutcome::NoUrl),
    };

    let parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(_) => return UrlVerdict::Skip(FetchOutcome::InvalidUrl),
    };

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return UrlVerdict::Skip(FetchOutcome::InvalidUrl),
    };

    if BLOCKED_DOMAINS.iter().any(|d| host_matches(&host, d)) {
        return UrlVerdict::Skip(FetchOutcome::Video);
    }

    let path = parsed.path().to_ascii_lowercase();
    if let Some(ext) = BLOCKED_EXTENSIONS.iter().find(|ext| path.ends_with(*ext)) {
        return UrlVerdict::Skip(FetchOutcome::for_extension(ext));
    }

    UrlVerdict::Fetch(raw.to_string())
}

/// `host` is `domain` or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

/// Fetches rendered article text via `{reader_base}/{url}`. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: Client,
    reader_base: String,
    retry: RetryPolicy,
    min_content_chars: usize,
}

impl ContentFetcher {
    /// Create a fetcher for the proxy rooted at `reader_base`.
    pub fn new(
        reader_base: impl Into<String>,
        retry: RetryPolicy,
        min_content_chars: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(retry.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HnSiftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            reader_base: reader_base.into().trim_end_matches('/').to_string(),
            retry,
            min_content_chars,
        })
    }

    /// Create a fetcher from runtime settings.
    pub fn from_settings(settings: &CrawlerSettings) -> Result<Self> {
        Self::new(
            &settings.reader_base_url,
            settings.retry.clone(),
            settings.min_content_chars,
        )
    }

    /// Extracted text for `url`, or `None` once retries are spent or the
    /// response is unusable.
    pub async fn fetch_content(&self, url: &str) -> Option<String> {
        let proxied = format!("{}/{url}", self.reader_base);

        match with_retry(&self.retry, url, |_| self.attempt(&proxied)).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(%url, error = %e, "content fetch failed");
                None
            }
        }
    }

    async fn attempt(&self, proxied: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .get(proxied)
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

        let chars = body.chars().count();
        if chars < self.min_content_chars {
            return Err(AttemptError::Permanent(format!(
                "extracted body too short ({chars} < {} chars)",
                self.min_content_chars
            )));
        }

        Ok(body)
    }

    /// Resolve the content outcome for one story. Never fails.
    pub async fn fetch_article_data(&self, item: &Item) -> ContentFetch {
        let url = match classify_url(item.url.as_deref()) {
            UrlVerdict::Fetch(url) => url,
            UrlVerdict::Skip(outcome) => {
                debug!(story_id = item.id, %outcome, "skipping content fetch");
                return ContentFetch::unavailable(outcome);
            }
        };

        match self.fetch_content(&url).await {
            Some(text) => ContentFetch::article(text),
            None => {
                warn!(story_id = item.id, %url, "content unavailable");
                ContentFetch::unavailable(FetchOutcome::Failed)
            }
        }
    }

    /// Fetch content for every story concurrently, one task per story.
    /// Results keep the input order.
    #[instrument(skip_all, fields(count = items.len()))]
    pub async fn fetch_multiple(&self, items: &[Item]) -> Vec<(u64, ContentFetch)> {
        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                let fetcher = self.clone();
                let item = item.clone();
                tokio::spawn(async move {
                    let fetch = fetcher.fetch_article_data(&item).await;
                    (item.id, fetch)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(items.len());
        for (item, handle) in items.iter().zip(handles) {
            match handle.await {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    warn!(story_id = item.id, error = %e, "content task failed");
                    results.push((item.id, ContentFetch::unavailable(FetchOutcome::Failed)));
                }
            }
        }

        let fetched = results
            .iter()
            .filter(|(_, f)| f.outcome() == &FetchOutcome::Article)
            .count();
        info!(total = results.len(), fetched, "content fetch complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsift_shared::ItemKind;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn story(id: u64, url: Option<&str>) -> Item {
        Item {
            id,
            kind: ItemKind::Story,
            author: Some("pg".into()),
            created_at: 1_700_000_000,
            title: format!("Story {id}"),
            url: url.map(String::from),
            score: 10,
            descendant_count: 0,
            child_ids: Vec::new(),
            text: None,
        }
    }

    fn long_body() -> String {
        "Readable article text. ".repeat(10)
    }

    #[test]
    fn missing_and_empty_urls() {
        assert_eq!(classify_url(None), UrlVerdict::Skip(FetchOutcome::NoUrl));
        assert_eq!(classify_url(Some("  ")), UrlVerdict::Skip(FetchOutcome::NoUrl));
    }

    #[test]
    fn unparseable_or_hostless_urls() {
        assert_eq!(
            classify_url(Some("not a url")),
            UrlVerdict::Skip(FetchOutcome::InvalidUrl)
        );
        assert_eq!(
            classify_url(Some("mailto:someone@example.com")),
            UrlVerdict::Skip(FetchOutcome::InvalidUrl)
        );
    }

    #[test]
    fn video_hosts_and_subdomains() {
        for url in [
            "https://youtube.com/watch?v=abc",
            "https://www.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "https://player.vimeo.com/video/1",
        ] {
            assert_eq!(classify_url(Some(url)), UrlVerdict::Skip(FetchOutcome::Video), "{url}");
        }
        // Lookalike hosts are not blocked.
        assert!(matches!(
            classify_url(Some("https://notyoutube.com/watch")),
            UrlVerdict::Fetch(_)
        ));
    }

    #[test]
    fn blocked_extensions() {
        assert_eq!(
            classify_url(Some("https://example.com/paper.PDF")),
            UrlVerdict::Skip(FetchOutcome::Pdf)
        );
        assert_eq!(
            classify_url(Some("https://example.com/release.tar")),
            UrlVerdict::Skip(FetchOutcome::Extension("tar".into()))
        );
        assert_eq!(
            classify_url(Some("https://example.com/dump.zip?dl=1")),
            UrlVerdict::Skip(FetchOutcome::Extension("zip".into()))
        );
        assert_eq!(
            classify_url(Some("https://example.com/blog/post")),
            UrlVerdict::Fetch("https://example.com/blog/post".into())
        );
    }

    #[tokio::test]
    async fn blocked_url_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body()))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        let fetch = fetcher
            .fetch_article_data(&story(1, Some("https://example.com/archive.zip")))
            .await;

        assert_eq!(fetch.outcome(), &FetchOutcome::Extension("zip".into()));
        assert!(fetch.content().is_none());
    }

    #[tokio::test]
    async fn article_fetched_through_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://example.com/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        let fetch = fetcher
            .fetch_article_data(&story(2, Some("https://example.com/post")))
            .await;

        assert_eq!(fetch.outcome(), &FetchOutcome::Article);
        assert_eq!(fetch.content(), Some(long_body().as_str()));
    }

    #[tokio::test]
    async fn succeeds_after_max_minus_one_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body()))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        let fetch = fetcher
            .fetch_article_data(&story(3, Some("https://example.com/flaky")))
            .await;

        assert_eq!(fetch.outcome(), &FetchOutcome::Article);
    }

    #[tokio::test]
    async fn exhausted_retries_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        let fetch = fetcher
            .fetch_article_data(&story(4, Some("https://example.com/down")))
            .await;

        assert_eq!(fetch.outcome(), &FetchOutcome::Failed);
        assert!(fetch.content().is_none());
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        let fetch = fetcher
            .fetch_article_data(&story(5, Some("https://example.com/paywall")))
            .await;

        assert_eq!(fetch.outcome(), &FetchOutcome::Failed);
    }

    #[tokio::test]
    async fn short_body_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Just a moment..."))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(3), 100).unwrap();
        assert!(fetcher.fetch_content("https://example.com/tiny").await.is_none());
    }

    #[tokio::test]
    async fn fetch_multiple_keeps_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body()))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(server.uri(), fast_policy(1), 100).unwrap();
        let items = vec![
            story(10, Some("https://example.com/a")),
            story(11, None),
            story(12, Some("https://youtu.be/x")),
        ];
        let results = fetcher.fetch_multiple(&items).await;

        let summary: Vec<(u64, FetchOutcome)> = results
            .iter()
            .map(|(id, f)| (*id, f.outcome().clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (10, FetchOutcome::Article),
                (11, FetchOutcome::NoUrl),
                (12, FetchOutcome::Video),
            ]
        );
    }
}
