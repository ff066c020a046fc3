//! Score-ranked comment tree walk.
//!
//! The walk is two levels deep at most: the best top-level comments, then the
//! best replies under each of them. Anything deeper is never fetched.

use tracing::{debug, warn};

use hnsift_feed::FeedClient;
use hnsift_shared::{CommentLimits, CommentSummary, HighValueComment, Item};

use crate::text::clean_comment_text;

/// Builds a [`CommentSummary`] for a story. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommentWalker {
    feed: FeedClient,
    limits: CommentLimits,
}

impl CommentWalker {
    pub fn new(feed: FeedClient, limits: CommentLimits) -> Self {
        Self { feed, limits }
    }

    /// Walk the comments under `story`. Never fails; unreachable comments are
    /// simply missing from the summary.
    pub async fn walk(&self, story: &Item) -> CommentSummary {
        if story.child_ids.is_empty() {
            return CommentSummary::default();
        }

        let top = select_top(
            self.feed.fetch_items(&story.child_ids).await,
            self.limits.max_top_level,
        );

        // One fan-out for every kept comment's replies.
        let reply_handles: Vec<_> = top
            .iter()
            .map(|comment| {
                let feed = self.feed.clone();
                let child_ids = comment.child_ids.clone();
                let limit = self.limits.max_replies_per_comment;
                tokio::spawn(async move {
                    if child_ids.is_empty() || limit == 0 {
                        return Vec::new();
                    }
                    select_top(feed.fetch_items(&child_ids).await, limit)
                })
            })
            .collect();

        let mut lines = Vec::new();
        let mut high_value = Vec::new();

        for (comment, handle) in top.iter().zip(reply_handles) {
            self.record(comment, 0, &mut lines, &mut high_value);

            let replies = match handle.await {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(comment_id = comment.id, error = %e, "reply fetch task failed");
                    Vec::new()
                }
            };
            for reply in &replies {
                self.record(reply, 1, &mut lines, &mut high_value);
            }
        }

        debug!(
            story_id = story.id,
            selected = top.len(),
            lines = lines.len(),
            high_value = high_value.len(),
            "comment walk complete"
        );

        CommentSummary {
            formatted_text: lines.join("\n\n"),
            high_value_comments: high_value,
            selected_count: top.len(),
        }
    }

    fn record(
        &self,
        comment: &Item,
        indent: usize,
        lines: &mut Vec<String>,
        high_value: &mut Vec<HighValueComment>,
    ) {
        let text = clean_comment_text(comment.text.as_deref().unwrap_or_default());
        lines.push(format_comment(comment, &text, indent));

        if comment.score >= self.limits.high_score_threshold {
            high_value.push(HighValueComment {
                author: comment.author_or_anonymous().to_string(),
                text,
                score: comment.score,
            });
        }
    }
}

/// Keep comments only, best score first, ties in input order, at most `limit`.
pub fn select_top(items: Vec<Item>, limit: usize) -> Vec<Item> {
    let mut comments: Vec<Item> = items.into_iter().filter(Item::is_comment).collect();
    // sort_by is stable
    comments.sort_by(|a, b| b.score.cmp(&a.score));
    comments.truncate(limit);
    comments
}

/// One summary line. Indent 0 is a top-level comment, anything deeper a reply.
pub fn format_comment(comment: &Item, text: &str, indent: usize) -> String {
    let author = comment.author_or_anonymous();
    if indent == 0 {
        format!("[Score: {}] {author}: {text}", comment.score)
    } else {
        format!("{}|- [Score: {}] {author}: {text}", "  ".repeat(indent), comment.score)
    }
}
