//! Per-story content and discussion retrieval.
//!
//! This crate provides:
//! - [`content`]: fetch-or-skip URL policy and the extraction-proxy client
//! - [`comments`]: bounded, score-ranked comment tree walk
//! - [`text`]: comment HTML to plain text

pub mod comments;
pub mod content;
pub mod text;

pub use comments::{CommentWalker, format_comment, select_top};
pub use content::{ContentFetcher, UrlVerdict, classify_url};
pub use text::clean_comment_text;
