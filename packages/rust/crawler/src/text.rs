//! Comment body cleanup.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node};

/// Convert a comment's HTML fragment into plain text.
///
/// Entities are decoded, `<p>` starts a new paragraph, `<br>` a new line.
/// Lines are trimmed and runs of blank lines collapse to one. Broken markup
/// yields whatever text the parser recovers.
pub fn clean_comment_text(html: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    if html.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let mut raw = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name() == "p" => raw.push_str("\n\n"),
            Node::Element(el) if el.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }

    let trimmed = raw.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    BLANK_RUN_RE.replace_all(&trimmed, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities_and_strips_tags() {
        assert_eq!(
            clean_comment_text("Use <i>Rust</i> &amp; don&#x27;t look back"),
            "Use Rust & don't look back"
        );
    }

    #[test]
    fn paragraphs_become_blank_lines() {
        assert_eq!(
            clean_comment_text("First point.<p>Second point.<p>Third."),
            "First point.\n\nSecond point.\n\nThird."
        );
    }

    #[test]
    fn line_breaks_and_whitespace() {
        assert_eq!(
            clean_comment_text("  one  <br>   two   <p><p><p>three"),
            "one\ntwo\n\nthree"
        );
    }

    #[test]
    fn links_keep_their_text() {
        assert_eq!(
            clean_comment_text(r#"See <a href="https://example.com" rel="nofollow">the docs</a>."#),
            "See the docs."
        );
    }

    #[test]
    fn malformed_markup_degrades() {
        assert_eq!(clean_comment_text("<p>unclosed <b>bold"), "unclosed bold");
        assert_eq!(clean_comment_text(""), "");
    }
}
