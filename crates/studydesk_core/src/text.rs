//! Plain-text extraction from stored notes.
//!
//! Notes are HTML pages or plain text files. The AI features only need the
//! readable text. HTML goes through a real parser so entities are decoded
//! and scripts, styles and comments dropped; anything else is taken as
//! written, so `x<3` in a `.txt` note survives.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};
use std::path::Path;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BREAKING_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Whether a note with this file name is parsed as HTML.
pub fn is_html_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

/// Readable text of a note named `name`, whitespace collapsed.
pub fn note_plain_text(name: &str, content: &str) -> String {
    if is_html_name(name) {
        html_to_text(content)
    } else {
        collapse_whitespace(content)
    }
}

/// Text content of an HTML document.
pub fn html_to_text(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut text = String::with_capacity(content.len() / 2);
    for node in document.root_element().descendants() {
        match node.value() {
            Node::Text(chunk) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
                });
                if !hidden {
                    text.push_str(chunk);
                }
            }
            Node::Element(element) if BREAKING_ELEMENTS.contains(&element.name()) => {
                text.push(' ');
            }
            _ => {}
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value, " ").trim().to_string()
}

/// First `max_chars` characters of `value`, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &value[..byte_index],
        None => value,
    }
}
