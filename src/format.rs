//! Lightweight markdown-style formatting for message text.
//!
//! Formatting is a fixed, ordered list of pattern → replacement rewrites over
//! the raw text. Later rules see the output of earlier ones, so the order is
//! part of the contract: bold runs before italic, paragraph breaks before
//! line breaks. The rewritten markup is then scanned into a small structure
//! that the terminal renderer can style.

use regex::Regex;
use std::sync::LazyLock;

const STRONG_OPEN: &str = "<strong>";
const STRONG_CLOSE: &str = "</strong>";
const EM_OPEN: &str = "<em>";
const EM_CLOSE: &str = "</em>";
const LINE_BREAK: &str = "<br>";
const PARAGRAPH_OPEN: &str = "<p>";
const PARAGRAPH_CLOSE: &str = "</p>";
const PARAGRAPH_BREAK: &str = "</p><p>";

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

impl Rule {
    fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("formatting rule pattern is valid"),
            replacement,
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"\*\*(.*?)\*\*", "<strong>${1}</strong>"),
        Rule::new(r"\*(.*?)\*", "<em>${1}</em>"),
        Rule::new(r"\n\n", PARAGRAPH_BREAK),
        Rule::new(r"\n", LINE_BREAK),
    ]
});

/// A run of text inside a paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text {
        text: String,
        strong: bool,
        emphasis: bool,
    },
    LineBreak,
}

impl Inline {
    pub fn plain(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            strong: false,
            emphasis: false,
        }
    }

    pub fn strong(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            strong: true,
            emphasis: false,
        }
    }

    pub fn emphasis(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            strong: false,
            emphasis: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub inlines: Vec<Inline>,
}

/// Rendered form of a message body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedText {
    pub paragraphs: Vec<Paragraph>,
}

/// Escape the characters that would otherwise be read as markup.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Apply the rewrite pipeline and wrap the result in a single paragraph.
pub fn format_html(text: &str) -> String {
    let mut out = escape(text);
    for rule in RULES.iter() {
        out = rule
            .pattern
            .replace_all(&out, rule.replacement)
            .into_owned();
    }
    format!("{PARAGRAPH_OPEN}{out}{PARAGRAPH_CLOSE}")
}

/// Format raw message text into styled paragraphs.
pub fn format(text: &str) -> FormattedText {
    FormattedText::from_markup(&format_html(text))
}

impl FormattedText {
    /// Scan markup produced by [`format_html`].
    ///
    /// Style tags toggle flags rather than nest, so the mis-nested output the
    /// pipeline produces for inputs like `*a **b* c**` still renders.
    fn from_markup(markup: &str) -> Self {
        let body = markup
            .strip_prefix(PARAGRAPH_OPEN)
            .and_then(|m| m.strip_suffix(PARAGRAPH_CLOSE))
            .unwrap_or(markup);

        let mut strong = false;
        let mut emphasis = false;
        let mut paragraphs = Vec::new();

        for chunk in body.split(PARAGRAPH_BREAK) {
            let mut inlines = Vec::new();
            let mut rest = chunk;

            while !rest.is_empty() {
                if let Some(after) = rest.strip_prefix(STRONG_OPEN) {
                    strong = true;
                    rest = after;
                } else if let Some(after) = rest.strip_prefix(STRONG_CLOSE) {
                    strong = false;
                    rest = after;
                } else if let Some(after) = rest.strip_prefix(EM_OPEN) {
                    emphasis = true;
                    rest = after;
                } else if let Some(after) = rest.strip_prefix(EM_CLOSE) {
                    emphasis = false;
                    rest = after;
                } else if let Some(after) = rest.strip_prefix(LINE_BREAK) {
                    inlines.push(Inline::LineBreak);
                    rest = after;
                } else {
                    // Escaped text holds no '<', so the run ends at the next tag.
                    let first = rest.chars().next().map_or(1, char::len_utf8);
                    let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
                    inlines.push(Inline::Text {
                        text: unescape(&rest[..end]),
                        strong,
                        emphasis,
                    });
                    rest = &rest[end..];
                }
            }

            paragraphs.push(Paragraph { inlines });
        }

        Self { paragraphs }
    }

    /// Plain-text rendering with markers removed.
    pub fn to_plain(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| {
                p.inlines
                    .iter()
                    .map(|inline| match inline {
                        Inline::Text { text, .. } => text.as_str(),
                        Inline::LineBreak => "\n",
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
