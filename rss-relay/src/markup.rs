//! Escaping for the markup dialects channels understand.
//!
//! The Markdown escaper is a small heuristic tokenizer, not a parser. Its
//! grammar subset:
//!
//! * `*`, `_` and `` ` `` are paired delimiters. A chunk with an even count of
//!   one of them is assumed to be well paired and left alone; an odd count
//!   means at least one marker is unterminated, so every occurrence of that
//!   character is backslash-escaped.
//! * `[` opens a link token when the first `]` after it is immediately
//!   followed by `(`, as in `[text](url)`. Any other `[` is escaped.
//!
//! Known false negatives: two unbalanced markers of the same kind (an even
//! count that is still broken), nested or interleaved markers, delimiters
//! inside link URLs counting toward parity, and pre-escaped characters being
//! counted as markers.

use crate::types::MarkupDialect;

const PAIRED: [char; 3] = ['*', '_', '`'];

/// Escapes `text` for rich delivery in `dialect`.
pub fn escape(dialect: MarkupDialect, text: &str) -> String {
    match dialect {
        MarkupDialect::Markdown => escape_markdown(text),
        MarkupDialect::Html => escape_html(text),
        MarkupDialect::Plain => text.to_string(),
    }
}

pub fn escape_markdown(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let unbalanced: Vec<char> = PAIRED
        .iter()
        .copied()
        .filter(|d| chars.iter().filter(|c| *c == d).count() % 2 == 1)
        .collect();

    let mut out = String::with_capacity(text.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        let needs_escape = match c {
            '[' => !opens_link(&chars, i),
            _ => unbalanced.contains(&c),
        };
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whether the `[` at `start` begins a `[text](url)` token.
fn opens_link(chars: &[char], start: usize) -> bool {
    chars[start + 1..]
        .iter()
        .position(|&c| c == ']')
        .map(|offset| chars.get(start + 1 + offset + 1) == Some(&'('))
        .unwrap_or(false)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br>\n"),
            _ => out.push(c),
        }
    }
    out
}
