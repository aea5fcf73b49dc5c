/// Text processing utilities
pub mod text {
    /// Truncates to at most `max_chars` characters, appending `...` when cut.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_index, _)) => format!("{}...", text[..byte_index].trim_end()),
            None => text.to_string(),
        }
    }

    /// Byte offset of the `n`th character, or the text length if shorter.
    pub fn byte_offset_of_char(text: &str, n: usize) -> usize {
        text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
    }

    /// Collapses runs of whitespace and strips simple HTML tags, which feeds
    /// often embed in their summaries.
    pub fn normalize_summary(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_tag = false;
        for c in text.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    out.push(' ');
                }
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.scheme() == "http" || url.scheme() == "https",
            Err(_) => false,
        }
    }
}
