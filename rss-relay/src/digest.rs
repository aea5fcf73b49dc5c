use crate::types::{CandidateItem, DigestRequest};
use crate::utils::text;
use chrono::{NaiveDate, Utc};

/// Summaries longer than this are cut before they go into the prompt.
pub const PROMPT_SUMMARY_CHARS: usize = 500;

/// Builds the summarization prompt for today's date.
pub fn build_prompt(request: &DigestRequest) -> String {
    build_prompt_for(request, Utc::now().date_naive())
}

/// Lists every item in discovery order with its title, source, summary and
/// link, under instructions naming the target language and topic.
pub fn build_prompt_for(request: &DigestRequest, today: NaiveDate) -> String {
    let mut prompt = format!(
        "You are a subject-matter editor. Turn the following {count} new items about {topic} \
         into a short daily digest written in {language}.\n\
         Group related items under short category headings, give each item its title, \
         a one-sentence plain-language takeaway and its link.\n\
         Begin with the heading: 📅 {date} digest.\n\
         Use only simple Markdown (*bold*, _italic_, [text](url)); no tables.\n",
        count = request.items.len(),
        topic = request.topic,
        language = request.language,
        date = today.format("%Y-%m-%d"),
    );

    for (i, item) in request.items.iter().enumerate() {
        prompt.push_str(&format!("\n---\nItem {}:\n", i + 1));
        prompt.push_str(&format!("Title: {}\n", item.title));
        if !item.source.is_empty() {
            prompt.push_str(&format!("Source: {}\n", item.source));
        }
        if let Some(published) = item.published {
            prompt.push_str(&format!("Published: {}\n", published.format("%Y-%m-%d")));
        }
        prompt.push_str(&format!(
            "Summary: {}\n",
            text::truncate_chars(&item.summary, PROMPT_SUMMARY_CHARS)
        ));
        prompt.push_str(&format!("Link: {}\n", item.link));
    }

    prompt
}

/// Plain listing sent when no digest could be produced: a dated header with
/// the failure note, then title and link of at most `max_items` items.
pub fn fallback_listing(items: &[CandidateItem], today: NaiveDate, reason: &str, max_items: usize) -> String {
    let mut listing = format!(
        "📅 {} New items (automatic summary unavailable)\n",
        today.format("%Y-%m-%d")
    );
    if !reason.is_empty() {
        listing.push_str(&format!("Reason: {}\n", reason));
    }
    listing.push_str(&format!("\n{} new items found:\n\n", items.len()));

    for item in items.iter().take(max_items) {
        listing.push_str(&format!("• {}\n  {}\n\n", item.title, item.link));
    }
    if items.len() > max_items {
        listing.push_str(&format!("…and {} more.\n", items.len() - max_items));
    }

    listing.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn prompt_lists_items_in_discovery_order() {
        let items = vec![
            CandidateItem::new("1", "First study", "https://a")
                .with_source("PubMed")
                .with_summary("x".repeat(800))
                .with_published(Utc.with_ymd_and_hms(2026, 1, 4, 8, 0, 0).unwrap()),
            CandidateItem::new("2", "Second trial", "https://b").with_summary("short"),
        ];
        let request = DigestRequest::new(items, "zh-CN", "pediatric lupus");
        let prompt = build_prompt_for(&request, date());

        assert!(prompt.contains("2 new items about pediatric lupus"));
        assert!(prompt.contains("written in zh-CN"));
        assert!(prompt.contains("2026-01-05"));
        assert!(prompt.contains("Published: 2026-01-04"));
        let first = prompt.find("Title: First study").unwrap();
        let second = prompt.find("Title: Second trial").unwrap();
        assert!(first < second);
        assert!(prompt.contains(&format!("Summary: {}...", "x".repeat(PROMPT_SUMMARY_CHARS))));
        assert!(!prompt.contains(&"x".repeat(PROMPT_SUMMARY_CHARS + 1)));
    }

    #[test]
    fn fallback_lists_titles_and_links() {
        let items = vec![CandidateItem::new("B", "T", "L")];
        let listing = fallback_listing(&items, date(), "quota exhausted", 10);

        assert!(listing.starts_with("📅 2026-01-05"));
        assert!(listing.contains("quota exhausted"));
        assert!(listing.contains("• T\n  L"));
    }

    #[test]
    fn fallback_is_capped() {
        let items: Vec<CandidateItem> = (0..15)
            .map(|i| CandidateItem::new(format!("{i}"), format!("Title {i}"), format!("https://x/{i}")))
            .collect();
        let listing = fallback_listing(&items, date(), "", 10);

        assert!(listing.contains("15 new items found"));
        assert!(listing.contains("Title 9"));
        assert!(!listing.contains("Title 10"));
        assert!(listing.contains("…and 5 more."));
        assert!(!listing.contains("Reason:"));
    }
}
