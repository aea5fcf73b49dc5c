use crate::types::{CandidateItem, RelayError, Result};
use crate::utils::text;
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, info};

const UNTITLED: &str = "Untitled";
const NO_SUMMARY: &str = "(no summary)";

pub struct FeedParser {
    source_name: String,
}

impl FeedParser {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
        }
    }

    /// Parses an RSS or Atom document into candidate items, preserving the
    /// feed's own entry order.
    pub fn parse_feed(&self, content: &[u8]) -> Result<Vec<CandidateItem>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| RelayError::Parse(format!("Failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let items: Vec<CandidateItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry))
            .collect();

        if items.len() < total {
            debug!("Dropped {} entries without any identifier", total - items.len());
        }
        info!("Parsed {} entries from '{}'", items.len(), self.source_name);
        Ok(items)
    }

    fn parse_entry(&self, entry: feed_rs::model::Entry) -> Option<CandidateItem> {
        let title = entry.title.map(|t| t.content.trim().to_string()).filter(|t| !t.is_empty());
        let link = entry.links.first().map(|l| l.href.trim().to_string()).filter(|l| !l.is_empty());

        // Prefer the feed's id, then the link, then the title.
        let id = Some(entry.id.trim().to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| link.clone())
            .or_else(|| title.clone())?;

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|s| text::normalize_summary(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string());

        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        Some(CandidateItem {
            id,
            title: title.unwrap_or_else(|| UNTITLED.to_string()),
            link: link.unwrap_or_default(),
            summary,
            source: self.source_name.clone(),
            published,
        })
    }
}
