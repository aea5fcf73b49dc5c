use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of content offered by a source for a single run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            source: String::new(),
            published: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }

    /// Items without an identifier can never be deduplicated, so they are never "new".
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// A batch to summarize. Item order is discovery order.
#[derive(Clone, Debug)]
pub struct DigestRequest {
    pub items: Vec<CandidateItem>,
    pub language: String,
    pub topic: String,
}

impl DigestRequest {
    pub fn new(items: Vec<CandidateItem>, language: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            items,
            language: language.into(),
            topic: topic.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DigestResult {
    Digest {
        text: String,
        provider: String,
        model: String,
    },
    Unavailable {
        reason: String,
    },
    /// Empty batch, no backend was called.
    Skipped,
}

impl DigestResult {
    pub fn text(&self) -> Option<&str> {
        match self {
            DigestResult::Digest { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, DigestResult::Digest { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupDialect {
    /// Telegram legacy Markdown.
    Markdown,
    Html,
    Plain,
}

impl MarkupDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupDialect::Markdown => "markdown",
            MarkupDialect::Html => "html",
            MarkupDialect::Plain => "plain",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChunkOutcome {
    Pending,
    SentRich,
    SentPlain,
    Failed { error: String },
}

impl ChunkOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChunkOutcome::SentRich | ChunkOutcome::SentPlain)
    }
}

/// One channel-sized fragment of a digest or fallback listing.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryChunk {
    pub index: usize,
    pub text: String,
    /// Newlines the chunker removed between this chunk and the next one.
    pub boundary: String,
    pub rich_attempted: bool,
    pub outcome: ChunkOutcome,
}

impl DeliveryChunk {
    pub fn new(index: usize, text: String, boundary: String) -> Self {
        Self {
            index,
            text,
            boundary,
            rich_attempted: false,
            outcome: ChunkOutcome::Pending,
        }
    }
}

// Object style note:
// Everything here lives for a single run. Nothing in this module is persisted
// except identifiers, which the history store owns.
