use crate::markup;
use crate::traits::DeliveryChannel;
use crate::types::{ChunkOutcome, DeliveryChunk, MarkupDialect};
use crate::utils::text;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

/// Filler is a short acknowledgement; anything longer is content.
const MAX_PREAMBLE_LINE_CHARS: usize = 60;

static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*_=~—]{3,}$").expect("valid separator pattern"));

/// Opening acknowledgement phrase, followed by a word break that is not a
/// hyphen or digit, so "OK-432" or "Surely" never match.
static FILLER_OPENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:sure|okay|ok|certainly|of course|absolutely|alright|no problem|here is|here's|here are|below is|below are|as requested|i have|i've)(?:[\s,!.:;]|$)|好的|当然|没问题|以下是|下面是|根据您?提供)",
    )
    .expect("valid filler opening pattern")
});

/// A filler line ends like an acknowledgement or lead-in, or is a bare one.
static FILLER_ENDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[:：!！.。]|^(?:sure|okay|ok|certainly|of course|absolutely|alright|好的|当然|没问题))$")
        .expect("valid filler ending pattern")
});

fn is_filler_line(line: &str) -> bool {
    line.is_empty()
        || SEPARATOR_LINE.is_match(line)
        || (line.chars().count() <= MAX_PREAMBLE_LINE_CHARS
            && FILLER_OPENING.is_match(line)
            && FILLER_ENDING.is_match(line))
}

/// What is being delivered. Fallback listings are already plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Digest,
    Fallback,
}

/// Outcome of delivering one text to one channel.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub channel: String,
    pub chunks: Vec<DeliveryChunk>,
}

impl DeliveryReport {
    /// True iff something was sent and no chunk failed.
    pub fn is_success(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.outcome.is_sent())
    }

    pub fn sent_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.outcome.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Failed { .. }))
            .count()
    }
}

/// Drops leading blank lines, separators and conversational filler. If
/// nothing substantive remains the text is returned unchanged.
pub fn strip_preamble(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if !is_filler_line(line.trim()) {
            if offset > 0 {
                debug!("Stripped {} bytes of preamble", offset);
            }
            return &text[offset..];
        }
        offset += line.len();
    }
    text
}

/// Splits `text` into chunks of at most `max_len` characters, preferring to
/// break at the last newline within the limit. Newlines removed at each break
/// are kept in the chunk's `boundary`, so joining `text + boundary` over all
/// chunks gives back the input.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<DeliveryChunk> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_len {
        let limit = text::byte_offset_of_char(rest, max_len);
        let cut = if rest[limit..].starts_with('\n') {
            limit
        } else {
            rest[..limit].rfind('\n').filter(|&p| p > 0).unwrap_or(limit)
        };

        let tail = &rest[cut..];
        let remainder = tail.trim_start_matches('\n');
        let boundary = &tail[..tail.len() - remainder.len()];
        chunks.push(DeliveryChunk::new(chunks.len(), rest[..cut].to_string(), boundary.to_string()));
        rest = remainder;
    }

    if !rest.is_empty() {
        chunks.push(DeliveryChunk::new(chunks.len(), rest.to_string(), String::new()));
    }
    chunks
}

/// Pushes text through a length-limited channel, one chunk at a time, with a
/// single degrade from rich markup to plain text per chunk.
#[derive(Debug, Default, Clone)]
pub struct DeliveryEngine;

impl DeliveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// The chunks `deliver` would send, without sending them.
    pub fn plan(&self, text: &str, kind: ContentKind, max_len: usize) -> Vec<DeliveryChunk> {
        let body = match kind {
            ContentKind::Digest => strip_preamble(text),
            ContentKind::Fallback => text,
        };
        chunk_text(body, max_len)
    }

    /// Every chunk is attempted even after a failure; the report tells the
    /// caller whether all of them made it.
    pub async fn deliver(&self, channel: &dyn DeliveryChannel, text: &str, kind: ContentKind) -> DeliveryReport {
        let dialect = channel.dialect();
        let rich = kind == ContentKind::Digest && dialect != MarkupDialect::Plain;
        let mut chunks = self.plan(text, kind, channel.max_length());
        let total = chunks.len();

        info!(
            "Delivering {} chunk(s) to {} ({}, limit {})",
            total,
            channel.name(),
            if rich { dialect.as_str() } else { "plain" },
            channel.max_length()
        );

        for chunk in chunks.iter_mut() {
            chunk.outcome = self.send_chunk(channel, chunk, rich, total).await;
            chunk.rich_attempted = rich;
        }

        let report = DeliveryReport {
            channel: channel.name().to_string(),
            chunks,
        };
        if report.is_success() {
            info!("Delivered all {} chunk(s) to {}", total, report.channel);
        } else {
            error!(
                "Delivery to {} incomplete: {} sent, {} failed",
                report.channel,
                report.sent_count(),
                report.failed_count()
            );
        }
        report
    }

    async fn send_chunk(
        &self,
        channel: &dyn DeliveryChannel,
        chunk: &DeliveryChunk,
        rich: bool,
        total: usize,
    ) -> ChunkOutcome {
        let position = chunk.index + 1;

        if rich {
            let escaped = markup::escape(channel.dialect(), &chunk.text);
            match channel.send(&escaped, true).await {
                Ok(()) => {
                    info!("Chunk {}/{} sent to {}", position, total, channel.name());
                    return ChunkOutcome::SentRich;
                }
                Err(e) => warn!(
                    "Chunk {}/{} rejected with markup by {} ({}), retrying as plain text",
                    position,
                    total,
                    channel.name(),
                    e
                ),
            }
        }

        match channel.send(&chunk.text, false).await {
            Ok(()) => {
                info!("Chunk {}/{} sent to {} as plain text", position, total, channel.name());
                ChunkOutcome::SentPlain
            }
            Err(e) => {
                error!("Chunk {}/{} failed on {}: {}", position, total, channel.name(), e);
                ChunkOutcome::Failed { error: e.to_string() }
            }
        }
    }
}
