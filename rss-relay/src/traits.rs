use crate::channels::ChannelError;
use crate::types::{CandidateItem, MarkupDialect, Result};
use async_trait::async_trait;

/// Trait for pulling candidate items from a single source (an RSS feed, an API, ...)
#[async_trait]
pub trait PullFeed: Send + Sync {
    /// Human-readable label, copied onto every item as its source
    fn source_name(&self) -> String;

    /// Fetch the source's current items, in the order the source lists them
    async fn pull(&mut self) -> Result<Vec<CandidateItem>>;
}

/// Produces the candidate items for one run.
///
/// Implementations must tolerate partial failure: a source that cannot be
/// reached is logged and skipped, and whatever the other sources returned is
/// still handed back. Ordering is only guaranteed within a single source.
#[async_trait]
pub trait SourceCollector: Send {
    async fn collect(&mut self) -> Vec<CandidateItem>;
}

/// A notification channel with a hard message length and a markup dialect.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Maximum characters per message.
    fn max_length(&self) -> usize;

    fn dialect(&self) -> MarkupDialect;

    /// Send one message. `markup` selects rich rendering in the channel's dialect.
    async fn send(&self, text: &str, markup: bool) -> std::result::Result<(), ChannelError>;
}
