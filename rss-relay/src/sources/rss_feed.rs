use crate::traits::PullFeed;
use crate::types::{CandidateItem, Result, SourceSpec};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Generic RSS/Atom feed source
pub struct RssFeedSource {
    spec: SourceSpec,
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(spec: SourceSpec, fetcher: Arc<Fetcher>) -> Self {
        let parser = FeedParser::new(spec.name.clone());
        Self { spec, fetcher, parser }
    }

    pub fn url(&self) -> &str {
        &self.spec.url
    }
}

#[async_trait]
impl PullFeed for RssFeedSource {
    fn source_name(&self) -> String {
        self.spec.name.clone()
    }

    async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
        info!("Pulling feed '{}': {}", self.spec.name, self.spec.url);

        let content = self.fetcher.fetch_feed(&self.spec.url).await?;
        let items = self.parser.parse_feed(&content)?;

        info!("Pulled {} items from '{}'", items.len(), self.spec.name);
        Ok(items)
    }
}
