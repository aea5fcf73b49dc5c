use crate::traits::{PullFeed, SourceCollector};
use crate::types::{CandidateItem, FetchConfig, Result, SourceSpec};
use crate::Fetcher;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Pulls every configured source in turn, with a fixed pause between
/// requests. A failing source is logged and skipped.
pub struct FeedCollector {
    sources: Vec<Box<dyn PullFeed>>,
    delay: Duration,
}

impl FeedCollector {
    pub fn new(delay: Duration) -> Self {
        Self {
            sources: Vec::new(),
            delay,
        }
    }

    /// One `RssFeedSource` per spec, sharing a single HTTP client.
    pub fn from_specs(specs: &[SourceSpec], fetch_config: FetchConfig, delay: Duration) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(fetch_config)?);
        let mut collector = Self::new(delay);
        for spec in specs {
            collector.add_source(Box::new(super::RssFeedSource::new(spec.clone(), fetcher.clone())));
        }
        Ok(collector)
    }

    pub fn add_source(&mut self, source: Box<dyn PullFeed>) {
        info!("Adding source to collector: {}", source.source_name());
        self.sources.push(source);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

#[async_trait]
impl SourceCollector for FeedCollector {
    async fn collect(&mut self) -> Vec<CandidateItem> {
        let mut items = Vec::new();
        let mut failed = 0;

        for (i, source) in self.sources.iter_mut().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match source.pull().await {
                Ok(pulled) => items.extend(pulled),
                Err(e) => {
                    failed += 1;
                    error!("Failed to pull from source {}: {}", source.source_name(), e);
                }
            }
        }

        info!(
            "Collected {} items from {} sources ({} failed)",
            items.len(),
            self.sources.len(),
            failed
        );
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelayError;

    struct StaticSource {
        name: String,
        items: Option<Vec<CandidateItem>>,
    }

    #[async_trait]
    impl PullFeed for StaticSource {
        fn source_name(&self) -> String {
            self.name.clone()
        }

        async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
            self.items
                .clone()
                .ok_or_else(|| RelayError::HttpStatus {
                    status: 503,
                    reason: "Service Unavailable".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn failing_sources_are_skipped() {
        let mut collector = FeedCollector::new(Duration::ZERO);
        collector.add_source(Box::new(StaticSource {
            name: "one".to_string(),
            items: Some(vec![CandidateItem::new("a", "A", "https://a"), CandidateItem::new("b", "B", "https://b")]),
        }));
        collector.add_source(Box::new(StaticSource {
            name: "down".to_string(),
            items: None,
        }));
        collector.add_source(Box::new(StaticSource {
            name: "two".to_string(),
            items: Some(vec![CandidateItem::new("c", "C", "https://c")]),
        }));

        let ids: Vec<String> = collector.collect().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
