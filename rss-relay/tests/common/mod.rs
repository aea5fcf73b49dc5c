// Shared helpers for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rss_relay::channels::ChannelError;
use rss_relay::llm_adapter::ProviderRegistry;
use rss_relay::providers::MockProvider;
use rss_relay::traits::{DeliveryChannel, SourceCollector};
use rss_relay::{CandidateItem, MarkupDialect, Summarizer};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Hands out the same items on every run.
pub struct StaticCollector {
    pub items: Vec<CandidateItem>,
}

impl StaticCollector {
    pub fn boxed(items: Vec<CandidateItem>) -> Box<dyn SourceCollector> {
        Box::new(Self { items })
    }
}

#[async_trait]
impl SourceCollector for StaticCollector {
    async fn collect(&mut self) -> Vec<CandidateItem> {
        self.items.clone()
    }
}

/// Channel that records every send. Sends whose text contains `fail_on`
/// are rejected in both modes.
#[derive(Clone)]
pub struct RecordingChannel {
    pub name: String,
    pub max_length: usize,
    pub dialect: MarkupDialect,
    pub fail_on: Option<String>,
    pub sent: Arc<Mutex<Vec<(String, bool)>>>,
}

impl RecordingChannel {
    pub fn new(name: &str, max_length: usize) -> Self {
        Self {
            name: name.to_string(),
            max_length,
            dialect: MarkupDialect::Markdown,
            fail_on: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(String, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    fn dialect(&self) -> MarkupDialect {
        self.dialect
    }

    async fn send(&self, text: &str, markup: bool) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((text.to_string(), markup));
        match &self.fail_on {
            Some(needle) if text.contains(needle.as_str()) => {
                Err(ChannelError::Rejected(format!("refusing text containing '{}'", needle)))
            }
            _ => Ok(()),
        }
    }
}

/// Summarizer backed by a single mock provider.
pub fn mock_summarizer(provider: MockProvider) -> (Summarizer, Arc<MockProvider>) {
    let provider = Arc::new(provider);
    let mut registry = ProviderRegistry::new();
    registry.register(provider.clone());
    (Summarizer::new(registry, "mock", Duration::from_secs(5)), provider)
}

pub fn item(id: &str, title: &str) -> CandidateItem {
    CandidateItem::new(id, title, format!("https://journal.example.org/articles/{}", id.to_lowercase()))
        .with_source("Journal")
        .with_summary(format!("Summary of {}", title))
}

pub fn read_history(path: &std::path::Path) -> Vec<String> {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}
