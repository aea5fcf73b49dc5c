use crate::llm_adapter::{ProviderError, ProviderKind, ProviderResult, ProviderSpec, SummaryProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Offline provider for dry runs and tests. Without a canned response it
/// echoes the item lines of the prompt back as a digest.
pub struct MockProvider {
    spec: ProviderSpec,
    response: Option<String>,
    fail: bool,
    response_delay_ms: u64,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_spec(ProviderSpec::builtin(ProviderKind::Mock))
    }

    pub fn with_spec(spec: ProviderSpec) -> Self {
        Self {
            spec,
            response: None,
            fail: false,
            response_delay_ms: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider whose every call fails like an unreachable backend.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.response_delay_ms)).await;
        }
    }

    fn echo_digest(prompt: &str) -> String {
        let mut digest = String::from("📰 Digest (offline preview)\n\n");
        for line in prompt.lines().filter(|l| l.starts_with("Title: ") || l.starts_with("Link: ")) {
            digest.push_str(line);
            digest.push('\n');
        }
        digest
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryProvider for MockProvider {
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    async fn generate(&self, prompt: &str, model: &str) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_processing().await;
        debug!("Mock provider generating with model {}", model);

        if self.fail {
            return Err(ProviderError::Backend {
                status: 503,
                body: "mock backend unavailable".to_string(),
            });
        }
        Ok(self.response.clone().unwrap_or_else(|| Self::echo_digest(prompt)))
    }
}
