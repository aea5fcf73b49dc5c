use crate::config::{ConfigError, SummarizerConfig};
use crate::digest;
use crate::providers::{GeminiProvider, MockProvider, OpenAiCompatibleProvider};
use crate::types::{DigestRequest, DigestResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The enumerated set of summarization backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    DeepSeek,
    Ollama,
    Mock,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::DeepSeek,
        ProviderKind::Ollama,
        ProviderKind::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// The backend can list its models and the provider picks one.
    pub model_discovery: bool,
    /// Calls are pointless without a credential.
    pub requires_credential: bool,
}

/// One row of the provider table.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub base_url: String,
    pub credential: Option<String>,
    pub default_model: String,
    pub capabilities: ProviderCapabilities,
}

// Credentials stay out of logs.
impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("default_model", &self.default_model)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl ProviderSpec {
    /// The built-in table entry for `kind`, before any overrides.
    pub fn builtin(kind: ProviderKind) -> Self {
        let (base_url, default_model, capabilities) = match kind {
            ProviderKind::Gemini => (
                "https://generativelanguage.googleapis.com",
                "gemini-1.5-flash",
                ProviderCapabilities {
                    model_discovery: true,
                    requires_credential: true,
                },
            ),
            ProviderKind::OpenAi => (
                "https://api.openai.com/v1",
                "gpt-4o-mini",
                ProviderCapabilities {
                    model_discovery: false,
                    requires_credential: true,
                },
            ),
            ProviderKind::DeepSeek => (
                "https://api.deepseek.com",
                "deepseek-chat",
                ProviderCapabilities {
                    model_discovery: false,
                    requires_credential: true,
                },
            ),
            ProviderKind::Ollama => (
                "http://localhost:11434/v1",
                "llama3.1",
                ProviderCapabilities::default(),
            ),
            ProviderKind::Mock => ("mock://", "mock", ProviderCapabilities::default()),
        };

        Self {
            name: kind.as_str().to_string(),
            base_url: base_url.to_string(),
            credential: None,
            default_model: default_model.to_string(),
            capabilities,
        }
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pins the model. A pinned model switches discovery off.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self.capabilities.model_discovery = false;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.credential.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown summarization provider '{0}'")]
    UnknownProvider(String),
    #[error("missing credential for provider '{0}'")]
    MissingCredential(String),
    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),
    #[error("quota exhausted (HTTP 429)")]
    Quota,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend error (HTTP {status}): {body}")]
    Backend { status: u16, body: String },
    #[error("backend returned an empty response")]
    EmptyResponse,
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Uniform capability interface every summarization backend implements.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn spec(&self) -> &ProviderSpec;

    /// Chooses the model for this run. Providers without discovery use
    /// their configured default.
    async fn select_model(&self) -> String {
        self.spec().default_model.clone()
    }

    /// One attempt, no retry.
    async fn generate(&self, prompt: &str, model: &str) -> ProviderResult<String>;
}

/// Maps a non-success HTTP response onto the typed provider errors.
pub(crate) async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 | 403 => Err(ProviderError::Auth(status.as_u16())),
        429 => Err(ProviderError::Quota),
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Backend {
                status: code,
                body: crate::utils::text::truncate_chars(&body, 300),
            })
        }
    }
}

/// Registry of summarization providers, keyed by provider name
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SummaryProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registers every built-in provider. Credentials are attached to their
    /// provider; model and endpoint overrides apply only to the selected one.
    pub fn from_config(config: &SummarizerConfig, http_timeout: Duration) -> Self {
        let mut registry = Self::new();

        for kind in ProviderKind::ALL {
            let credential = match kind {
                ProviderKind::Gemini => config.gemini_api_key.clone(),
                ProviderKind::OpenAi => config.openai_api_key.clone(),
                ProviderKind::DeepSeek => config.deepseek_api_key.clone(),
                ProviderKind::Ollama | ProviderKind::Mock => None,
            };
            let mut spec = ProviderSpec::builtin(kind).with_credential(credential);
            if kind == config.provider {
                if let Some(model) = &config.model {
                    spec = spec.with_model(model.clone());
                }
                if let Some(base_url) = &config.base_url {
                    spec = spec.with_base_url(base_url.clone());
                }
            }

            let provider: Arc<dyn SummaryProvider> = match kind {
                ProviderKind::Gemini => Arc::new(GeminiProvider::new(spec, http_timeout)),
                ProviderKind::OpenAi | ProviderKind::DeepSeek | ProviderKind::Ollama => {
                    Arc::new(OpenAiCompatibleProvider::new(spec, http_timeout))
                }
                ProviderKind::Mock => Arc::new(MockProvider::with_spec(spec)),
            };
            registry.register(provider);
        }

        registry
    }

    /// Register a provider under its spec name, replacing any previous entry
    pub fn register(&mut self, provider: Arc<dyn SummaryProvider>) {
        let name = provider.spec().name.clone();
        debug!("Registering summarization provider: {}", name);
        self.providers.insert(name, provider);
    }

    pub fn get(&self, name: &str) -> ProviderResult<Arc<dyn SummaryProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    /// Sorted provider names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a batch of candidate items into one digest through the configured
/// provider. Never fails: every problem becomes `DigestResult::Unavailable`.
pub struct Summarizer {
    registry: ProviderRegistry,
    provider: String,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(registry: ProviderRegistry, provider: impl Into<String>, timeout: Duration) -> Self {
        Self {
            registry,
            provider: provider.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SummarizerConfig) -> Self {
        let registry = ProviderRegistry::from_config(config, config.timeout);
        Self::new(registry, config.provider.as_str(), config.timeout)
    }

    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    pub async fn summarize(&self, request: &DigestRequest) -> DigestResult {
        if request.is_empty() {
            debug!("No items to summarize, skipping provider call");
            return DigestResult::Skipped;
        }

        match self.try_summarize(request).await {
            Ok((text, model)) => {
                info!(
                    "Digest generated by {} ({}): {} characters",
                    self.provider,
                    model,
                    text.chars().count()
                );
                DigestResult::Digest {
                    text,
                    provider: self.provider.clone(),
                    model,
                }
            }
            Err(e) => {
                error!("Summarization via {} failed: {}", self.provider, e);
                DigestResult::Unavailable { reason: e.to_string() }
            }
        }
    }

    async fn try_summarize(&self, request: &DigestRequest) -> ProviderResult<(String, String)> {
        let provider = self.registry.get(&self.provider)?;
        let spec = provider.spec();
        if spec.capabilities.requires_credential && !spec.has_credential() {
            return Err(ProviderError::MissingCredential(spec.name.clone()));
        }

        let model = match tokio::time::timeout(self.timeout, provider.select_model()).await {
            Ok(model) => model,
            Err(_) => {
                warn!("Model selection timed out, using {}", spec.default_model);
                spec.default_model.clone()
            }
        };

        let prompt = digest::build_prompt(request);
        info!(
            "Requesting digest of {} items from {} using model {}",
            request.items.len(),
            spec.name,
            model
        );

        let text = tokio::time::timeout(self.timeout, provider.generate(&prompt, &model))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok((text.to_string(), model))
    }
}
