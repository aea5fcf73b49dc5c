//! Google Gemini over the Generative Language REST API.
//!
//! This is the one provider with model discovery: before generating it lists
//! the models the key can use and picks the best text-generation model.

use crate::llm_adapter::{check_status, ProviderError, ProviderResult, ProviderSpec, SummaryProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const GENERATE_METHOD: &str = "generateContent";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A model as listed by the backend, tagged with what it can do.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn new(name: &str, methods: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// The name without the `models/` resource prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn can_generate_text(&self) -> bool {
        self.supported_generation_methods.iter().any(|m| m == GENERATE_METHOD)
    }

    /// Lower is better: fast/lightweight, then general-purpose, then the rest.
    fn tier(&self) -> u8 {
        let id = self.id();
        if id.contains("flash") || id.contains("lite") {
            0
        } else if id.contains("pro") {
            1
        } else {
            2
        }
    }
}

/// Picks the best text-capable model. Ties keep the backend's listing order.
pub fn pick_model(models: &[ModelInfo]) -> Option<String> {
    models
        .iter()
        .filter(|m| m.can_generate_text())
        .min_by_key(|m| m.tier())
        .map(|m| m.id().to_string())
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

pub struct GeminiProvider {
    client: Client,
    spec: ProviderSpec,
}

impl GeminiProvider {
    pub fn new(spec: ProviderSpec, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, spec }
    }

    fn api_key(&self) -> ProviderResult<&str> {
        self.spec
            .credential
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(self.spec.name.clone()))
    }

    /// Models available to this key.
    pub async fn list_models(&self) -> ProviderResult<Vec<ModelInfo>> {
        let url = format!("{}/v1beta/models", self.spec.base_url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key()?)
            .query(&[("pageSize", "200")])
            .send()
            .await?;
        let listing: ListModelsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        debug!("Gemini listed {} models", listing.models.len());
        Ok(listing.models)
    }
}

#[async_trait]
impl SummaryProvider for GeminiProvider {
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    async fn select_model(&self) -> String {
        let fallback = self.spec.default_model.clone();
        if !self.spec.capabilities.model_discovery {
            return fallback;
        }

        match self.list_models().await {
            Ok(models) => match pick_model(&models) {
                Some(model) => {
                    info!("Selected Gemini model {} from {} listed", model, models.len());
                    model
                }
                None => {
                    warn!("No listed Gemini model supports {}, using {}", GENERATE_METHOD, fallback);
                    fallback
                }
            },
            Err(e) => {
                warn!("Gemini model discovery failed ({}), using {}", e, fallback);
                fallback
            }
        }
    }

    async fn generate(&self, prompt: &str, model: &str) -> ProviderResult<String> {
        let url = format!("{}/v1beta/models/{}:{}", self.spec.base_url, model, GENERATE_METHOD);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key()?)
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::ProviderKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        let spec = ProviderSpec::builtin(ProviderKind::Gemini)
            .with_credential(Some("test-key".to_string()))
            .with_base_url(server.uri());
        GeminiProvider::new(spec, Duration::from_secs(5))
    }

    #[test]
    fn fast_models_outrank_general_purpose_ones() {
        let models = vec![
            ModelInfo::new("models/embedding-001", &["embedContent"]),
            ModelInfo::new("models/gemini-1.0-ultra", &[GENERATE_METHOD]),
            ModelInfo::new("models/gemini-1.5-pro", &[GENERATE_METHOD]),
            ModelInfo::new("models/gemini-2.0-flash", &[GENERATE_METHOD, "countTokens"]),
            ModelInfo::new("models/gemini-1.5-flash", &[GENERATE_METHOD]),
        ];
        assert_eq!(pick_model(&models).as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn general_purpose_outranks_other_capable_models() {
        let models = vec![
            ModelInfo::new("models/gemini-1.0-ultra", &[GENERATE_METHOD]),
            ModelInfo::new("models/gemini-1.5-pro", &[GENERATE_METHOD]),
        ];
        assert_eq!(pick_model(&models).as_deref(), Some("gemini-1.5-pro"));

        let others = vec![ModelInfo::new("models/gemma-7b", &[GENERATE_METHOD])];
        assert_eq!(pick_model(&others).as_deref(), Some("gemma-7b"));
    }

    #[test]
    fn incapable_models_are_never_picked() {
        let models = vec![ModelInfo::new("models/gemini-flash-embed", &["embedContent"])];
        assert_eq!(pick_model(&models), None);
        assert_eq!(pick_model(&[]), None);
    }

    #[tokio::test]
    async fn discovery_picks_from_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "models/gemini-1.5-pro", "supportedGenerationMethods": ["generateContent"] },
                    { "name": "models/gemini-1.5-flash-8b", "supportedGenerationMethods": ["generateContent"] }
                ]
            })))
            .mount(&server)
            .await;

        assert_eq!(provider(&server).select_model().await, "gemini-1.5-flash-8b");
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_to_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert_eq!(provider(&server).select_model().await, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn empty_listing_falls_back_to_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
            .mount(&server)
            .await;

        assert_eq!(provider(&server).select_model().await, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn generate_joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Part one. " }, { "text": "Part two." }] } }]
            })))
            .mount(&server)
            .await;

        let text = provider(&server).generate("prompt", "gemini-1.5-flash").await.unwrap();
        assert_eq!(text, "Part one. Part two.");
    }

    #[tokio::test]
    async fn quota_and_auth_errors_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/quota:generateContent"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/auth:generateContent"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let gemini = provider(&server);
        assert!(matches!(gemini.generate("p", "quota").await, Err(ProviderError::Quota)));
        assert!(matches!(gemini.generate("p", "auth").await, Err(ProviderError::Auth(403))));
    }

    #[tokio::test]
    async fn no_candidates_is_an_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let result = provider(&server).generate("p", "gemini-1.5-flash").await;
        assert!(matches!(result, Err(ProviderError::EmptyResponse)));
    }
}
