//! Any backend speaking the OpenAI chat-completions protocol (OpenAI itself,
//! DeepSeek, a local Ollama).

use crate::llm_adapter::{check_status, ProviderError, ProviderResult, ProviderSpec, SummaryProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiCompatibleProvider {
    client: Client,
    spec: ProviderSpec,
}

impl OpenAiCompatibleProvider {
    pub fn new(spec: ProviderSpec, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, spec }
    }
}

#[async_trait]
impl SummaryProvider for OpenAiCompatibleProvider {
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    async fn generate(&self, prompt: &str, model: &str) -> ProviderResult<String> {
        let url = format!("{}/chat/completions", self.spec.base_url);
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "n": 1
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.spec.credential.as_deref() {
            request = request.bearer_auth(key);
        }

        let parsed: ChatCompletionResponse = check_status(request.send().await?)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::ProviderKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, kind: ProviderKind, key: Option<&str>) -> OpenAiCompatibleProvider {
        let spec = ProviderSpec::builtin(kind)
            .with_credential(key.map(str::to_string))
            .with_base_url(server.uri());
        OpenAiCompatibleProvider::new(spec, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn sends_bearer_token_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Digest body" } }]
            })))
            .mount(&server)
            .await;

        let deepseek = provider(&server, ProviderKind::DeepSeek, Some("sk-test"));
        assert_eq!(deepseek.select_model().await, "deepseek-chat");
        assert_eq!(deepseek.generate("p", "deepseek-chat").await.unwrap(), "Digest body");
    }

    #[tokio::test]
    async fn empty_choices_are_an_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let ollama = provider(&server, ProviderKind::Ollama, None);
        assert!(matches!(ollama.generate("p", "llama3.1").await, Err(ProviderError::EmptyResponse)));
    }

    #[tokio::test]
    async fn unauthorized_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let openai = provider(&server, ProviderKind::OpenAi, Some("bad"));
        assert!(matches!(openai.generate("p", "gpt-4o-mini").await, Err(ProviderError::Auth(401))));
    }

    #[tokio::test]
    async fn other_failures_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let openai = provider(&server, ProviderKind::OpenAi, Some("k"));
        match openai.generate("p", "gpt-4o-mini").await {
            Err(ProviderError::Backend { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
