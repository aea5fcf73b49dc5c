use super::ChannelError;
use crate::config::TelegramConfig;
use crate::traits::DeliveryChannel;
use crate::types::{MarkupDialect, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`. Rich messages use legacy Markdown.
pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.config.api_base, self.config.bot_token)
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn max_length(&self) -> usize {
        self.config.max_length
    }

    fn dialect(&self) -> MarkupDialect {
        MarkupDialect::Markdown
    }

    async fn send(&self, text: &str, markup: bool) -> std::result::Result<(), ChannelError> {
        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: markup.then_some("Markdown"),
            disable_web_page_preview: true,
        };

        // The endpoint embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChannelError::Http(e.without_url()))?;
        let parsed: Option<BotApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(reply) if status.is_success() && reply.ok => {
                debug!("Telegram accepted {} chars (markup: {})", text.chars().count(), markup);
                Ok(())
            }
            Some(reply) => Err(ChannelError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                reply.description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(ChannelError::Rejected(format!(
                "HTTP {}: unreadable response {}",
                status.as_u16(),
                crate::utils::text::truncate_chars(&body, 200)
            ))),
        }
    }
}
