use super::ChannelError;
use crate::config::EmailConfig;
use crate::traits::DeliveryChannel;
use crate::types::{MarkupDialect, Result};
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

const IMPLICIT_TLS_PORT: u16 = 465;

/// SMTP delivery. Each chunk becomes one message; rich chunks are sent as HTML.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    max_length: usize,
    delivered: AtomicUsize,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let from = parse_mailbox(&config.from)?;
        let to = parse_mailbox(&config.to)?;

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| ChannelError::Smtp(e.to_string()))?;

        let mut builder = builder.port(config.smtp_port).timeout(Some(config.timeout));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            max_length: config.max_length,
            delivered: AtomicUsize::new(0),
        })
    }
}

fn parse_mailbox(raw: &str) -> std::result::Result<Mailbox, ChannelError> {
    raw.parse::<Mailbox>()
        .map_err(|e| ChannelError::Message(format!("invalid address '{}': {}", raw, e)))
}

/// Subject carries the date and, after the first message of a run, the part number.
pub fn subject_for(part: usize) -> String {
    let date = Utc::now().date_naive().format("%Y-%m-%d");
    if part > 1 {
        format!("Feed digest {} (part {})", date, part)
    } else {
        format!("Feed digest {}", date)
    }
}

pub fn build_message(
    from: &Mailbox,
    to: &Mailbox,
    subject: &str,
    text: &str,
    markup: bool,
) -> std::result::Result<Message, ChannelError> {
    let (content_type, body) = if markup {
        (ContentType::TEXT_HTML, format!("<html><body>{}</body></html>", text))
    } else {
        (ContentType::TEXT_PLAIN, text.to_string())
    };

    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject)
        .header(content_type)
        .body(body)
        .map_err(|e| ChannelError::Message(e.to_string()))
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    fn dialect(&self) -> MarkupDialect {
        MarkupDialect::Html
    }

    async fn send(&self, text: &str, markup: bool) -> std::result::Result<(), ChannelError> {
        let part = self.delivered.load(Ordering::SeqCst) + 1;
        let message = build_message(&self.from, &self.to, &subject_for(part), text, markup)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ChannelError::Smtp(e.to_string()))?;

        self.delivered.fetch_add(1, Ordering::SeqCst);
        debug!("Email part {} sent to {}", part, self.to);
        Ok(())
    }
}
