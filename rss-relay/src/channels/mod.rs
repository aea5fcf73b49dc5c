pub mod email;
pub mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;

/// Why a single message could not be sent.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Rejected by channel: {0}")]
    Rejected(String),
    /// Built with the request URL stripped, since channel URLs can carry credentials.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Cannot build message: {0}")]
    Message(String),
}
