//! Run configuration.
//!
//! Everything is read from the environment once at startup (a `.env` file is
//! honoured outside tests) and then handed to each component by value. No
//! component reads the environment on its own.

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::llm_adapter::ProviderKind;
use crate::types::{FetchConfig, SourceSpec};
use crate::utils;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Unknown summarization provider '{0}'")]
    UnknownProvider(String),
    #[error("Cannot read sources file {path}: {reason}")]
    SourcesFile { path: PathBuf, reason: String },
    #[error("No feed sources configured")]
    NoSources,
    #[error("No delivery channel configured (set TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID or SMTP_HOST/EMAIL_FROM/EMAIL_TO)")]
    NoChannels,
}

#[derive(Clone, Debug)]
pub struct SummarizerConfig {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub timeout: Duration,
    pub language: String,
    pub topic: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: None,
            base_url: None,
            gemini_api_key: None,
            openai_api_key: None,
            deepseek_api_key: None,
            timeout: Duration::from_secs(60),
            language: "en".to_string(),
            topic: "latest publications".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
    pub max_length: usize,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: "https://api.telegram.org".to_string(),
            max_length: 4000,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
    pub max_length: usize,
    pub timeout: Duration,
}

/// Holds all configuration for one run.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub sources_file: PathBuf,
    pub sources: Vec<SourceSpec>,
    pub fetch: FetchConfig,
    pub source_delay: Duration,
    pub history_path: PathBuf,
    pub history_capacity: usize,
    pub summarizer: SummarizerConfig,
    pub fallback_max_items: usize,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub dry_run: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sources_file: PathBuf::from("sources.json"),
            sources: Vec::new(),
            fetch: FetchConfig::default(),
            source_delay: Duration::from_millis(1000),
            history_path: PathBuf::from("history.json"),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            summarizer: SummarizerConfig::default(),
            fallback_max_items: 10,
            telegram: None,
            email: None,
            dry_run: false,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let provider = match get("RELAY_PROVIDER") {
            Some(name) => ProviderKind::from_str(&name)?,
            None => defaults.summarizer.provider,
        };

        let summarizer = SummarizerConfig {
            provider,
            model: get("RELAY_MODEL"),
            base_url: get("RELAY_PROVIDER_BASE_URL"),
            gemini_api_key: get("GEMINI_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
            timeout: Duration::from_secs(parse_or(
                &get,
                "RELAY_SUMMARY_TIMEOUT_SECS",
                defaults.summarizer.timeout.as_secs(),
            )?),
            language: get("RELAY_DIGEST_LANGUAGE").unwrap_or(defaults.summarizer.language),
            topic: get("RELAY_DIGEST_TOPIC").unwrap_or(defaults.summarizer.topic),
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => {
                let mut telegram = TelegramConfig::new(token, chat_id);
                if let Some(api_base) = get("TELEGRAM_API_BASE") {
                    telegram.api_base = api_base.trim_end_matches('/').to_string();
                }
                telegram.max_length = parse_or(&get, "TELEGRAM_MAX_LENGTH", telegram.max_length)?;
                Some(telegram)
            }
            (Some(_), None) => return Err(ConfigError::MissingVar("TELEGRAM_CHAT_ID".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string())),
            (None, None) => None,
        };

        let email = match get("SMTP_HOST") {
            Some(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: get("EMAIL_FROM").ok_or_else(|| ConfigError::MissingVar("EMAIL_FROM".to_string()))?,
                to: get("EMAIL_TO").ok_or_else(|| ConfigError::MissingVar("EMAIL_TO".to_string()))?,
                max_length: parse_or(&get, "EMAIL_MAX_LENGTH", 100_000)?,
                timeout: Duration::from_secs(30),
            }),
            None => None,
        };

        Ok(Self {
            sources_file: get("RELAY_SOURCES_FILE").map(PathBuf::from).unwrap_or(defaults.sources_file),
            sources: Vec::new(),
            fetch: defaults.fetch,
            source_delay: Duration::from_millis(parse_or(
                &get,
                "RELAY_SOURCE_DELAY_MS",
                defaults.source_delay.as_millis() as u64,
            )?),
            history_path: get("RELAY_HISTORY_FILE").map(PathBuf::from).unwrap_or(defaults.history_path),
            history_capacity: parse_or(&get, "RELAY_HISTORY_CAPACITY", defaults.history_capacity)?,
            summarizer,
            fallback_max_items: parse_or(&get, "RELAY_FALLBACK_MAX_ITEMS", defaults.fallback_max_items)?,
            telegram,
            email,
            dry_run: false,
        })
    }

    /// Checks everything that must hold before any source is contacted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            if !utils::url::is_valid_feed_url(&source.url) {
                return Err(ConfigError::InvalidValue(
                    format!("source '{}'", source.name),
                    format!("'{}' is not an http(s) URL", source.url),
                ));
            }
        }
        if !self.dry_run && self.telegram.is_none() && self.email.is_none() {
            return Err(ConfigError::NoChannels);
        }
        if self.history_capacity == 0 {
            return Err(invalid("RELAY_HISTORY_CAPACITY", "must be greater than zero"));
        }
        if self.fallback_max_items == 0 {
            return Err(invalid("RELAY_FALLBACK_MAX_ITEMS", "must be greater than zero"));
        }
        if matches!(&self.telegram, Some(t) if t.max_length == 0) {
            return Err(invalid("TELEGRAM_MAX_LENGTH", "must be greater than zero"));
        }
        if matches!(&self.email, Some(e) if e.max_length == 0) {
            return Err(invalid("EMAIL_MAX_LENGTH", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", raw, e))),
        None => Ok(default),
    }
}

/// Reads a JSON array of `{ "name": ..., "url": ... }` objects.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceSpec>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::SourcesFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.summarizer.provider, ProviderKind::Gemini);
        assert_eq!(config.fallback_max_items, 10);
        assert!(config.telegram.is_none());
        assert!(config.email.is_none());
    }

    #[test]
    fn telegram_requires_both_token_and_chat() {
        let err = RelayConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "TELEGRAM_CHAT_ID"));

        let config = RelayConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "42"),
            ("TELEGRAM_MAX_LENGTH", "1000"),
        ]))
        .unwrap();
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.chat_id, "42");
        assert_eq!(telegram.max_length, 1000);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[("RELAY_PROVIDER", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "nope"));
    }

    #[test]
    fn invalid_numbers_are_reported_with_their_key() {
        let err = RelayConfig::from_lookup(lookup(&[("RELAY_HISTORY_CAPACITY", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "RELAY_HISTORY_CAPACITY"));
    }

    #[test]
    fn validate_requires_sources_and_channels() {
        let mut config = RelayConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoSources)));

        config.sources.push(SourceSpec {
            name: "PubMed".to_string(),
            url: "https://pubmed.example.org/rss".to_string(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::NoChannels)));

        config.dry_run = true;
        assert!(config.validate().is_ok());

        config.dry_run = false;
        config.telegram = Some(TelegramConfig::new("t", "c"));
        assert!(config.validate().is_ok());

        config.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_sources() {
        let mut config = RelayConfig::default();
        config.dry_run = true;
        config.sources.push(SourceSpec {
            name: "local".to_string(),
            url: "file:///etc/passwd".to_string(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_, _))));
    }

    #[test]
    fn sources_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(
            &path,
            r#"[{"name": "Trials", "url": "https://clinicaltrials.example.org/api/rss"}]"#,
        )
        .unwrap();

        let sources = load_sources_file(&path).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Trials");

        let missing = load_sources_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::SourcesFile { .. })));
    }
}
