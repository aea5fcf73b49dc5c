pub mod types;
pub mod config;
pub mod utils;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod history;
pub mod digest;
pub mod llm_adapter;
pub mod providers;
pub mod markup;
pub mod channels;
pub mod delivery;
pub mod pipeline;

pub use types::*;
pub use config::{ConfigError, RelayConfig};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use history::HistoryStore;
pub use llm_adapter::{ProviderKind, ProviderRegistry, Summarizer};
pub use delivery::{ContentKind, DeliveryEngine, DeliveryReport};
pub use pipeline::{Pipeline, RunReport, RunStage, RunStatus};
