use anyhow::Context;
use clap::Parser;
use rss_relay::config::load_sources_file;
use rss_relay::{Pipeline, ProviderKind, RelayConfig, RunStatus};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Relays new feed items to notification channels as a daily digest.
#[derive(Parser, Debug)]
#[command(name = "rss-relay", version, about)]
struct Args {
    /// JSON file listing the feeds to poll
    #[arg(long)]
    sources: Option<PathBuf>,

    /// History file of already delivered identifiers
    #[arg(long)]
    history: Option<PathBuf>,

    /// Summarization provider (gemini, openai, deepseek, ollama, mock)
    #[arg(long)]
    provider: Option<String>,

    /// Log what would be sent instead of sending it; history is left untouched
    #[arg(long)]
    dry_run: bool,
}

fn load_config(args: Args) -> anyhow::Result<RelayConfig> {
    let mut config = RelayConfig::from_env().context("Invalid environment configuration")?;

    if let Some(sources) = args.sources {
        config.sources_file = sources;
    }
    if let Some(history) = args.history {
        config.history_path = history;
    }
    if let Some(provider) = args.provider {
        config.summarizer.provider = ProviderKind::from_str(&provider)?;
    }
    config.dry_run = args.dry_run;

    config.sources = load_sources_file(&config.sources_file)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return Err(e);
        }
    };

    info!(
        "Starting rss-relay: {} sources, provider {}, history {}",
        config.sources.len(),
        config.summarizer.provider,
        config.history_path.display()
    );

    let mut pipeline = Pipeline::from_config(&config).context("Failed to set up the pipeline")?;
    let report = pipeline.run().await;

    for delivery in &report.deliveries {
        info!(
            "Channel {}: {}/{} chunks sent",
            delivery.channel,
            delivery.sent_count(),
            delivery.chunks.len()
        );
    }

    match report.status() {
        RunStatus::DeliveryFailed => {
            error!("Run {} finished with delivery failures", report.run_id);
            std::process::exit(1);
        }
        status => info!("Run {} finished: {:?}", report.run_id, status),
    }
    Ok(())
}
