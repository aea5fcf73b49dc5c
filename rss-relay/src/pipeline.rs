use crate::channels::{EmailChannel, TelegramChannel};
use crate::config::RelayConfig;
use crate::delivery::{ContentKind, DeliveryEngine, DeliveryReport};
use crate::digest;
use crate::history::HistoryStore;
use crate::llm_adapter::Summarizer;
use crate::sources::FeedCollector;
use crate::traits::{DeliveryChannel, SourceCollector};
use crate::types::{CandidateItem, DigestRequest, DigestResult, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Chunk length used to preview a dry run when no channel is configured.
const PREVIEW_MAX_LENGTH: usize = 4000;

/// States of a single run, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadHistory,
    Collect,
    FilterNew,
    Summarize,
    Deliver,
    UpdateHistory,
    PersistHistory,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::LoadHistory => "LOAD_HISTORY",
            RunStage::Collect => "COLLECT",
            RunStage::FilterNew => "FILTER_NEW",
            RunStage::Summarize => "SUMMARIZE",
            RunStage::Deliver => "DELIVER",
            RunStage::UpdateHistory => "UPDATE_HISTORY",
            RunStage::PersistHistory => "PERSIST_HISTORY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NothingNew,
    Delivered,
    DeliveryFailed,
    DryRun,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Stages entered, in order.
    pub stages: Vec<RunStage>,
    pub collected: usize,
    pub new_items: usize,
    pub digest: DigestResult,
    pub deliveries: Vec<DeliveryReport>,
    pub history_committed: bool,
    pub history_persisted: bool,
    pub dry_run: bool,
}

impl RunReport {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stages: Vec::new(),
            collected: 0,
            new_items: 0,
            digest: DigestResult::Skipped,
            deliveries: Vec::new(),
            history_committed: false,
            history_persisted: false,
            dry_run,
        }
    }

    fn enter(&mut self, stage: RunStage) {
        debug!("Entering {}", stage);
        self.stages.push(stage);
    }

    /// Last stage the run reached.
    pub fn terminal_stage(&self) -> Option<RunStage> {
        self.stages.last().copied()
    }

    pub fn delivered(&self) -> bool {
        !self.deliveries.is_empty() && self.deliveries.iter().all(DeliveryReport::is_success)
    }

    pub fn status(&self) -> RunStatus {
        if self.new_items == 0 {
            RunStatus::NothingNew
        } else if self.dry_run {
            RunStatus::DryRun
        } else if self.delivered() {
            RunStatus::Delivered
        } else {
            RunStatus::DeliveryFailed
        }
    }
}

/// Runs load history → collect → filter → summarize → deliver → update
/// history → persist, once, strictly in order.
pub struct Pipeline {
    collector: Box<dyn SourceCollector>,
    summarizer: Summarizer,
    channels: Vec<Box<dyn DeliveryChannel>>,
    engine: DeliveryEngine,
    history_path: PathBuf,
    history_capacity: usize,
    language: String,
    topic: String,
    fallback_max_items: usize,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(
        collector: Box<dyn SourceCollector>,
        summarizer: Summarizer,
        history_path: impl Into<PathBuf>,
        history_capacity: usize,
    ) -> Self {
        Self {
            collector,
            summarizer,
            channels: Vec::new(),
            engine: DeliveryEngine::new(),
            history_path: history_path.into(),
            history_capacity,
            language: "en".to_string(),
            topic: "latest publications".to_string(),
            fallback_max_items: 10,
            dry_run: false,
        }
    }

    /// Wires every collaborator from a validated configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let collector = FeedCollector::from_specs(&config.sources, config.fetch.clone(), config.source_delay)?;
        let summarizer = Summarizer::from_config(&config.summarizer);

        let mut pipeline = Self::new(
            Box::new(collector),
            summarizer,
            config.history_path.clone(),
            config.history_capacity,
        )
        .with_digest_settings(config.summarizer.language.clone(), config.summarizer.topic.clone())
        .with_fallback_max_items(config.fallback_max_items)
        .with_dry_run(config.dry_run);

        if let Some(telegram) = &config.telegram {
            pipeline.add_channel(Box::new(TelegramChannel::new(telegram.clone())?));
        }
        if let Some(email) = &config.email {
            pipeline.add_channel(Box::new(EmailChannel::new(email.clone())?));
        }
        Ok(pipeline)
    }

    pub fn with_channel(mut self, channel: Box<dyn DeliveryChannel>) -> Self {
        self.add_channel(channel);
        self
    }

    pub fn add_channel(&mut self, channel: Box<dyn DeliveryChannel>) {
        info!("Adding delivery channel: {}", channel.name());
        self.channels.push(channel);
    }

    pub fn with_digest_settings(mut self, language: impl Into<String>, topic: impl Into<String>) -> Self {
        self.language = language.into();
        self.topic = topic.into();
        self
    }

    pub fn with_fallback_max_items(mut self, max_items: usize) -> Self {
        self.fallback_max_items = max_items;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub async fn run(&mut self) -> RunReport {
        let report = RunReport::new(self.dry_run);
        let span = info_span!("run", run_id = %report.run_id);
        self.run_stages(report).instrument(span).await
    }

    async fn run_stages(&mut self, mut report: RunReport) -> RunReport {
        info!(
            "Starting run (provider: {}, channels: {}, dry run: {})",
            self.summarizer.provider_name(),
            self.channels.len(),
            self.dry_run
        );

        report.enter(RunStage::LoadHistory);
        let mut history = HistoryStore::load(&self.history_path, self.history_capacity).await;

        report.enter(RunStage::Collect);
        let candidates = self.collector.collect().await;
        report.collected = candidates.len();
        info!("Collected {} candidate items", candidates.len());

        report.enter(RunStage::FilterNew);
        let fresh = filter_new(candidates, &history);
        report.new_items = fresh.len();
        info!("{} new items after filtering against {} known", fresh.len(), history.len());

        if !fresh.is_empty() {
            report.enter(RunStage::Summarize);
            let request = DigestRequest::new(fresh, self.language.clone(), self.topic.clone());
            report.digest = self.summarizer.summarize(&request).await;

            report.enter(RunStage::Deliver);
            let (text, kind) = self.delivery_content(&report.digest, &request.items);
            if self.dry_run {
                self.preview(&text, kind);
            } else {
                for channel in &self.channels {
                    let delivery = self.engine.deliver(channel.as_ref(), &text, kind).await;
                    report.deliveries.push(delivery);
                }

                if report.delivered() {
                    report.enter(RunStage::UpdateHistory);
                    let added = history.record(request.items.iter().map(|item| item.id.as_str()));
                    report.history_committed = true;
                    info!("Committed {} identifiers to history", added);
                } else {
                    warn!("Delivery incomplete, history left unchanged so the items are retried next run");
                }
            }
        }

        if self.dry_run {
            info!("Dry run, history neither updated nor persisted");
        } else {
            report.enter(RunStage::PersistHistory);
            match history.persist().await {
                Ok(_) => report.history_persisted = true,
                Err(e) => error!("Failed to persist history to {}: {}", self.history_path.display(), e),
            }
        }

        info!(
            "Run finished: {:?} ({} collected, {} new, history committed: {}, persisted: {})",
            report.status(),
            report.collected,
            report.new_items,
            report.history_committed,
            report.history_persisted
        );
        report
    }

    fn delivery_content(&self, digest: &DigestResult, items: &[CandidateItem]) -> (String, ContentKind) {
        match digest {
            DigestResult::Digest { text, .. } => (text.clone(), ContentKind::Digest),
            DigestResult::Unavailable { reason } => {
                warn!("Summary unavailable ({}), sending plain listing instead", reason);
                let listing = digest::fallback_listing(items, Utc::now().date_naive(), reason, self.fallback_max_items);
                (listing, ContentKind::Fallback)
            }
            DigestResult::Skipped => {
                let listing = digest::fallback_listing(items, Utc::now().date_naive(), "", self.fallback_max_items);
                (listing, ContentKind::Fallback)
            }
        }
    }

    fn preview(&self, text: &str, kind: ContentKind) {
        let limits: Vec<(&str, usize)> = if self.channels.is_empty() {
            vec![("preview", PREVIEW_MAX_LENGTH)]
        } else {
            self.channels.iter().map(|c| (c.name(), c.max_length())).collect()
        };

        for (name, max_length) in limits {
            let chunks = self.engine.plan(text, kind, max_length);
            info!("[dry run] {} chunk(s) would be sent to {}", chunks.len(), name);
            for chunk in &chunks {
                info!("[dry run] {} chunk {}:\n{}", name, chunk.index + 1, chunk.text);
            }
        }
    }
}

/// Drops items without an id, items already in history and repeats within
/// the batch. First occurrence wins; order is preserved.
pub fn filter_new(candidates: Vec<CandidateItem>, history: &HistoryStore) -> Vec<CandidateItem> {
    let mut seen = HashSet::new();
    let mut skipped_without_id = 0;
    let fresh: Vec<CandidateItem> = candidates
        .into_iter()
        .filter(|item| {
            if !item.has_id() {
                skipped_without_id += 1;
                return false;
            }
            !history.contains(&item.id) && seen.insert(item.id.clone())
        })
        .collect();

    if skipped_without_id > 0 {
        warn!("Ignored {} items without an identifier", skipped_without_id);
    }
    fresh
}
