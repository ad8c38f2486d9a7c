//! Harvest coordinator - top-level orchestration
//!
//! This module ties the pieces together for one harvest run:
//! - Probing the session and refreshing it when it is not logged in
//! - Recording the run with the configuration hash
//! - Fanning creators and keywords out as independent work units
//! - Isolating unit failures so one broken creator never stops the rest
//! - Recording the run outcome

use crate::config::{Config, CreatorEntry};
use crate::crawler::client::PlatformClient;
use crate::crawler::creator::crawl_creator;
use crate::crawler::keyword::crawl_keyword;
use crate::crawler::pipeline::{CrawlContext, CrawlOptions, CrawlReport};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::retry::{Retrier, RetryPolicy};
use crate::model::CreatorProfile;
use crate::notify::{build_notifier, Notifier};
use crate::storage::{RunStats, RunStatus, SqliteStore, Store};
use crate::{HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One independent piece of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    Creator(CreatorEntry),
    Keyword(String),
}

impl WorkUnit {
    fn label(&self) -> String {
        match self {
            Self::Creator(entry) => format!("creator {}", entry.id),
            Self::Keyword(keyword) => format!("keyword {:?}", keyword),
        }
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub run_id: i64,
    pub units_ok: usize,
    pub units_failed: usize,
    pub notes_stored: usize,
    pub comments_stored: usize,
    pub cancelled: bool,
}

impl HarvestSummary {
    fn absorb(&mut self, outcome: Result<CrawlReport>) {
        match outcome {
            Ok(report) => {
                self.units_ok += 1;
                self.notes_stored += report.notes_stored;
                self.comments_stored += report.comments_stored;
                self.cancelled |= report.interrupted();
            }
            Err(HarvestError::Cancelled) => self.cancelled = true,
            Err(_) => self.units_failed += 1,
        }
    }

    fn status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Interrupted
        } else if self.units_ok == 0 && self.units_failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    fn stats(&self) -> RunStats {
        RunStats {
            notes_stored: self.notes_stored as u64,
            comments_stored: self.comments_stored as u64,
            units_failed: self.units_failed as u64,
        }
    }
}

/// Main harvest coordinator
pub struct Harvester {
    config: Arc<Config>,
    ctx: CrawlContext,
    cancel: CancellationToken,
    config_hash: String,
}

impl Harvester {
    /// Assembles a harvester from already-built collaborators
    pub fn new(
        config: Config,
        client: PlatformClient,
        store: Arc<dyn Store>,
        cancel: CancellationToken,
    ) -> Self {
        let ctx = CrawlContext {
            client,
            store,
            limiter: RateLimiter::from_config(&config.crawler, cancel.clone()),
            options: CrawlOptions::from_config(&config.crawler),
        };

        Self {
            config: Arc::new(config),
            ctx,
            cancel,
            config_hash: String::new(),
        }
    }

    /// Builds the SQLite store, notifier and client described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash recorded with the run
    /// * `cancel` - Token cancelled on shutdown
    pub fn from_config(config: Config, config_hash: &str, cancel: CancellationToken) -> Result<Self> {
        let store = SqliteStore::new(
            Path::new(&config.output.database_path),
            Path::new(&config.output.media_dir),
        )?;

        let notifier: Arc<dyn Notifier> = build_notifier(&config.notification);
        let retrier = Retrier::new(RetryPolicy::from_config(&config.retry), notifier, cancel.clone());
        let client = PlatformClient::from_config(&config.platform, retrier)?;

        Ok(Self::new(config, client, Arc::new(store), cancel).with_config_hash(config_hash))
    }

    pub fn with_config_hash(mut self, config_hash: &str) -> Self {
        self.config_hash = config_hash.to_string();
        self
    }

    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    pub fn client(&self) -> &PlatformClient {
        &self.ctx.client
    }

    /// Work units in configuration order: creators first, then keywords
    pub fn work_units(&self) -> Vec<WorkUnit> {
        self.config
            .creators
            .iter()
            .cloned()
            .map(WorkUnit::Creator)
            .chain(
                self.config
                    .search
                    .keywords
                    .iter()
                    .cloned()
                    .map(WorkUnit::Keyword),
            )
            .collect()
    }

    /// Runs every work unit once
    ///
    /// Unit failures are logged and counted; only store failures while
    /// recording the run itself are returned as errors.
    pub async fn run(&self) -> Result<HarvestSummary> {
        if !self.ctx.client.probe().await {
            tracing::warn!("Session is not logged in, refreshing cookies");
            if let Err(e) = self.ctx.client.refresh_session().await {
                tracing::error!("Cookie refresh failed: {}", e);
            }
        }

        let run_id = self.ctx.store.begin_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {}", run_id);

        let units = self.work_units();
        let concurrency = self.config.crawler.max_concurrent_tasks.max(1);
        tracing::info!(
            "{} work units, up to {} at a time",
            units.len(),
            concurrency
        );

        let outcomes: Vec<Result<CrawlReport>> = stream::iter(units)
            .map(|unit| self.run_unit(unit))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = HarvestSummary {
            run_id,
            ..HarvestSummary::default()
        };
        for outcome in outcomes {
            summary.absorb(outcome);
        }

        self.ctx
            .store
            .finish_run(run_id, summary.status(), &summary.stats())?;

        tracing::info!(
            "Run {} finished ({:?}): {} notes, {} comments, {} units ok, {} failed",
            run_id,
            summary.status(),
            summary.notes_stored,
            summary.comments_stored,
            summary.units_ok,
            summary.units_failed
        );
        Ok(summary)
    }

    async fn run_unit(&self, unit: WorkUnit) -> Result<CrawlReport> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let label = unit.label();
        let outcome = match unit {
            WorkUnit::Creator(entry) => self.harvest_creator(&entry).await,
            WorkUnit::Keyword(keyword) => {
                crawl_keyword(
                    &self.ctx,
                    &keyword,
                    self.config.search.search_type,
                    self.config.search.max_pages,
                )
                .await
            }
        };

        match &outcome {
            Err(e) if e.is_cancelled() => tracing::info!("{} cancelled", label),
            Err(e) => tracing::error!("{} failed: {}", label, e),
            Ok(_) => {}
        }
        outcome
    }

    /// Refreshes a creator's profile, resolves its timeline container and
    /// harvests the timeline
    pub async fn harvest_creator(&self, entry: &CreatorEntry) -> Result<CrawlReport> {
        match self.ctx.client.get_creator_info(&entry.id).await {
            Ok(data) => match CreatorProfile::from_container(&data) {
                Some(profile) => {
                    self.ctx.store.upsert_creator(&profile)?;
                    tracing::info!("Creator {} is {}", profile.id, profile.nickname);
                }
                None => tracing::warn!("No profile card for creator {}", entry.id),
            },
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => tracing::warn!("Profile of creator {} unavailable: {}", entry.id, e),
        }

        let container_id = match &entry.container_id {
            Some(id) => id.clone(),
            None => self
                .ctx
                .client
                .get_creator_container_ids(&entry.id)
                .await?
                .lfid
                .ok_or_else(|| HarvestError::MissingContainer {
                    creator_id: entry.id.clone(),
                })?,
        };

        crawl_creator(&self.ctx, &entry.id, &container_id).await
    }
}
