//! One end-to-end run: fetch, project every category, flush the summary.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vitalnote_config::AppConfig;
use vitalnote_sensor::{Category, FetchOutcome, SensorSnapshot, SensorSource};
use vitalnote_vault::Vault;

use crate::context::{RunContext, RunStats};
use crate::notify::{Notice, Notifier};
use crate::projector::Projector;
use crate::summary::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The sensor reported nothing new.
    NoData,
    /// The fetch failed; nothing was written.
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Categories that carried a collection, in projection order.
    pub categories: Vec<Category>,
    pub stats: RunStats,
    pub summary: RunSummary,
}

impl RunReport {
    fn empty(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            categories: Vec::new(),
            stats: RunStats::default(),
            summary: RunSummary::default(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

pub struct SyncEngine {
    config: AppConfig,
    source: Arc<dyn SensorSource>,
    vault: Vault,
    notifier: Arc<dyn Notifier>,
}

impl SyncEngine {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn SensorSource>,
        vault: Vault,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            source,
            vault,
            notifier,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fetch the snapshot and project it.  Never returns an error: failures
    /// surface through the notifier and the report.
    pub async fn run(&self) -> RunReport {
        debug!("sync run starting");
        match self.source.fetch().await {
            Ok(FetchOutcome::Snapshot(snapshot)) => self.project(&snapshot).await,
            Ok(FetchOutcome::NoData) => {
                self.notifier
                    .notify(Notice::Info("No new health data to sync.".to_string()));
                RunReport::empty(RunOutcome::NoData)
            }
            Err(err) => {
                warn!(?err, "sensor fetch failed; run aborted");
                self.notifier
                    .notify(Notice::Error(format!("Health sync failed: {err}")));
                RunReport::empty(RunOutcome::FetchFailed(err.to_string()))
            }
        }
    }

    /// Project an already fetched snapshot.
    pub async fn project(&self, snapshot: &SensorSnapshot) -> RunReport {
        let mut ctx = RunContext::new(&self.vault, &self.config);
        let mut categories = Vec::new();

        for category in Category::ALL {
            let Some(collection) = snapshot.collection(category) else {
                debug!(%category, "no data for category; skipping");
                continue;
            };
            category.project(collection, &mut ctx).await;
            categories.push(category);
        }

        let (stats, summary) = ctx.flush_summary(&self.config.sections.summary).await;

        let report = RunReport {
            outcome: RunOutcome::Completed,
            categories,
            stats,
            summary,
        };
        info!(
            categories = report.categories.len(),
            updated = report.stats.dates_updated.len(),
            skipped = report.stats.dates_skipped.len(),
            failed = report.stats.dates_failed.len(),
            fields = report.stats.fields_written,
            sections = report.stats.sections_rewritten,
            "sync run complete"
        );
        self.notifier.notify(completion_notice(&report.stats));
        report
    }
}

fn completion_notice(stats: &RunStats) -> Notice {
    let updated = stats.dates_updated.len();
    if stats.dates_failed.is_empty() {
        Notice::Info(format!("Health data synced: {updated} note(s) updated."))
    } else {
        let failed: Vec<&str> = stats.dates_failed.iter().map(String::as_str).collect();
        Notice::Error(format!(
            "Health data synced with errors: {updated} note(s) updated, failed for {}.",
            failed.join(", ")
        ))
    }
}
