//! Per-run write context shared by every projector.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use vitalnote_config::AppConfig;
use vitalnote_vault::{Vault, WriteOutcome};

use crate::render::Clock;
use crate::summary::RunSummary;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fields_written: usize,
    pub sections_rewritten: usize,
    pub dates_updated: BTreeSet<String>,
    /// Dates whose note is missing while auto-creation is off.
    pub dates_skipped: BTreeSet<String>,
    /// Dates where a read, write or creation failed.
    pub dates_failed: BTreeSet<String>,
}

/// Owned by a single run.  Write failures are logged and counted here so one
/// date's error never stops the rest of the run.
pub struct RunContext<'a> {
    pub vault: &'a Vault,
    pub config: &'a AppConfig,
    pub clock: Clock,
    pub summary: RunSummary,
    pub stats: RunStats,
}

impl<'a> RunContext<'a> {
    pub fn new(vault: &'a Vault, config: &'a AppConfig) -> Self {
        Self {
            vault,
            config,
            clock: Clock::from_config(&config.sync),
            summary: RunSummary::default(),
            stats: RunStats::default(),
        }
    }

    /// Write one frontmatter field and record it in the run summary.
    pub async fn set_field(&mut self, date: &str, field: &str, value: &str) {
        match self.vault.set_field(date, field, value).await {
            Ok(outcome) if outcome.applied() => {
                self.summary.record(date, field, value);
                self.stats.fields_written += 1;
                if outcome == WriteOutcome::Updated {
                    self.stats.dates_updated.insert(date.to_string());
                }
            }
            Ok(WriteOutcome::NoDocument) => {
                self.stats.dates_skipped.insert(date.to_string());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(date, field, ?err, "metadata write failed");
                self.stats.dates_failed.insert(date.to_string());
            }
        }
    }

    /// Regenerate one section body.  `table_folder` targets the companion
    /// table note.
    pub async fn rewrite_section(
        &mut self,
        date: &str,
        heading: &str,
        body: &str,
        table_folder: Option<&str>,
    ) {
        match self
            .vault
            .rewrite_section(date, heading, body, table_folder)
            .await
        {
            Ok(outcome) if outcome.applied() => {
                self.stats.sections_rewritten += 1;
                if outcome == WriteOutcome::Updated {
                    self.stats.dates_updated.insert(date.to_string());
                }
            }
            Ok(WriteOutcome::NoDocument) => {
                self.stats.dates_skipped.insert(date.to_string());
            }
            Ok(WriteOutcome::NoSection) => {
                debug!(date, heading, "section not present; nothing rewritten");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(date, heading, ?err, "section rewrite failed");
                self.stats.dates_failed.insert(date.to_string());
            }
        }
    }

    /// End the run: flush the summary under `heading` and hand back the
    /// statistics together with the summary that was flushed.
    pub async fn flush_summary(mut self, heading: &str) -> (RunStats, RunSummary) {
        let summary = std::mem::take(&mut self.summary);
        summary.flush(&mut self, heading).await;
        (self.stats, summary)
    }
}
