//! Manual and scheduled triggers sharing a single in-flight guard.
//!
//! A trigger that fires while a run is still active is skipped rather than
//! queued; the next trigger picks up whatever the sensor holds by then.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{RunReport, SyncEngine};

pub struct SyncRunner {
    engine: SyncEngine,
    running: AtomicBool,
}

/// Clears the in-flight flag when the run ends, including on panic.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncRunner {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            running: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run now unless a run is already in flight, in which case `None`.
    pub async fn try_run(&self) -> Option<RunReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("sync already in progress; trigger skipped");
            return None;
        }
        let _guard = RunGuard(&self.running);
        Some(self.engine.run().await)
    }
}

/// Spawn the recurring trigger.  The first tick fires one `interval` after
/// spawning; the loop ends when `true` is sent on the shutdown channel or the
/// sender is dropped.
pub fn spawn_sync_task(
    runner: Arc<SyncRunner>,
    shutdown_tx: &watch::Sender<bool>,
    interval: Duration,
) -> JoinHandle<()> {
    let mut rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "scheduled sync enabled");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Some(report) = runner.try_run().await {
                        debug!(outcome = ?report.outcome, "scheduled sync finished");
                    }
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduled sync stopped");
    })
}
