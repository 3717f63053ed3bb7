//! Long-running mode: scheduled syncs plus manual triggers from stdin.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use vitalnote_sync::{SyncEngine, SyncRunner, spawn_sync_task};

use crate::print_report;

pub(crate) async fn run_watch(engine: SyncEngine) -> Result<()> {
    let refresh_minutes = engine.config().sync.refresh_minutes;
    let runner = Arc::new(SyncRunner::new(engine));
    let (shutdown_tx, _shutdown_rx) = watch::channel(false);

    let scheduled = (refresh_minutes > 0).then(|| {
        spawn_sync_task(
            runner.clone(),
            &shutdown_tx,
            Duration::from_secs(refresh_minutes * 60),
        )
    });
    if scheduled.is_none() {
        info!("refresh interval is 0; only manual syncs will run");
    }

    // Initial pass so notes are current as soon as the watcher starts.
    spawn_manual_run(runner.clone());

    println!("watching; press Enter to sync now, Ctrl-C to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(_)) => spawn_manual_run(runner.clone()),
                Ok(None) => {
                    // stdin closed (e.g. running under a service manager);
                    // keep serving the schedule until Ctrl-C.
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                Err(err) => {
                    warn!(?err, "reading stdin failed; manual triggers disabled");
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduled {
        if let Err(err) = handle.await {
            warn!(?err, "scheduled sync task ended abnormally");
        }
    }
    Ok(())
}

fn spawn_manual_run(runner: Arc<SyncRunner>) {
    tokio::spawn(async move {
        match runner.try_run().await {
            Some(report) => print_report(&report),
            None => println!("a sync is already running; trigger ignored"),
        }
    });
}
