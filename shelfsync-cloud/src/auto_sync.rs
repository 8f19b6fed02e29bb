//! Background loop that pushes dirty keys on an interval.
//!
//! Push failures are logged and retried on the next tick; the keys stay
//! dirty in the meantime. `Stop` performs a final push before returning.

use crate::config::SyncConfig;
use crate::error::{CloudError, CloudResult};
use crate::sync_engine::SyncEngine;
use crate::types::AutoSyncCommand;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Handle for sending commands to the auto-sync loop.
#[derive(Clone)]
pub struct AutoSyncHandle {
    command_tx: mpsc::Sender<AutoSyncCommand>,
}

impl AutoSyncHandle {
    pub async fn stop(&self) -> CloudResult<()> {
        self.command_tx
            .send(AutoSyncCommand::Stop)
            .await
            .map_err(|_| CloudError::Backend("auto-sync not running".to_string()))
    }

    /// Pushes immediately instead of waiting for the next tick.
    pub async fn sync_now(&self) -> CloudResult<()> {
        self.command_tx
            .send(AutoSyncCommand::SyncNow)
            .await
            .map_err(|_| CloudError::Backend("auto-sync not running".to_string()))
    }
}

/// The loop itself; drive it with [`AutoSync::run`].
pub struct AutoSync {
    engine: Arc<SyncEngine>,
    command_rx: mpsc::Receiver<AutoSyncCommand>,
    interval: Duration,
}

/// Creates the auto-sync loop and its command handle.
///
/// A zero interval is rejected.
pub fn create_auto_sync(
    engine: Arc<SyncEngine>,
    interval: Duration,
) -> CloudResult<(AutoSyncHandle, AutoSync)> {
    if interval.is_zero() {
        return Err(CloudError::Config(
            "auto-sync interval must be positive".to_string(),
        ));
    }

    let (command_tx, command_rx) = mpsc::channel(16);
    Ok((
        AutoSyncHandle { command_tx },
        AutoSync {
            engine,
            command_rx,
            interval,
        },
    ))
}

impl AutoSync {
    /// Builds the loop described by `config`, or `None` when `auto_sync` is off.
    pub fn from_config(
        engine: Arc<SyncEngine>,
        config: &SyncConfig,
    ) -> CloudResult<Option<(AutoSyncHandle, AutoSync)>> {
        if !config.auto_sync {
            return Ok(None);
        }
        let interval = Duration::from_secs(config.auto_sync_interval_secs);
        create_auto_sync(engine, interval).map(Some)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `Stop` arrives or every handle is dropped.
    pub async fn run(mut self) {
        info!("auto-sync started (every {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        // Skip first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.push("scheduled").await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(AutoSyncCommand::SyncNow) => {
                            self.push("requested").await;
                        }
                        Some(AutoSyncCommand::Stop) => {
                            info!("auto-sync stopping");
                            self.push("final").await;
                            break;
                        }
                        None => {
                            info!("command channel closed, stopping auto-sync");
                            break;
                        }
                    }
                }
            }
        }

        info!("auto-sync stopped");
    }

    async fn push(&self, reason: &str) {
        match self.engine.sync_remote().await {
            Ok(report) if report.pushed.is_empty() => {
                debug!("{reason} sync: nothing to push");
            }
            Ok(report) => {
                debug!(
                    "{reason} sync pushed {} keys ({} uploaded)",
                    report.pushed.len(),
                    report.uploaded.len()
                );
            }
            Err(e) if e.is_precondition() => {
                warn!("{reason} sync skipped: {e}");
            }
            Err(e) => {
                error!("{reason} sync failed: {e}");
            }
        }
    }
}
