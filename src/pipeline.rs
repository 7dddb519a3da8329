use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::reconcile;
use crate::scanner::ScanEngine;
use crate::store::Store;
use crate::target;

/// Fixed delay between pending-request sweeps.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(10);

/// Drives queued scan requests to completion: poll the store on a fixed
/// interval, sweep each requested server with the engine, merge results,
/// retire the request.
pub struct Pipeline<S> {
    store: S,
    engine: ScanEngine,
}

impl<S: Store> Pipeline<S> {
    pub fn new(store: S, engine: ScanEngine) -> Self {
        Self { store, engine }
    }

    /// Run ticks every `interval` until `cancel` fires. A tick always
    /// runs to completion; if it overruns the interval the next tick is
    /// delayed rather than queued, so ticks never overlap.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested; stopping pipeline");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    /// One full sweep over the pending queue. Requests are processed one
    /// at a time so total outbound connection pressure stays bounded by
    /// the engine's budget regardless of queue depth. A failed request is
    /// logged and left queued for the next tick; it never aborts the rest
    /// of the tick.
    pub async fn tick(&self) {
        let pending = match self.store.pending_scans().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "failed to list pending scan requests");
                return;
            }
        };
        for server_id in pending {
            if let Err(e) = self.process(server_id).await {
                warn!(server_id, error = %e, "scan request failed; retained for next tick");
            }
        }
    }

    async fn process(&self, server_id: i32) -> Result<()> {
        let server = self
            .store
            .server_by_id(server_id)
            .await?
            .with_context(|| format!("server {server_id} not found"))?;
        let ip = target::resolve_host(&server.ip).await?;
        let open = self.engine.scan(ip).await;
        let inserted = reconcile::reconcile(&self.store, server_id, &open).await?;
        // Retire only after results are safely merged. If the delete
        // itself fails the request reappears next tick and the rescan is
        // a no-op insert, so at-least-once processing stays idempotent.
        self.store.delete_scan(server_id).await?;
        info!(
            server_id,
            ip = %ip,
            open = open.len(),
            inserted,
            "scan request completed"
        );
        Ok(())
    }
}
