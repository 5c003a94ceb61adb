//! Expiry sweeper: periodically evicts artifacts past their TTL.
//!
//! Physical removal may lag expiry by up to one interval; serving never does
//! because the retrieval gate re-checks every request.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use depot::{ArtifactMeta, ArtifactStore};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::share::ShareService;

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Whether `meta` should be evicted at `now`.
///
/// Age is measured from the recorded `created_at`. The stored deadline also
/// counts, so a TTL shortened across a restart still evicts old uploads.
pub fn is_due(meta: &ArtifactMeta, ttl: Duration, now: DateTime<Utc>) -> bool {
    meta.age_at(now) >= ttl || !meta.is_live_at(now)
}

/// Scan every stored id and delete the ones past their TTL.
///
/// Failures are logged and counted; the pass always visits every id.
pub fn sweep_once(store: &dyn ArtifactStore, ttl: Duration, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    let ids = match store.list_ids() {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Sweep could not list artifacts");
            report.failed += 1;
            return report;
        }
    };

    for id in ids {
        report.scanned += 1;

        let meta = match store.get(&id) {
            Ok(Some(artifact)) => artifact.meta,
            // Deleted since listing.
            Ok(None) => continue,
            Err(e) => {
                warn!(artifact.id = %id, error = %e, "Sweep could not read artifact");
                report.failed += 1;
                continue;
            }
        };

        if !is_due(&meta, ttl, now) {
            continue;
        }

        match store.delete(&id) {
            Ok(_) => {
                report.removed += 1;
                info!(
                    artifact.id = %id,
                    artifact.age_secs = meta.age_at(now).num_seconds(),
                    "Evicted expired artifact"
                );
            }
            Err(e) => {
                report.failed += 1;
                warn!(artifact.id = %id, error = %e, "Failed to evict expired artifact");
            }
        }
    }

    if report.removed > 0 || report.failed > 0 {
        info!(
            sweep.scanned = report.scanned,
            sweep.removed = report.removed,
            sweep.failed = report.failed,
            remaining = store.count(),
            "Sweep complete"
        );
    } else {
        debug!(sweep.scanned = report.scanned, "Sweep found nothing to evict");
    }

    report
}

/// Run a sweep immediately and then every `interval` until `cancel` fires.
pub fn spawn_sweeper(
    service: Arc<ShareService>,
    interval: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let service = Arc::clone(&service);
                    let pass = tokio::task::spawn_blocking(move || {
                        service.sweep_once(service.clock().now())
                    });
                    if let Err(e) = pass.await {
                        error!(error = %e, "Sweep task panicked");
                    }
                }
            }
        }
    })
}
