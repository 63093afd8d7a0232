//! Retention cleanup — periodic purge of files past the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use labshare_core::result::AppResult;
use labshare_core::time::{now_iso, parse_iso};
use labshare_entity::{FileLifecycle, Settings, UploadsDoc};
use labshare_store::DocumentStore;

/// Time between retention sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Run one retention sweep.
///
/// Soft-deletes every non-deleted file whose creation time is older than
/// `retention_days`, then unlinks the expired blobs (best effort). The
/// record marking happens in a single collection update; unlinks run
/// after the lock is released. A retention of zero or less disables the
/// sweep entirely. Files with unparseable creation timestamps are never
/// considered old enough to purge. The collection is written at most
/// once, and only when a file was actually purged, so a sweep over an
/// already-clean store is a pure read.
///
/// Returns the number of files purged.
pub async fn run_retention_sweep(store: &Arc<DocumentStore>) -> AppResult<usize> {
    let settings: Settings = store.read().await?;
    if settings.retention_days <= 0 {
        return Ok(0);
    }
    let cutoff = Utc::now() - TimeDelta::days(settings.retention_days);

    let purged_blobs = store
        .update::<UploadsDoc, _, _>(move |doc| {
            let now = now_iso();
            let mut purged_blobs = Vec::new();
            for file in &mut doc.files {
                if file.is_deleted() {
                    continue;
                }
                let Some(created_at) = parse_iso(&file.created_at) else {
                    continue;
                };
                if created_at > cutoff {
                    continue;
                }
                file.lifecycle = FileLifecycle::Deleted { at: now.clone() };
                purged_blobs.push(file.stored_filename.clone());
            }
            Ok(purged_blobs)
        })
        .await?;

    let purged = purged_blobs.len();
    for stored_filename in purged_blobs {
        let path = store.blob_path(&stored_filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to unlink expired blob");
            }
        }
    }

    if purged > 0 {
        info!(purged, retention_days = settings.retention_days, "Retention sweep purged files");
    }
    Ok(purged)
}

/// Run retention sweeps until the shutdown signal flips to `true`.
///
/// One sweep runs immediately at startup, then once per day. A sweep
/// failure is logged and the daemon keeps going; shutdown is honored
/// promptly even mid-wait.
pub async fn retention_daemon(store: Arc<DocumentStore>, mut shutdown: watch::Receiver<bool>) {
    info!("Retention daemon started");
    let mut ticker = time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_retention_sweep(&store).await {
                    warn!(error = %e, "Retention sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("Retention daemon stopped");
}
