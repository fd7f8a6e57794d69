//! Background expiration sweep for the disk tier.
//!
//! Runs one sweep at startup (matching the cache's launch-time cleanup) and,
//! when an interval is configured, keeps sweeping periodically until
//! cancelled.

use crate::cache::disk::DiskCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the disk expiration sweep daemon.
///
/// Performs an initial sweep immediately. If `interval` is `None` the
/// daemon exits after that; otherwise it keeps sweeping at the given
/// interval until the cancellation token fires.
///
/// # Arguments
///
/// * `disk` - Disk tier to sweep
/// * `max_age` - Age beyond which entries are removed
/// * `interval` - Optional period between sweeps
/// * `cancellation` - Token for graceful shutdown
pub async fn run_sweep_daemon(
    disk: Arc<DiskCache>,
    max_age: Duration,
    interval: Option<Duration>,
    cancellation: CancellationToken,
) {
    debug!(
        dir = %disk.directory().display(),
        max_age_secs = max_age.as_secs(),
        periodic = interval.is_some(),
        "starting disk cache expiration sweep"
    );

    sweep_once(&disk, max_age).await;

    let Some(interval) = interval else {
        debug!("periodic sweep disabled; daemon exiting after startup sweep");
        return;
    };

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("expiration sweep daemon shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                sweep_once(&disk, max_age).await;
            }
        }
    }
}

/// Run a single sweep off the async threads.
async fn sweep_once(disk: &Arc<DiskCache>, max_age: Duration) {
    let disk = Arc::clone(disk);
    let outcome = tokio::task::spawn_blocking(move || disk.sweep_expired(max_age)).await;

    match outcome {
        Ok(result) if result.files_removed > 0 => {
            info!(
                files_removed = result.files_removed,
                bytes_freed = result.bytes_freed,
                duration_ms = result.duration_ms,
                "expired cache entries removed"
            );
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "expiration sweep task failed");
        }
    }
}
