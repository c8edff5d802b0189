use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::{config::WorkerConfig, error::WorkerError, host::WorkerHost};

/// What happened to the caches that didn't belong to this version
#[derive(Debug, Default, PartialEq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, WorkerError)>,
}

/// Deletes every cache whose name isn't `current`. Deletions run concurrently
/// and independently, a failure is logged and recorded but doesn't stop the
/// rest.
pub async fn delete_stale_caches<H: WorkerHost>(host: &H, current: &str) -> CleanupReport {
    let mut report = CleanupReport::default();

    let names = match host.cache_names().await {
        Ok(names) => names,
        Err(e) => {
            warn!(%e, "Unable to list caches, skipping cleanup");
            return report;
        }
    };

    let deletions = names.into_iter().filter(|name| name != current).map(|name| async move {
        debug!(cache = name, "Deleting old cache");
        let result = host.cache_delete(&name).await;
        (name, result)
    });

    for (name, result) in join_all(deletions).await {
        match result {
            Ok(true) => report.deleted.push(name),
            Ok(false) => debug!(cache = name, "Old cache was already gone"),
            Err(e) => {
                warn!(cache = name, %e, "Failed to delete old cache");
                report.failed.push((name, e));
            }
        }
    }

    report
}

/// Cleans up old caches and claims the clients at the same time. Finishes
/// when both have; only a failed claim is an error
#[instrument(skip_all, fields(cache = config.cache_name()))]
pub async fn activate<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
) -> Result<CleanupReport, WorkerError> {
    info!("Activating...");
    let current = config.cache_name();

    let (report, claimed) =
        futures::join!(delete_stale_caches(host, &current), host.claim_clients());

    claimed.inspect_err(|e| warn!(%e, "Failed to claim clients"))?;
    info!(
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Service Worker is now controlling all clients"
    );

    Ok(report)
}
