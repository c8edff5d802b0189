use futures::future::try_join_all;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    config::WorkerConfig,
    error::WorkerError,
    host::{HostResponse, WorkerHost},
};

async fn precache_fetch<H: WorkerHost>(host: &H, url: &str) -> Result<H::Response, WorkerError> {
    let response = host.fetch_url(url).await.map_err(|e| WorkerError::precache(url, e))?;

    if !response.ok() {
        let status = WorkerError::BadStatus { url: url.to_string(), status: response.status() };
        return Err(WorkerError::precache(url, status));
    }

    Ok(response)
}

/// Drops a partly filled cache after a failed store so a later install starts
/// from nothing
async fn roll_back<H: WorkerHost>(host: &H, cache: &str) {
    match host.cache_delete(cache).await {
        Ok(_) => debug!(cache, "Rolled back partial precache"),
        Err(e) => warn!(cache, error = %e, "Failed to roll back partial precache"),
    }
}

/// Fills the current cache with the precache manifest and, if configured,
/// skips the waiting phase. Every entry is fetched before anything is written
/// so a network failure leaves the cache untouched, and a failed store removes
/// the cache again. Returns the number of entries stored.
#[instrument(skip_all, fields(cache = config.cache_name()))]
pub async fn install<H: WorkerHost>(host: &H, config: &WorkerConfig) -> Result<usize, WorkerError> {
    info!("Installing...");
    let cache = config.cache_name();
    host.cache_open(&cache).await?;

    debug!(count = config.precache.len(), "Caching app shell and static assets");
    let responses =
        try_join_all(config.precache.iter().map(|url| precache_fetch(host, url))).await?;

    for (url, response) in config.precache.iter().zip(responses) {
        if let Err(e) = host.cache_put_url(&cache, url, response).await {
            roll_back(host, &cache).await;
            return Err(WorkerError::precache(url, e));
        }
        trace!(url, "Cached");
    }

    if config.skip_waiting_on_install {
        debug!("Skip waiting on install");
        host.skip_waiting().await?;
    }

    info!(version = config.version, "Install successful");
    Ok(config.precache.len())
}
