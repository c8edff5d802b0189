//! Request classification and the three response strategies.
//!
//! [`classify`] and [`Strategy::for_class`] are pure so the routing can be
//! tested on its own. [`respond`] runs the chosen strategy against a host.

use http::Method;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    config::WorkerConfig,
    error::WorkerError,
    host::{HostRequest, HostResponse, RequestMode, WorkerHost},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Full page load
    Navigation,
    /// Path contains the static prefix
    StaticAsset,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network, falling back to the cached app shell
    NetworkOrShell,
    /// Cache, filling it from the network on a miss
    CacheFirst,
    /// Network, falling back to whatever is cached for the request
    NetworkFirst,
}

impl Strategy {
    pub fn for_class(class: RequestClass) -> Self {
        match class {
            RequestClass::Navigation => Self::NetworkOrShell,
            RequestClass::StaticAsset => Self::CacheFirst,
            RequestClass::Other => Self::NetworkFirst,
        }
    }
}

/// Path component of `url`. Anything that isn't an absolute URL is treated as
/// a path with the query and fragment stripped
fn request_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(url) => url.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

pub fn classify(url: &str, mode: RequestMode, static_prefix: &str) -> RequestClass {
    if mode == RequestMode::Navigate {
        RequestClass::Navigation
    } else if request_path(url).contains(static_prefix) {
        RequestClass::StaticAsset
    } else {
        RequestClass::Other
    }
}

pub fn classify_request<R: HostRequest>(request: &R, config: &WorkerConfig) -> RequestClass {
    classify(&request.url(), request.mode(), &config.static_prefix)
}

/// Resolves a response for an intercepted request
pub async fn respond<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &H::Request,
) -> Result<H::Response, WorkerError> {
    let class = classify_request(request, config);
    let strategy = Strategy::for_class(class);
    let cache = config.cache_name();
    trace!(url = request.url(), ?class, ?strategy, "Fetch event");

    match strategy {
        Strategy::NetworkOrShell => network_or_shell(host, &cache, &config.shell_path, request).await,
        Strategy::CacheFirst => cache_first(host, &cache, request).await,
        Strategy::NetworkFirst => network_first(host, &cache, request).await,
    }
}

async fn network_or_shell<H: WorkerHost>(
    host: &H,
    cache: &str,
    shell_path: &str,
    request: &H::Request,
) -> Result<H::Response, WorkerError> {
    let error = match host.fetch(request).await {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    debug!(url = request.url(), %error, "Navigation fetch failed, falling back to cache");
    match host.cache_match_url(cache, shell_path).await {
        Ok(Some(shell)) => Ok(shell),
        Ok(None) => {
            warn!(shell_path, "App shell is not cached");
            Err(error)
        }
        Err(e) => {
            warn!(%e, "App shell lookup failed");
            Err(error)
        }
    }
}

async fn cache_first<H: WorkerHost>(
    host: &H,
    cache: &str,
    request: &H::Request,
) -> Result<H::Response, WorkerError> {
    let url = request.url();

    match host.cache_match(cache, request).await {
        Ok(Some(cached)) => {
            debug!(url, "Serving from cache");
            return Ok(cached);
        }
        Ok(None) => trace!(url, "MISS"),
        Err(e) => warn!(url, %e, "Cache lookup failed, trying the network"),
    }

    let response = host.fetch(request).await.inspect_err(|e| debug!(url, %e, "Fetch failed"))?;

    if !response.ok() {
        trace!(url, status = response.status(), "Not caching unsuccessful response");
    } else if request.method() != Method::GET {
        trace!(url, method = %request.method(), "Not caching non-GET response");
    } else {
        // The stored copy gets its own body, the caller keeps the original
        match response.try_clone() {
            Ok(copy) => match host.cache_put(cache, request, copy).await {
                Ok(()) => debug!(url, "Cached new resource"),
                Err(e) => warn!(url, %e, "Failed to cache resource"),
            },
            Err(e) => warn!(url, %e, "Failed to clone response for caching"),
        }
    }

    Ok(response)
}

async fn network_first<H: WorkerHost>(
    host: &H,
    cache: &str,
    request: &H::Request,
) -> Result<H::Response, WorkerError> {
    let error = match host.fetch(request).await {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    let url = request.url();
    match host.cache_match(cache, request).await {
        Ok(Some(cached)) => {
            debug!(url, %error, "Network failed, serving from cache");
            Ok(cached)
        }
        Ok(None) => {
            debug!(url, %error, "Network failed and nothing is cached");
            Err(error)
        }
        Err(e) => {
            warn!(url, %e, "Cache lookup failed");
            Err(error)
        }
    }
}

#[cfg(test)]
mod test {
    use tokio_test::block_on;

    use super::*;
    use crate::{
        host::parse_method,
        memory::{MemoryHost, MemoryRequest},
    };

    const CACHE: &str = "flexingg-cache-1.0.0";

    fn host() -> MemoryHost {
        MemoryHost::new("https://app.test/").unwrap()
    }

    #[test]
    fn test_classify_navigation_wins() {
        assert_eq!(
            classify("https://app.test/static/page", RequestMode::Navigate, "/static/"),
            RequestClass::Navigation
        );
        assert_eq!(
            classify("https://app.test/profile", RequestMode::Navigate, "/static/"),
            RequestClass::Navigation
        );
    }

    #[test]
    fn test_classify_static_by_path() {
        assert_eq!(
            classify("https://app.test/static/css/styles.css", RequestMode::Cors, "/static/"),
            RequestClass::StaticAsset
        );
        assert_eq!(
            classify("/static/icons/icon.png?v=2", RequestMode::NoCors, "/static/"),
            RequestClass::StaticAsset
        );
        assert_eq!(
            classify("https://app.test/api/user?next=/static/", RequestMode::Cors, "/static/"),
            RequestClass::Other
        );
        assert_eq!(
            classify("https://app.test/staticfile", RequestMode::SameOrigin, "/static/"),
            RequestClass::Other
        );
    }

    #[test]
    fn test_strategy_for_class() {
        assert_eq!(Strategy::for_class(RequestClass::Navigation), Strategy::NetworkOrShell);
        assert_eq!(Strategy::for_class(RequestClass::StaticAsset), Strategy::CacheFirst);
        assert_eq!(Strategy::for_class(RequestClass::Other), Strategy::NetworkFirst);
    }

    #[test]
    fn test_static_hit_never_touches_network() {
        let host = host();
        host.seed_cache(CACHE, "/static/css/styles.css", 200, "cached css");
        host.serve("/static/css/styles.css", 200, "fresh css");

        let request = MemoryRequest::get("https://app.test/static/css/styles.css");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();

        assert_eq!(response.text().unwrap(), "cached css");
        assert!(host.network_requests().is_empty());
    }

    #[test]
    fn test_static_miss_fills_cache_and_keeps_body() {
        let host = host();
        host.serve("/static/app.js", 200, "console.log(1)");

        let request = MemoryRequest::get("https://app.test/static/app.js");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();

        assert!(!response.body_used());
        assert_eq!(response.text().unwrap(), "console.log(1)");
        assert_eq!(host.cached_body(CACHE, "/static/app.js"), Some(b"console.log(1)".to_vec()));

        // Second time round it comes from the cache
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();
        assert_eq!(response.text().unwrap(), "console.log(1)");
        assert_eq!(host.network_requests().len(), 1);
    }

    #[test]
    fn test_static_error_status_not_cached() {
        let host = host();
        let request = MemoryRequest::get("https://app.test/static/missing.png");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(host.cached_body(CACHE, "/static/missing.png"), None);
    }

    #[test]
    fn test_static_post_not_cached() {
        let host = host();
        host.serve("/static/upload", 200, "ok");
        let request = MemoryRequest::post("https://app.test/static/upload");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();

        assert!(response.ok());
        assert_eq!(host.cached_len(CACHE), 0);
    }

    #[test]
    fn test_static_unparseable_method_not_cached() {
        let host = host();
        host.serve("/static/app.js", 200, "js");
        let request = MemoryRequest {
            method: parse_method("BAD METHOD"),
            ..MemoryRequest::get("https://app.test/static/app.js")
        };
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();

        assert_eq!(response.text().unwrap(), "js");
        assert_eq!(host.cached_len(CACHE), 0);
    }

    #[test]
    fn test_static_offline_miss_propagates() {
        let host = host();
        host.set_offline(true);
        let request = MemoryRequest::get("https://app.test/static/app.js");
        let err = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap_err();
        assert!(err.is_network());
    }

    #[test]
    fn test_navigation_offline_serves_shell() {
        let host = host();
        host.seed_cache(CACHE, "/", 200, "<html>shell</html>");
        host.set_offline(true);

        let request = MemoryRequest::navigate("https://app.test/leaderboard");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();
        assert_eq!(response.text().unwrap(), "<html>shell</html>");
    }

    #[test]
    fn test_navigation_online_not_cached() {
        let host = host();
        host.serve("/leaderboard", 200, "<html>live</html>");

        let request = MemoryRequest::navigate("https://app.test/leaderboard");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();
        assert_eq!(response.text().unwrap(), "<html>live</html>");
        assert_eq!(host.cached_len(CACHE), 0);
    }

    #[test]
    fn test_navigation_offline_without_shell_fails() {
        let host = host();
        host.set_offline(true);
        let request = MemoryRequest::navigate("https://app.test/");
        let err = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap_err();
        assert!(err.is_network());
    }

    #[test]
    fn test_other_prefers_network() {
        let host = host();
        host.seed_cache(CACHE, "/manifest.json", 200, "old");
        host.serve("/manifest.json", 200, "new");

        let request = MemoryRequest::get("https://app.test/manifest.json");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();
        assert_eq!(response.text().unwrap(), "new");
        // Network-first never writes
        assert_eq!(host.cached_body(CACHE, "/manifest.json"), Some(b"old".to_vec()));
    }

    #[test]
    fn test_other_falls_back_to_cache() {
        let host = host();
        host.seed_cache(CACHE, "/manifest.json", 200, "old");
        host.fail_url("/manifest.json");

        let request = MemoryRequest::get("https://app.test/manifest.json");
        let response = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap();
        assert_eq!(response.text().unwrap(), "old");
    }

    #[test]
    fn test_other_uncached_failure_propagates() {
        let host = host();
        host.set_offline(true);
        let request = MemoryRequest::get("https://app.test/api/user");
        let err = block_on(respond(&host, &WorkerConfig::default(), &request)).unwrap_err();
        assert_eq!(err, WorkerError::network("https://app.test/api/user", "offline"));
    }
}
