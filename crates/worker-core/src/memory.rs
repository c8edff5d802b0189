//! In-memory host for exercising the worker without a browser.
//!
//! The network is a map of URL to canned response, caches are maps of URL to
//! stored copies. URLs are resolved against the host origin the same way the
//! browser resolves relative precache entries.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, HashSet},
};

use async_trait::async_trait;
use http::Method;
use url::Url;

use crate::{
    error::WorkerError,
    host::{HostNotification, HostRequest, HostResponse, RequestMode, WorkerHost},
    notification::Notification,
};

#[derive(Debug, Clone)]
pub struct MemoryRequest {
    pub url: String,
    pub method: Method,
    pub mode: RequestMode,
}

impl MemoryRequest {
    pub fn get(url: &str) -> Self {
        Self { url: url.to_string(), method: Method::GET, mode: RequestMode::Cors }
    }

    pub fn navigate(url: &str) -> Self {
        Self { url: url.to_string(), method: Method::GET, mode: RequestMode::Navigate }
    }

    pub fn post(url: &str) -> Self {
        Self { url: url.to_string(), method: Method::POST, mode: RequestMode::Cors }
    }
}

impl HostRequest for MemoryRequest {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn method(&self) -> Method {
        self.method.clone()
    }

    fn mode(&self) -> RequestMode {
        self.mode
    }
}

/// A response whose body can only be read once, like a fetch `Response`
#[derive(Debug)]
pub struct MemoryResponse {
    pub url: String,
    status: u16,
    body: RefCell<Option<Vec<u8>>>,
}

impl MemoryResponse {
    pub fn new<B: Into<Vec<u8>>>(url: &str, status: u16, body: B) -> Self {
        Self { url: url.to_string(), status, body: RefCell::new(Some(body.into())) }
    }

    pub fn body_used(&self) -> bool {
        self.body.borrow().is_none()
    }

    pub fn bytes(&self) -> Result<Vec<u8>, WorkerError> {
        self.body.borrow_mut().take().ok_or_else(|| WorkerError::BodyUsed { url: self.url.clone() })
    }

    pub fn text(&self) -> Result<String, WorkerError> {
        Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
    }
}

impl HostResponse for MemoryResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn try_clone(&self) -> Result<Self, WorkerError> {
        let body = self.body.borrow();
        let body = body.as_ref().ok_or_else(|| WorkerError::BodyUsed { url: self.url.clone() })?;
        Ok(Self::new(&self.url, self.status, body.clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryNotification {
    closed: Cell<bool>,
}

impl MemoryNotification {
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl HostNotification for MemoryNotification {
    fn close(&self) {
        self.closed.set(true);
    }
}

#[derive(Debug, Clone)]
struct Stored {
    status: u16,
    body: Vec<u8>,
}

#[derive(Debug)]
pub struct MemoryHost {
    origin: Url,
    remote: RefCell<HashMap<String, Stored>>,
    offline: Cell<bool>,
    failing_urls: RefCell<HashSet<String>>,
    failing_puts: RefCell<HashSet<String>>,
    failing_deletes: RefCell<HashSet<String>>,
    failing_claim: Cell<bool>,
    caches: RefCell<BTreeMap<String, HashMap<String, Stored>>>,
    network_log: RefCell<Vec<String>>,
    opened_windows: RefCell<Vec<String>>,
    notifications: RefCell<Vec<Notification>>,
    claimed: Cell<bool>,
    skip_waiting_calls: Cell<usize>,
}

impl MemoryHost {
    pub fn new(origin: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            origin: Url::parse(origin)?,
            remote: Default::default(),
            offline: Default::default(),
            failing_urls: Default::default(),
            failing_puts: Default::default(),
            failing_deletes: Default::default(),
            failing_claim: Default::default(),
            caches: Default::default(),
            network_log: Default::default(),
            opened_windows: Default::default(),
            notifications: Default::default(),
            claimed: Default::default(),
            skip_waiting_calls: Default::default(),
        })
    }

    pub fn resolve(&self, url: &str) -> String {
        self.origin.join(url).map_or_else(|_| url.to_string(), |u| u.to_string())
    }

    /// What the network answers for `url`. Unknown URLs get a 404
    pub fn serve<B: Into<Vec<u8>>>(&self, url: &str, status: u16, body: B) {
        let key = self.resolve(url);
        self.remote.borrow_mut().insert(key, Stored { status, body: body.into() });
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Makes fetches of `url` fail at the network layer
    pub fn fail_url(&self, url: &str) {
        let key = self.resolve(url);
        self.failing_urls.borrow_mut().insert(key);
    }

    /// Makes storing `url` in any cache fail, as if the quota ran out
    pub fn fail_put(&self, url: &str) {
        let key = self.resolve(url);
        self.failing_puts.borrow_mut().insert(key);
    }

    pub fn fail_delete(&self, cache: &str) {
        self.failing_deletes.borrow_mut().insert(cache.to_string());
    }

    pub fn fail_claim(&self) {
        self.failing_claim.set(true);
    }

    pub fn seed_cache<B: Into<Vec<u8>>>(&self, cache: &str, url: &str, status: u16, body: B) {
        let key = self.resolve(url);
        self.caches
            .borrow_mut()
            .entry(cache.to_string())
            .or_default()
            .insert(key, Stored { status, body: body.into() });
    }

    pub fn create_cache(&self, cache: &str) {
        self.caches.borrow_mut().entry(cache.to_string()).or_default();
    }

    pub fn cache_names_snapshot(&self) -> Vec<String> {
        self.caches.borrow().keys().cloned().collect()
    }

    pub fn cached_body(&self, cache: &str, url: &str) -> Option<Vec<u8>> {
        let key = self.resolve(url);
        self.caches.borrow().get(cache)?.get(&key).map(|s| s.body.clone())
    }

    pub fn cached_len(&self, cache: &str) -> usize {
        self.caches.borrow().get(cache).map_or(0, HashMap::len)
    }

    /// Every URL that reached the network, resolved, in order
    pub fn network_requests(&self) -> Vec<String> {
        self.network_log.borrow().clone()
    }

    pub fn opened_windows(&self) -> Vec<String> {
        self.opened_windows.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn claimed(&self) -> bool {
        self.claimed.get()
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting_calls.get()
    }

    fn lookup(&self, cache: &str, url: &str) -> Option<MemoryResponse> {
        let key = self.resolve(url);
        let caches = self.caches.borrow();
        let stored = caches.get(cache)?.get(&key)?;
        Some(MemoryResponse::new(&key, stored.status, stored.body.clone()))
    }

    fn store(&self, cache: &str, url: &str, response: MemoryResponse) -> Result<(), WorkerError> {
        let key = self.resolve(url);
        if self.failing_puts.borrow().contains(&key) {
            return Err(WorkerError::cache(cache, "quota exceeded"));
        }
        let status = response.status();
        let body = response.bytes()?;
        self.caches
            .borrow_mut()
            .entry(cache.to_string())
            .or_default()
            .insert(key, Stored { status, body });
        Ok(())
    }
}

#[async_trait(?Send)]
impl WorkerHost for MemoryHost {
    type Request = MemoryRequest;
    type Response = MemoryResponse;
    type NotificationHandle = MemoryNotification;

    async fn fetch(&self, request: &MemoryRequest) -> Result<MemoryResponse, WorkerError> {
        self.fetch_url(&request.url).await
    }

    async fn fetch_url(&self, url: &str) -> Result<MemoryResponse, WorkerError> {
        let key = self.resolve(url);
        self.network_log.borrow_mut().push(key.clone());

        if self.offline.get() {
            return Err(WorkerError::network(key, "offline"));
        }
        if self.failing_urls.borrow().contains(&key) {
            return Err(WorkerError::network(key, "connection reset"));
        }

        let response = match self.remote.borrow().get(&key) {
            Some(stored) => MemoryResponse::new(&key, stored.status, stored.body.clone()),
            None => MemoryResponse::new(&key, 404, "not found"),
        };
        Ok(response)
    }

    async fn cache_open(&self, cache: &str) -> Result<(), WorkerError> {
        self.create_cache(cache);
        Ok(())
    }

    async fn cache_match(
        &self,
        cache: &str,
        request: &MemoryRequest,
    ) -> Result<Option<MemoryResponse>, WorkerError> {
        Ok(self.lookup(cache, &request.url))
    }

    async fn cache_match_url(
        &self,
        cache: &str,
        url: &str,
    ) -> Result<Option<MemoryResponse>, WorkerError> {
        Ok(self.lookup(cache, url))
    }

    async fn cache_put(
        &self,
        cache: &str,
        request: &MemoryRequest,
        response: MemoryResponse,
    ) -> Result<(), WorkerError> {
        if request.method != Method::GET {
            return Err(WorkerError::cache(cache, format!("{} is unsupported", request.method)));
        }
        self.store(cache, &request.url, response)
    }

    async fn cache_put_url(
        &self,
        cache: &str,
        url: &str,
        response: MemoryResponse,
    ) -> Result<(), WorkerError> {
        self.store(cache, url, response)
    }

    async fn cache_names(&self) -> Result<Vec<String>, WorkerError> {
        Ok(self.cache_names_snapshot())
    }

    async fn cache_delete(&self, cache: &str) -> Result<bool, WorkerError> {
        if self.failing_deletes.borrow().contains(cache) {
            return Err(WorkerError::cache(cache, "delete refused"));
        }
        Ok(self.caches.borrow_mut().remove(cache).is_some())
    }

    async fn claim_clients(&self) -> Result<(), WorkerError> {
        if self.failing_claim.get() {
            return Err(WorkerError::Clients("claim refused".to_string()));
        }
        self.claimed.set(true);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), WorkerError> {
        let key = self.resolve(url);
        self.opened_windows.borrow_mut().push(key);
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), WorkerError> {
        self.skip_waiting_calls.set(self.skip_waiting_calls.get() + 1);
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), WorkerError> {
        self.notifications.borrow_mut().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_response_body_reads_once() {
        let response = MemoryResponse::new("https://app.test/a", 200, "hello");
        let copy = response.try_clone().unwrap();
        assert_eq!(response.text().unwrap(), "hello");
        assert!(response.body_used());
        assert!(response.try_clone().is_err());
        assert_eq!(copy.text().unwrap(), "hello");
    }

    #[test]
    fn test_resolves_relative_urls() {
        let host = MemoryHost::new("https://app.test/").unwrap();
        assert_eq!(host.resolve("/"), "https://app.test/");
        assert_eq!(host.resolve("/?source=pwa"), "https://app.test/?source=pwa");
        assert_eq!(host.resolve("https://cdn.test/x.js"), "https://cdn.test/x.js");
    }
}
