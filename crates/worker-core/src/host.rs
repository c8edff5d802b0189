//! The seam between the caching policy and whatever actually runs the worker.
//!
//! In the browser this is the service worker global scope, in tests it is
//! [`MemoryHost`](crate::memory::MemoryHost). Nothing here is `Send`: the
//! browser hands out JS objects that never leave their thread.

use async_trait::async_trait;
use http::Method;

use crate::{error::WorkerError, notification::Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    pub fn parse(mode: &str) -> Self {
        match mode {
            "navigate" => Self::Navigate,
            "same-origin" => Self::SameOrigin,
            "no-cors" => Self::NoCors,
            _ => Self::Cors,
        }
    }
}

/// Parses a request method. Anything that isn't a valid token comes back as
/// `POST`, which is never stored in a cache
pub fn parse_method(method: &str) -> Method {
    Method::from_bytes(method.as_bytes()).unwrap_or(Method::POST)
}

pub trait HostRequest {
    fn url(&self) -> String;
    fn method(&self) -> Method;
    fn mode(&self) -> RequestMode;
}

pub trait HostResponse: Sized {
    fn status(&self) -> u16;

    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// Tees the response so one copy can be stored while the other is
    /// returned. Fails if the body has already been read
    fn try_clone(&self) -> Result<Self, WorkerError>;
}

pub trait HostNotification {
    fn close(&self);
}

#[async_trait(?Send)]
pub trait WorkerHost {
    type Request: HostRequest;
    type Response: HostResponse;
    type NotificationHandle: HostNotification;

    async fn fetch(&self, request: &Self::Request) -> Result<Self::Response, WorkerError>;
    async fn fetch_url(&self, url: &str) -> Result<Self::Response, WorkerError>;

    /// Opens the named cache, creating it if it doesn't exist
    async fn cache_open(&self, cache: &str) -> Result<(), WorkerError>;
    async fn cache_match(
        &self,
        cache: &str,
        request: &Self::Request,
    ) -> Result<Option<Self::Response>, WorkerError>;
    async fn cache_match_url(
        &self,
        cache: &str,
        url: &str,
    ) -> Result<Option<Self::Response>, WorkerError>;
    /// Stores the response, consuming its body
    async fn cache_put(
        &self,
        cache: &str,
        request: &Self::Request,
        response: Self::Response,
    ) -> Result<(), WorkerError>;
    async fn cache_put_url(
        &self,
        cache: &str,
        url: &str,
        response: Self::Response,
    ) -> Result<(), WorkerError>;
    async fn cache_names(&self) -> Result<Vec<String>, WorkerError>;
    /// Ok(false) if there was nothing to delete
    async fn cache_delete(&self, cache: &str) -> Result<bool, WorkerError>;

    async fn claim_clients(&self) -> Result<(), WorkerError>;
    async fn open_window(&self, url: &str) -> Result<(), WorkerError>;
    async fn skip_waiting(&self) -> Result<(), WorkerError>;
    async fn show_notification(&self, notification: &Notification) -> Result<(), WorkerError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(RequestMode::parse("navigate"), RequestMode::Navigate);
        assert_eq!(RequestMode::parse("same-origin"), RequestMode::SameOrigin);
        assert_eq!(RequestMode::parse("no-cors"), RequestMode::NoCors);
        assert_eq!(RequestMode::parse("cors"), RequestMode::Cors);
        assert_eq!(RequestMode::parse("websocket"), RequestMode::Cors);
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("GET"), Method::GET);
        assert_eq!(parse_method("PURGE").as_str(), "PURGE");
        assert_eq!(parse_method(""), Method::POST);
        assert_eq!(parse_method("BAD METHOD"), Method::POST);
    }
}
