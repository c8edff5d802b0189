use async_trait::async_trait;
use gloo::utils::format::JsValueSerdeExt;
use http::Method;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    js_sys::{Array, Promise},
    Cache, CacheStorage, NotificationOptions, Request, Response, ServiceWorkerGlobalScope,
};
use worker_core::{
    host::parse_method, HostNotification, HostRequest, HostResponse, Notification, RequestMode,
    WorkerError, WorkerHost,
};

use crate::error::JsResultExt;

pub struct WebRequest(pub Request);

impl HostRequest for WebRequest {
    fn url(&self) -> String {
        self.0.url()
    }

    fn method(&self) -> Method {
        parse_method(&self.0.method())
    }

    fn mode(&self) -> RequestMode {
        match self.0.mode() {
            web_sys::RequestMode::Navigate => RequestMode::Navigate,
            web_sys::RequestMode::SameOrigin => RequestMode::SameOrigin,
            web_sys::RequestMode::NoCors => RequestMode::NoCors,
            _ => RequestMode::Cors,
        }
    }
}

pub struct WebResponse(pub Response);

impl HostResponse for WebResponse {
    fn status(&self) -> u16 {
        self.0.status()
    }

    fn ok(&self) -> bool {
        self.0.ok()
    }

    fn try_clone(&self) -> Result<Self, WorkerError> {
        // Response::clone is the JS tee, it throws once the body is used
        self.0
            .clone()
            .map(WebResponse)
            .map_err(|_| WorkerError::BodyUsed { url: self.0.url() })
    }
}

pub struct WebNotification(pub web_sys::Notification);

impl HostNotification for WebNotification {
    fn close(&self) {
        self.0.close();
    }
}

/// The browser side of the worker
pub struct WebHost {
    sw: ServiceWorkerGlobalScope,
}

impl WebHost {
    pub fn new(sw: ServiceWorkerGlobalScope) -> Self {
        Self { sw }
    }

    fn caches(&self) -> Result<CacheStorage, WorkerError> {
        self.sw.caches().cache("caches")
    }

    async fn get_cache(&self, cache: &str) -> Result<Cache, WorkerError> {
        let opened: Cache = JsFuture::from(self.caches()?.open(cache)).await.cache(cache)?.into();
        Ok(opened)
    }

    async fn fetch_promise(&self, promise: Promise, url: &str) -> Result<WebResponse, WorkerError> {
        let response = JsFuture::from(promise).await.network(url)?;

        if response.is_instance_of::<Response>() {
            Ok(WebResponse(response.unchecked_into()))
        } else {
            Err(WorkerError::network(
                url,
                format!("Fetch returned something other than a Response: {:?}", response),
            ))
        }
    }

    async fn matched(cache: &str, promise: Promise) -> Result<Option<WebResponse>, WorkerError> {
        let cached = JsFuture::from(promise).await.cache(cache)?;

        if cached.is_instance_of::<Response>() {
            Ok(Some(WebResponse(cached.unchecked_into())))
        } else if cached.is_undefined() {
            Ok(None)
        } else {
            Err(WorkerError::cache(
                cache,
                format!("match returned something other than Response or undefined: {:?}", cached),
            ))
        }
    }
}

#[async_trait(?Send)]
impl WorkerHost for WebHost {
    type Request = WebRequest;
    type Response = WebResponse;
    type NotificationHandle = WebNotification;

    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, WorkerError> {
        self.fetch_promise(self.sw.fetch_with_request(&request.0), &request.url()).await
    }

    async fn fetch_url(&self, url: &str) -> Result<WebResponse, WorkerError> {
        self.fetch_promise(self.sw.fetch_with_str(url), url).await
    }

    async fn cache_open(&self, cache: &str) -> Result<(), WorkerError> {
        self.get_cache(cache).await.map(|_| ())
    }

    async fn cache_match(
        &self,
        cache: &str,
        request: &WebRequest,
    ) -> Result<Option<WebResponse>, WorkerError> {
        let opened = self.get_cache(cache).await?;
        Self::matched(cache, opened.match_with_request(&request.0)).await
    }

    async fn cache_match_url(
        &self,
        cache: &str,
        url: &str,
    ) -> Result<Option<WebResponse>, WorkerError> {
        let opened = self.get_cache(cache).await?;
        Self::matched(cache, opened.match_with_str(url)).await
    }

    async fn cache_put(
        &self,
        cache: &str,
        request: &WebRequest,
        response: WebResponse,
    ) -> Result<(), WorkerError> {
        let opened = self.get_cache(cache).await?;
        JsFuture::from(opened.put_with_request(&request.0, &response.0)).await.cache(cache)?;
        Ok(())
    }

    async fn cache_put_url(
        &self,
        cache: &str,
        url: &str,
        response: WebResponse,
    ) -> Result<(), WorkerError> {
        let opened = self.get_cache(cache).await?;
        JsFuture::from(opened.put_with_str(url, &response.0)).await.cache(cache)?;
        Ok(())
    }

    async fn cache_names(&self) -> Result<Vec<String>, WorkerError> {
        let keys: Array = JsFuture::from(self.caches()?.keys()).await.cache("caches")?.into();
        Ok(keys.iter().filter_map(|k| k.as_string()).collect())
    }

    async fn cache_delete(&self, cache: &str) -> Result<bool, WorkerError> {
        let deleted = JsFuture::from(self.caches()?.delete(cache)).await.cache(cache)?;
        Ok(deleted.as_bool().unwrap_or(false))
    }

    async fn claim_clients(&self) -> Result<(), WorkerError> {
        JsFuture::from(self.sw.clients().claim()).await.clients()?;
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), WorkerError> {
        JsFuture::from(self.sw.clients().open_window(url)).await.clients()?;
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), WorkerError> {
        JsFuture::from(self.sw.skip_waiting().clients()?).await.clients()?;
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), WorkerError> {
        let options: NotificationOptions =
            <JsValue as JsValueSerdeExt>::from_serde(&notification.options)
                .map_err(|e| WorkerError::Notification(e.to_string()))?
                .unchecked_into();

        let shown = self
            .sw
            .registration()
            .show_notification_with_options(&notification.title, &options)
            .notification()?;
        JsFuture::from(shown).await.notification()?;

        Ok(())
    }
}
