//! Browser entry points for the offline cache worker.
//!
//! The JS bootstrap (`sw.js`) registers the event listeners synchronously and
//! forwards each event to one of the `worker_*` exports. Every export turns
//! the event into a [`WorkerEvent`], queues it on the event loop and returns
//! a promise the bootstrap hands to `waitUntil` or `respondWith`.

mod error;
mod host;
mod logging;

use std::cell::RefCell;

use console_error_panic_hook::set_once as set_panic_hook;
use futures::channel::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};
use wasm_bindgen::{prelude::wasm_bindgen, JsValue};
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{
    js_sys::{Promise, Reflect},
    FetchEvent, MessageEvent, NotificationEvent, PushEvent, ServiceWorkerGlobalScope,
};
use worker_core::{
    config, notification::click_action, Pending, Worker, WorkerConfig, WorkerEvent,
};

use crate::{
    error::to_js,
    host::{WebHost, WebNotification, WebRequest, WebResponse},
    logging::configure_tracing_once as configure_tracing,
};

thread_local! {
    static EVENTS: RefCell<Option<UnboundedSender<WorkerEvent<WebHost>>>> = RefCell::new(None);
}

fn prepare() {
    set_panic_hook();
    configure_tracing(config::get().debug);
}

/// The sender side of the event loop, starting the loop if it isn't running
fn events(sw: &ServiceWorkerGlobalScope) -> UnboundedSender<WorkerEvent<WebHost>> {
    EVENTS.with(|events| {
        let mut events = events.borrow_mut();
        if let Some(tx) = events.as_ref().filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }

        let config = config::get();
        debug!(cache = config.cache_name(), "Starting event loop");

        let (tx, rx) = mpsc::unbounded();
        let worker = Worker::new(WebHost::new(sw.clone()), config);
        spawn_local(async move { worker.run(rx).await });

        *events = Some(tx.clone());
        tx
    })
}

fn submit<T, F>(
    sw: &ServiceWorkerGlobalScope,
    (event, pending): (WorkerEvent<WebHost>, Pending<T>),
    into_js: F,
) -> Promise
where
    T: 'static,
    F: FnOnce(T) -> JsValue + 'static,
{
    let name = event.name();
    if events(sw).unbounded_send(event).is_err() {
        // The event is dropped with the error so `pending` resolves as Dropped
        warn!(event = name, "Event loop has stopped");
    }

    future_to_promise(async move { pending.wait().await.map(into_js).map_err(to_js) })
}

fn undefined(_: ()) -> JsValue {
    JsValue::undefined()
}

/// Sets the process-wide config from an optional JSON string. Must run before
/// any event is forwarded, otherwise the defaults are used. A config that
/// fails to parse is logged and replaced by the defaults so fetches keep
/// being answered
#[wasm_bindgen]
pub fn worker_init(config_json: Option<String>) -> Result<(), JsValue> {
    set_panic_hook();

    let (parsed, rejected) = WorkerConfig::from_json_or_default(config_json.as_deref());

    configure_tracing(parsed.debug);
    if let Some(e) = rejected {
        warn!(error = %e, "Ignoring worker config, using the defaults");
    }

    let installed = config::init(parsed).map_err(to_js)?;
    info!(cache = installed.cache_name(), "Worker initialised");

    Ok(())
}

#[wasm_bindgen]
pub fn worker_install(sw: ServiceWorkerGlobalScope) -> Promise {
    prepare();
    submit(&sw, WorkerEvent::install(), undefined)
}

#[wasm_bindgen]
pub fn worker_activate(sw: ServiceWorkerGlobalScope) -> Promise {
    prepare();
    submit(&sw, WorkerEvent::activate(), undefined)
}

#[wasm_bindgen]
pub fn worker_fetch(sw: ServiceWorkerGlobalScope, event: FetchEvent) -> Promise {
    prepare();
    let request = WebRequest(event.request());
    submit(&sw, WorkerEvent::fetch(request), |response: WebResponse| response.0.into())
}

#[wasm_bindgen]
pub fn worker_message(sw: ServiceWorkerGlobalScope, event: MessageEvent) -> Promise {
    prepare();
    submit(&sw, WorkerEvent::message(event.data().as_string()), undefined)
}

#[wasm_bindgen]
pub fn worker_push(sw: ServiceWorkerGlobalScope, event: PushEvent) -> Promise {
    prepare();
    let data = event.data().map(|data| data.text());
    submit(&sw, WorkerEvent::push(data), undefined)
}

#[wasm_bindgen]
pub fn worker_notification_click(sw: ServiceWorkerGlobalScope, event: NotificationEvent) -> Promise {
    prepare();

    // web-sys has no binding for `action`
    let action = Reflect::get(&event, &JsValue::from_str("action"))
        .ok()
        .and_then(|action| action.as_string());
    let action = click_action(action);
    let notification = WebNotification(event.notification());

    submit(&sw, WorkerEvent::notification_click(notification, action), undefined)
}
