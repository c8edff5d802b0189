//! The event loop.
//!
//! Each lifecycle event the host delivers becomes a [`WorkerEvent`] carrying
//! a one-shot completion. The host keeps the real event alive (`waitUntil`,
//! `respondWith`) until the matching [`Pending`] resolves, so every piece of
//! async work an event starts is finished before the host may stop the
//! worker.

use std::sync::Arc;

use futures::{channel::oneshot, Stream, StreamExt};
use tracing::{debug, error, trace};

use crate::{
    activate::activate,
    config::WorkerConfig,
    error::WorkerError,
    fetch::respond,
    install::install,
    lifecycle::{Lifecycle, LifecycleState},
    message::message,
    notification::{notification_click, push},
    host::WorkerHost,
};

pub type Completion<T> = oneshot::Sender<Result<T, WorkerError>>;

/// The result of a dispatched event
#[derive(Debug)]
pub struct Pending<T>(oneshot::Receiver<Result<T, WorkerError>>);

impl<T> Pending<T> {
    pub async fn wait(self) -> Result<T, WorkerError> {
        self.0.await.map_err(|_| WorkerError::Dropped)?
    }
}

fn completion<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Pending(rx))
}

pub enum WorkerEvent<H: WorkerHost> {
    Install {
        done: Completion<()>,
    },
    Activate {
        done: Completion<()>,
    },
    Fetch {
        request: H::Request,
        respond_with: Completion<H::Response>,
    },
    Message {
        data: Option<String>,
        done: Completion<()>,
    },
    Push {
        data: Option<String>,
        done: Completion<()>,
    },
    NotificationClick {
        notification: H::NotificationHandle,
        action: Option<String>,
        done: Completion<()>,
    },
}

impl<H: WorkerHost> WorkerEvent<H> {
    pub fn install() -> (Self, Pending<()>) {
        let (done, pending) = completion();
        (Self::Install { done }, pending)
    }

    pub fn activate() -> (Self, Pending<()>) {
        let (done, pending) = completion();
        (Self::Activate { done }, pending)
    }

    pub fn fetch(request: H::Request) -> (Self, Pending<H::Response>) {
        let (respond_with, pending) = completion();
        (Self::Fetch { request, respond_with }, pending)
    }

    pub fn message(data: Option<String>) -> (Self, Pending<()>) {
        let (done, pending) = completion();
        (Self::Message { data, done }, pending)
    }

    pub fn push(data: Option<String>) -> (Self, Pending<()>) {
        let (done, pending) = completion();
        (Self::Push { data, done }, pending)
    }

    pub fn notification_click(
        notification: H::NotificationHandle,
        action: Option<String>,
    ) -> (Self, Pending<()>) {
        let (done, pending) = completion();
        (Self::NotificationClick { notification, action, done }, pending)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Activate { .. } => "activate",
            Self::Fetch { .. } => "fetch",
            Self::Message { .. } => "message",
            Self::Push { .. } => "push",
            Self::NotificationClick { .. } => "notificationclick",
        }
    }
}

pub struct Worker<H> {
    host: H,
    config: Arc<WorkerConfig>,
    lifecycle: Lifecycle,
}

impl<H: WorkerHost> Worker<H> {
    pub fn new(host: H, config: Arc<WorkerConfig>) -> Self {
        Self { host, config, lifecycle: Lifecycle::default() }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Handles events until the stream ends. Events run concurrently, there
    /// is no ordering between two in-flight fetches
    pub async fn run<S>(&self, events: S)
    where
        S: Stream<Item = WorkerEvent<H>>,
    {
        events.for_each_concurrent(None, |event| self.dispatch(event)).await;
        debug!("Event stream closed");
    }

    pub async fn dispatch(&self, event: WorkerEvent<H>) {
        let name = event.name();
        trace!(event = name, "dispatch");

        let delivered = match event {
            WorkerEvent::Install { done } => done.send(self.on_install().await).is_ok(),
            WorkerEvent::Activate { done } => done.send(self.on_activate().await).is_ok(),
            WorkerEvent::Fetch { request, respond_with } => {
                respond_with.send(self.on_fetch(&request).await).is_ok()
            }
            WorkerEvent::Message { data, done } => {
                done.send(self.on_message(data.as_deref()).await).is_ok()
            }
            WorkerEvent::Push { data, done } => done.send(self.on_push(data).await).is_ok(),
            WorkerEvent::NotificationClick { notification, action, done } => done
                .send(self.on_notification_click(&notification, action.as_deref()).await)
                .is_ok(),
        };

        if !delivered {
            debug!(event = name, "Nobody was waiting for the result");
        }
    }

    pub async fn on_install(&self) -> Result<(), WorkerError> {
        self.lifecycle.transition(LifecycleState::Installing)?;

        match install(&self.host, &self.config).await {
            Ok(_) => {
                self.lifecycle.transition(LifecycleState::Installed)?;
                Ok(())
            }
            Err(e) => {
                error!(%e, "Error caching static assets");
                self.lifecycle.transition(LifecycleState::Redundant)?;
                Err(e)
            }
        }
    }

    /// A rejected activation still leaves the worker activated, the browser
    /// does the same with a rejected `waitUntil`
    pub async fn on_activate(&self) -> Result<(), WorkerError> {
        self.lifecycle.transition(LifecycleState::Activating)?;
        let result = activate(&self.host, &self.config).await;
        self.lifecycle.transition(LifecycleState::Activated)?;

        result.map(|_| ()).inspect_err(|e| error!(%e, "Activation failed"))
    }

    pub async fn on_fetch(&self, request: &H::Request) -> Result<H::Response, WorkerError> {
        respond(&self.host, &self.config, request).await
    }

    pub async fn on_message(&self, data: Option<&str>) -> Result<(), WorkerError> {
        message(&self.host, data).await.map(|_| ())
    }

    pub async fn on_push(&self, data: Option<String>) -> Result<(), WorkerError> {
        push(&self.host, &self.config, data)
            .await
            .map(|_| ())
            .inspect_err(|e| error!(%e, "Failed to show notification"))
    }

    pub async fn on_notification_click(
        &self,
        notification: &H::NotificationHandle,
        action: Option<&str>,
    ) -> Result<(), WorkerError> {
        notification_click(&self.host, &self.config, notification, action)
            .await
            .map(|_| ())
            .inspect_err(|e| error!(%e, "Failed to handle notification click"))
    }
}

#[cfg(test)]
mod test {
    use futures::channel::mpsc;
    use tokio_test::block_on;

    use super::*;
    use crate::memory::{MemoryHost, MemoryNotification, MemoryRequest};

    fn worker() -> Worker<MemoryHost> {
        let config = WorkerConfig::default();
        let host = MemoryHost::new("https://app.test/").unwrap();
        for url in &config.precache {
            host.serve(url, 200, format!("body of {url}"));
        }
        host.create_cache("flexingg-cache-0.9.0");
        Worker::new(host, Arc::new(config))
    }

    #[test]
    fn test_full_lifecycle_through_event_loop() {
        let worker = worker();
        let (tx, rx) = mpsc::unbounded::<WorkerEvent<MemoryHost>>();

        let script = async {
            let tx = tx;

            let (event, installed) = WorkerEvent::install();
            tx.unbounded_send(event).unwrap();
            installed.wait().await.unwrap();
            assert_eq!(worker.state(), LifecycleState::Installed);

            let (event, activated) = WorkerEvent::activate();
            tx.unbounded_send(event).unwrap();
            activated.wait().await.unwrap();
            assert_eq!(worker.state(), LifecycleState::Activated);
            assert_eq!(
                worker.host().cache_names_snapshot(),
                vec!["flexingg-cache-1.0.0".to_string()]
            );

            worker.host().set_offline(true);
            let (event, response) =
                WorkerEvent::<MemoryHost>::fetch(MemoryRequest::navigate("https://app.test/profile"));
            tx.unbounded_send(event).unwrap();
            let response = response.wait().await.unwrap();
            assert_eq!(response.text().unwrap(), "body of /");

            let (event, pushed) = WorkerEvent::push(Some("Time to pray".to_string()));
            tx.unbounded_send(event).unwrap();
            pushed.wait().await.unwrap();
            assert_eq!(worker.host().notifications().len(), 1);

            let (event, clicked) = WorkerEvent::notification_click(
                MemoryNotification::default(),
                Some("explore".to_string()),
            );
            tx.unbounded_send(event).unwrap();
            clicked.wait().await.unwrap();
            assert_eq!(worker.host().opened_windows(), vec!["https://app.test/".to_string()]);
        };

        block_on(async { futures::join!(worker.run(rx), script) });
    }

    #[test]
    fn test_concurrent_fetches_all_answered() {
        let worker = worker();
        worker.host().serve("/static/a.js", 200, "a");
        worker.host().serve("/static/b.js", 200, "b");
        let (tx, rx) = mpsc::unbounded::<WorkerEvent<MemoryHost>>();

        let mut pending = Vec::new();
        for url in ["https://app.test/static/a.js", "https://app.test/static/b.js"] {
            let (event, response) = WorkerEvent::<MemoryHost>::fetch(MemoryRequest::get(url));
            tx.unbounded_send(event).unwrap();
            pending.push(response);
        }
        drop(tx);

        block_on(worker.run(rx));

        let bodies: Vec<String> = pending
            .into_iter()
            .map(|p| block_on(p.wait()).unwrap().text().unwrap())
            .collect();
        assert_eq!(bodies, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(worker.host().cached_len("flexingg-cache-1.0.0"), 2);
    }

    #[test]
    fn test_failed_install_makes_worker_redundant() {
        let worker = worker();
        worker.host().set_offline(true);

        let err = block_on(worker.on_install()).unwrap_err();

        assert!(err.is_network());
        assert_eq!(worker.state(), LifecycleState::Redundant);
        assert_eq!(worker.host().skip_waiting_calls(), 0);
    }

    #[test]
    fn test_failed_claim_still_activates() {
        let worker = worker();
        worker.host().fail_claim();

        assert!(block_on(worker.on_activate()).is_err());
        assert_eq!(worker.state(), LifecycleState::Activated);
    }

    #[test]
    fn test_dropped_event_reports_dropped() {
        let (event, pending) = WorkerEvent::<MemoryHost>::install();
        drop(event);
        assert_eq!(block_on(pending.wait()), Err(WorkerError::Dropped));
    }

    #[test]
    fn test_skip_waiting_message_through_dispatch() {
        let worker = worker();
        let (event, done) = WorkerEvent::<MemoryHost>::message(Some("SKIP_WAITING".to_string()));
        block_on(worker.dispatch(event));
        block_on(done.wait()).unwrap();
        assert_eq!(worker.host().skip_waiting_calls(), 1);
    }
}
