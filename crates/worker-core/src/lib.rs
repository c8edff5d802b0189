//! Caching policy for the offline service worker.
//!
//! Two tiers: an app shell precached at install time and a runtime cache
//! filled on a miss for static assets. Caches are named after the worker
//! version, activating a new version deletes every other cache.
//!
//! Nothing in here touches the browser directly, see [`host::WorkerHost`].

pub mod activate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod host;
pub mod install;
pub mod lifecycle;
pub mod message;
pub mod notification;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use config::WorkerConfig;
pub use dispatch::{Pending, Worker, WorkerEvent};
pub use error::WorkerError;
pub use host::{HostNotification, HostRequest, HostResponse, RequestMode, WorkerHost};
pub use lifecycle::LifecycleState;
pub use notification::Notification;
