use thiserror::Error;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Cache error ({cache}): {message}")]
    Cache { cache: String, message: String },

    #[error("No cached response for {url}")]
    CacheMiss { url: String },

    #[error("Precache of {url} failed: {source}")]
    Precache {
        url: String,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Response body for {url} has already been used")]
    BodyUsed { url: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Clients error: {0}")]
    Clients(String),

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Invalid worker version {version:?}: {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Invalid worker config: {0}")]
    Config(String),

    #[error("Event was dropped before it completed")]
    Dropped,
}

impl WorkerError {
    pub fn network<U: Into<String>, M: ToString>(url: U, message: M) -> Self {
        Self::Network { url: url.into(), message: message.to_string() }
    }

    pub fn cache<C: Into<String>, M: ToString>(cache: C, message: M) -> Self {
        Self::Cache { cache: cache.into(), message: message.to_string() }
    }

    pub fn precache<U: Into<String>>(url: U, source: WorkerError) -> Self {
        Self::Precache { url: url.into(), source: Box::new(source) }
    }

    /// True for failures that originate on the network layer, whichever
    /// step surfaced them
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network { .. } | Self::BadStatus { .. } => true,
            Self::Precache { source, .. } => source.is_network(),
            _ => false,
        }
    }
}
