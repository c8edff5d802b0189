use std::sync::{Arc, OnceLock};

use const_format::concatcp;
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::WorkerError;

pub const APP_NAME: &str = "flexingg";
pub const VERSION: &str = "1.0.0";
pub const STATIC_PREFIX: &str = "/static/";
pub const SHELL_PATH: &str = "/";

const ICONS: &str = concatcp!(STATIC_PREFIX, "icons/");

pub const PRECACHE: &[&str] = &[
    SHELL_PATH,
    "/?source=pwa",
    "/manifest.json",
    concatcp!(STATIC_PREFIX, "manifest.json"),
    concatcp!(ICONS, "icon.png"),
    concatcp!(ICONS, "shortcuts/read_icon.png"),
    concatcp!(ICONS, "shortcuts/pray_icon.png"),
    concatcp!(STATIC_PREFIX, "screenshots/home.png"),
    concatcp!(STATIC_PREFIX, "css/styles.css"),
    "https://unpkg.com/alpinejs@3.x.x/dist/cdn.min.js",
    "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
];

static CONFIG: OnceLock<Arc<WorkerConfig>> = OnceLock::new();

/// Settings for the notification shown on push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationConfig {
    pub title: String,
    pub icon: String,
    pub badge: String,
    pub primary_key: String,
    pub action_title: String,
    pub action_icon: String,
    /// Where the explore action opens a window
    pub open_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Flexin.gg".to_string(),
            icon: concatcp!(ICONS, "icon-192x192.png").to_string(),
            badge: concatcp!(ICONS, "icon-96x96.png").to_string(),
            primary_key: "1".to_string(),
            action_title: "Open Flexin.gg".to_string(),
            action_icon: concatcp!(ICONS, "icon-faith.svg").to_string(),
            open_url: SHELL_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    pub app_name: String,
    /// Semver string, bumping it is what invalidates the previous cache
    pub version: String,
    pub precache: Vec<String>,
    pub static_prefix: String,
    pub shell_path: String,
    pub skip_waiting_on_install: bool,
    pub debug: bool,
    pub notification: NotificationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            version: VERSION.to_string(),
            precache: PRECACHE.iter().map(|url| url.to_string()).collect(),
            static_prefix: STATIC_PREFIX.to_string(),
            shell_path: SHELL_PATH.to_string(),
            skip_waiting_on_install: true,
            debug: true,
            notification: NotificationConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Parses a config, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, WorkerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WorkerError::Config(e.to_string()))?;
        config.validate()
    }

    /// Parses an optional override, falling back to the defaults when it is
    /// missing or rejected. The rejection is handed back for logging
    pub fn from_json_or_default(json: Option<&str>) -> (Self, Option<WorkerError>) {
        match json.map(Self::from_json) {
            Some(Ok(config)) => (config, None),
            Some(Err(e)) => (Self::default(), Some(e)),
            None => (Self::default(), None),
        }
    }

    pub fn validate(self) -> Result<Self, WorkerError> {
        if let Err(e) = Version::parse(&self.version) {
            return Err(WorkerError::InvalidVersion {
                version: self.version,
                message: e.to_string(),
            });
        }
        if self.app_name.is_empty() {
            return Err(WorkerError::Config("appName is empty".to_string()));
        }
        if self.static_prefix.is_empty() {
            return Err(WorkerError::Config("staticPrefix is empty".to_string()));
        }
        Ok(self)
    }

    pub fn cache_name(&self) -> String {
        format!("{}-cache-{}", self.app_name, self.version)
    }
}

/// Sets the process-wide config. Only the first call wins, later calls get
/// the config that is already installed
pub fn init(config: WorkerConfig) -> Result<Arc<WorkerConfig>, WorkerError> {
    let config = config.validate()?;
    let installed = CONFIG.get_or_init(|| Arc::new(config.clone()));

    if **installed != config {
        warn!(
            cache = installed.cache_name(),
            "Worker config already initialised, ignoring the new one"
        );
    } else {
        debug!(cache = installed.cache_name(), "Worker config initialised");
    }

    Ok(installed.clone())
}

/// The process-wide config, falling back to the defaults if `init` was never
/// called
pub fn get() -> Arc<WorkerConfig> {
    CONFIG.get_or_init(|| Arc::new(WorkerConfig::default())).clone()
}
