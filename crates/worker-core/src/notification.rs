use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::{NotificationConfig, WorkerConfig},
    error::WorkerError,
    host::{HostNotification, WorkerHost},
};

/// The only notification action the worker reacts to
pub const EXPLORE_ACTION: &str = "explore";

/// Opaque metadata carried on the notification for later correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the unix epoch
    pub date_of_arrival: i64,
    pub primary_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Serialises to the `options` dictionary of `showNotification`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub options: DisplayOptions,
}

impl Notification {
    pub fn from_push(config: &NotificationConfig, body: String, arrived: DateTime<Utc>) -> Self {
        Self {
            title: config.title.clone(),
            options: DisplayOptions {
                body,
                icon: config.icon.clone(),
                badge: config.badge.clone(),
                data: NotificationData {
                    date_of_arrival: arrived.timestamp_millis(),
                    primary_key: config.primary_key.clone(),
                },
                actions: vec![NotificationAction {
                    action: EXPLORE_ACTION.to_string(),
                    title: config.action_title.clone(),
                    icon: config.action_icon.clone(),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Closed,
    OpenedWindow,
}

#[instrument(skip_all)]
pub async fn push<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    data: Option<String>,
) -> Result<Notification, WorkerError> {
    info!("Push notification received");

    let body = data.unwrap_or_else(|| {
        warn!("Push event had no data, showing an empty notification");
        String::new()
    });

    let notification = Notification::from_push(&config.notification, body, Utc::now());
    host.show_notification(&notification).await?;

    Ok(notification)
}

/// The clicked action as the browser reports it. A click on the body comes
/// through as an empty string, or no property at all on older engines
pub fn click_action(raw: Option<String>) -> Option<String> {
    raw.filter(|action| !action.is_empty())
}

/// Closes the notification then, for the explore action, opens a window.
/// An empty action string is treated the same as no action
#[instrument(skip(host, config, notification))]
pub async fn notification_click<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    notification: &H::NotificationHandle,
    action: Option<&str>,
) -> Result<ClickOutcome, WorkerError> {
    info!("Notification clicked");

    // Chrome doesn't close it by itself
    notification.close();

    match action {
        Some(EXPLORE_ACTION) => {
            let url = &config.notification.open_url;
            debug!(url, "Opening window");
            host.open_window(url).await?;
            Ok(ClickOutcome::OpenedWindow)
        }
        other => {
            debug!(action = ?other, "No recognised action, closed only");
            Ok(ClickOutcome::Closed)
        }
    }
}
