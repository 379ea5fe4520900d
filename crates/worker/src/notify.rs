//! Push messages and notification clicks.

use crate::events::{ClientKind, HostCommand, NotificationData, NotificationOptions, WindowClient};
use dougcast_core::Manifest;
use serde::Deserialize;
use std::sync::Arc;

/// JSON carried by a push message.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct NotificationBridge {
    manifest: Arc<Manifest>,
}

impl NotificationBridge {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self { manifest }
    }

    /// Turn a push payload into a notification.
    ///
    /// No payload shows nothing. A payload that isn't valid JSON with a
    /// string `body` is dropped.
    pub fn push(&self, data: Option<&str>) -> Vec<HostCommand> {
        let Some(raw) = data else {
            tracing::debug!("push without payload, nothing to show");
            return Vec::new();
        };

        let payload: PushPayload = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed push payload");
                return Vec::new();
            }
        };

        let title = non_empty(payload.title).unwrap_or_else(|| self.manifest.product_name.clone());
        let url = non_empty(payload.url).unwrap_or_else(|| self.manifest.default_notification_url.clone());

        vec![HostCommand::ShowNotification {
            title,
            options: NotificationOptions {
                body: payload.body,
                icon: self.manifest.notification_icon.clone(),
                badge: self.manifest.notification_badge.clone(),
                vibrate: self.manifest.vibrate_pattern.clone(),
                data: NotificationData { url: Some(url) },
            },
        }]
    }

    /// Close the notification, then focus the app window or open a new one.
    pub fn click(&self, data: &NotificationData, clients: &[WindowClient]) -> Vec<HostCommand> {
        let mut commands = vec![HostCommand::CloseNotification];

        let home = clients
            .iter()
            .filter(|client| client.kind == ClientKind::Window)
            .find(|client| client.url.contains(self.manifest.home_document.as_str()));

        match home {
            Some(client) => commands.push(HostCommand::FocusClient { client_id: client.id.clone() }),
            None => {
                let url = non_empty(data.url.clone()).unwrap_or_else(|| self.manifest.default_notification_url.clone());
                commands.push(HostCommand::OpenWindow { url });
            }
        }
        commands
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
