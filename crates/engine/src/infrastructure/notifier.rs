//! Notifications surfaced through the log.

use crate::infrastructure::ports::{Notification, NotificationLevel, NotifierPort};

/// Writes user-facing notifications to the tracing subscriber.
#[derive(Default)]
pub struct TracingNotifier;

impl NotifierPort for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => {
                tracing::info!(target: "grimoire::notify", "{}", notification.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(target: "grimoire::notify", "{}", notification.message)
            }
            NotificationLevel::Error => {
                tracing::error!(target: "grimoire::notify", "{}", notification.message)
            }
        }
    }
}
