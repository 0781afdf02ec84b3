use crate::coordinator::{
    KeepAliveService, MessageBridge, NotificationBridge, NotificationId, OpenIntent,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

/// Renders notifications as log lines.
pub struct ConsoleNotifier {
    enabled: bool,
    // Last whole percent logged per notification, to keep the log readable
    last_logged: Mutex<HashMap<NotificationId, u8>>,
}

impl ConsoleNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    fn should_log(&self, id: NotificationId, progress: u8) -> bool {
        let Ok(mut last_logged) = self.last_logged.lock() else {
            return true;
        };
        let previous = last_logged.insert(id, progress);
        match previous {
            Some(previous) => progress / 10 != previous / 10 || progress == 100,
            None => true,
        }
    }
}

impl NotificationBridge for ConsoleNotifier {
    fn notify_progress(&self, id: NotificationId, title: &str, progress: u8, text: Option<&str>) {
        if !self.enabled {
            return;
        }
        if self.should_log(id, progress) {
            info!(notification = id, progress, "{}", title);
        }
        if let Some(text) = text {
            debug!(notification = id, "{}", text);
        }
    }

    fn finish_notification(
        &self,
        id: NotificationId,
        title: Option<&str>,
        text: Option<&str>,
        intent: Option<OpenIntent>,
    ) {
        if let Ok(mut last_logged) = self.last_logged.lock() {
            last_logged.remove(&id);
        }
        if !self.enabled {
            return;
        }
        let files = intent
            .map(|intent| {
                intent
                    .paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        info!(
            notification = id,
            files = %files,
            "{}: {}",
            title.unwrap_or("Task"),
            text.unwrap_or_default()
        );
    }

    fn cancel_notification(&self, id: NotificationId) {
        if let Ok(mut last_logged) = self.last_logged.lock() {
            last_logged.remove(&id);
        }
        debug!(notification = id, "Notification cancelled");
    }

    fn update_service_notification(&self, index: usize, total: usize) {
        if self.enabled {
            info!("Downloading playlist ({}/{})", index, total);
        }
    }
}

/// Prints transient messages to stderr.
pub struct ConsoleMessages;

impl MessageBridge for ConsoleMessages {
    fn show_message(&self, text: &str) {
        eprintln!("{text}");
    }
}

/// There is no host service to keep alive on the command line; transitions
/// are only logged.
pub struct LoggingKeepAlive;

impl KeepAliveService for LoggingKeepAlive {
    fn start(&self) {
        debug!("Keep-alive service started");
    }

    fn stop(&self) {
        debug!("Keep-alive service stopped");
    }
}
