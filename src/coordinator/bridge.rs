//! Outbound contracts the coordinator talks to.
//!
//! Notification and message calls are fire-and-forget: they return nothing
//! the coordinator could fail on.

use super::notify::NotificationId;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Something the user can act on to open produced files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenIntent {
    pub paths: Vec<PathBuf>,
}

pub trait NotificationBridge: Send + Sync {
    fn notify_progress(&self, id: NotificationId, title: &str, progress: u8, text: Option<&str>);

    fn finish_notification(
        &self,
        id: NotificationId,
        title: Option<&str>,
        text: Option<&str>,
        intent: Option<OpenIntent>,
    );

    fn cancel_notification(&self, id: NotificationId);

    /// Progress of the keep-alive service through a playlist run.
    fn update_service_notification(&self, index: usize, total: usize);
}

pub trait MessageBridge: Send + Sync {
    fn show_message(&self, text: &str);
}

#[async_trait]
pub trait FileAccess: Send + Sync {
    fn create_open_intent(&self, paths: &[PathBuf]) -> Option<OpenIntent>;

    async fn open_file(&self, paths: &[PathBuf]) -> Result<()>;
}

/// A finished download as remembered for later listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub title: String,
    pub uploader: String,
    pub webpage_url: String,
    pub thumbnail_url: String,
    pub file_path: PathBuf,
    pub downloaded_at: u64,
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
}

/// User-facing texts emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    TaskRunning,
    DownloadStarted(String),
    DownloadFinished,
    FetchInfoFailed,
    DownloadFailed,
    TaskCanceled,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::TaskRunning => write!(f, "A task is already running"),
            Message::DownloadStarted(title) => write!(f, "Start downloading '{title}'"),
            Message::DownloadFinished => write!(f, "Download finished"),
            Message::FetchInfoFailed => write!(f, "Failed to fetch video info"),
            Message::DownloadFailed => write!(f, "Download failed"),
            Message::TaskCanceled => write!(f, "Task canceled"),
        }
    }
}
