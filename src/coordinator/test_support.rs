//! Scripted collaborators for coordinator tests.

use super::{
    ActivityTracker, Collaborators, Coordinator, FileAccess, HistoryEntry, HistorySink,
    MessageBridge, NotificationBridge, NotificationId, OpenIntent,
};
use crate::media::{
    DownloadPreferences, Downloader, InfoFetcher, ProcessControl, Progress, ProgressFn, VideoInfo,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub(crate) fn video(id: &str) -> VideoInfo {
    VideoInfo {
        id: id.to_string(),
        title: format!("Video {id}"),
        uploader: Some("Uploader".to_string()),
        webpage_url: Some(format!("https://example.com/watch?v={id}")),
        ext: "mp4".to_string(),
        ..Default::default()
    }
}

/// Answers fetches with `video(..)`; the id is `single` or `item-<index>`.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    pub fail_all: bool,
    pub failing_indices: HashSet<u32>,
    pub hang: bool,
    pub calls: Mutex<Vec<Option<u32>>>,
}

#[async_trait]
impl InfoFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        playlist_index: Option<u32>,
        _preferences: &DownloadPreferences,
    ) -> Result<VideoInfo> {
        self.calls.lock().unwrap().push(playlist_index);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail_all || playlist_index.is_some_and(|i| self.failing_indices.contains(&i)) {
            anyhow::bail!("unable to extract {url}");
        }
        Ok(match playlist_index {
            Some(index) => video(&format!("item-{index}")),
            None => video("single"),
        })
    }
}

#[derive(Default)]
pub(crate) struct ScriptedDownloader {
    pub failing_ids: HashSet<String>,
    pub progress: Vec<f32>,
    pub hang: bool,
    pub calls: Mutex<Vec<(String, u32, DownloadPreferences)>>,
}

#[async_trait]
impl Downloader for ScriptedDownloader {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn download(
        &self,
        info: &VideoInfo,
        _playlist_url: &str,
        playlist_index: u32,
        preferences: &DownloadPreferences,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<PathBuf>> {
        self.calls
            .lock()
            .unwrap()
            .push((info.id.clone(), playlist_index, preferences.clone()));

        for percent in &self.progress {
            on_progress(&Progress {
                percent: *percent,
                speed: None,
                line: format!("[download] {percent}%"),
            });
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.failing_ids.contains(&info.id) {
            anyhow::bail!("HTTP Error 403: Forbidden");
        }
        Ok(vec![PathBuf::from(format!("/downloads/{}.mp4", info.id))])
    }

    async fn test_availability(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub(crate) struct RecordingProcessControl {
    pub destroyed: Mutex<Vec<String>>,
}

impl ProcessControl for RecordingProcessControl {
    fn destroy_process(&self, task_id: &str) {
        self.destroyed.lock().unwrap().push(task_id.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NotificationEvent {
    Progress(NotificationId, u8),
    Finished(NotificationId, Option<String>, bool),
    Cancelled(NotificationId),
    Service(usize, usize),
}

#[derive(Default)]
pub(crate) struct RecordingNotifications {
    pub events: Mutex<Vec<NotificationEvent>>,
}

impl NotificationBridge for RecordingNotifications {
    fn notify_progress(&self, id: NotificationId, _title: &str, progress: u8, _text: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::Progress(id, progress));
    }

    fn finish_notification(
        &self,
        id: NotificationId,
        _title: Option<&str>,
        text: Option<&str>,
        intent: Option<OpenIntent>,
    ) {
        self.events.lock().unwrap().push(NotificationEvent::Finished(
            id,
            text.map(str::to_string),
            intent.is_some(),
        ));
    }

    fn cancel_notification(&self, id: NotificationId) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::Cancelled(id));
    }

    fn update_service_notification(&self, index: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::Service(index, total));
    }
}

#[derive(Default)]
pub(crate) struct RecordingMessages {
    pub shown: Mutex<Vec<String>>,
}

impl MessageBridge for RecordingMessages {
    fn show_message(&self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }
}

#[derive(Default)]
pub(crate) struct RecordingFiles {
    pub opened: Mutex<Vec<Vec<PathBuf>>>,
}

#[async_trait]
impl FileAccess for RecordingFiles {
    fn create_open_intent(&self, paths: &[PathBuf]) -> Option<OpenIntent> {
        (!paths.is_empty()).then(|| OpenIntent {
            paths: paths.to_vec(),
        })
    }

    async fn open_file(&self, paths: &[PathBuf]) -> Result<()> {
        self.opened.lock().unwrap().push(paths.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryHistory {
    pub entries: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// A coordinator wired to recording fakes, plus handles to inspect them.
pub(crate) struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub downloader: Arc<ScriptedDownloader>,
    pub processes: Arc<RecordingProcessControl>,
    pub notifications: Arc<RecordingNotifications>,
    pub messages: Arc<RecordingMessages>,
    pub files: Arc<RecordingFiles>,
    pub history: Arc<MemoryHistory>,
}

impl Harness {
    pub fn new(fetcher: ScriptedFetcher, downloader: ScriptedDownloader) -> Self {
        let fetcher = Arc::new(fetcher);
        let downloader = Arc::new(downloader);
        let processes = Arc::new(RecordingProcessControl::default());
        let notifications = Arc::new(RecordingNotifications::default());
        let messages = Arc::new(RecordingMessages::default());
        let files = Arc::new(RecordingFiles::default());
        let history = Arc::new(MemoryHistory::default());

        let collaborators = Collaborators {
            fetcher: fetcher.clone(),
            downloader: downloader.clone(),
            process_control: processes.clone(),
            notifications: notifications.clone(),
            messages: messages.clone(),
            files: files.clone(),
            history: history.clone(),
        };

        Self {
            coordinator: Arc::new(Coordinator::new(collaborators, ActivityTracker::new())),
            fetcher,
            downloader,
            processes,
            notifications,
            messages,
            files,
            history,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.shown.lock().unwrap().clone()
    }

    pub fn notification_events(&self) -> Vec<NotificationEvent> {
        self.notifications.events.lock().unwrap().clone()
    }
}
