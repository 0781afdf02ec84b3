//! Task orchestration: the fetch-then-download pipeline, playlist runs,
//! cancellation and the observable state shared with the UI.

mod activity;
mod bridge;
mod control;
mod error;
mod flight;
mod notify;
mod pipeline;
mod state;

#[cfg(test)]
mod test_support;

pub use activity::{
    should_keep_alive, spawn_keep_alive_monitor, ActivityTracker, KeepAliveService, ProcessGuard,
};
pub use bridge::{
    FileAccess, HistoryEntry, HistorySink, Message, MessageBridge, NotificationBridge, OpenIntent,
};
pub use error::TaskError;
pub use notify::{NotificationId, NotificationIds};
pub use pipeline::FormatSelection;
pub use state::{DownloaderState, ErrorCode, ErrorState, StateCell, TaskItem};

use crate::media::{Downloader, DownloadPreferences, Format, InfoFetcher, ProcessControl, VideoInfo};
use flight::{Flight, FlightSlot};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Files produced by a unit of work, or why there are none.
pub type DownloadResult = Result<Vec<PathBuf>, TaskError>;

/// Everything the coordinator delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn InfoFetcher>,
    pub downloader: Arc<dyn Downloader>,
    pub process_control: Arc<dyn ProcessControl>,
    pub notifications: Arc<dyn NotificationBridge>,
    pub messages: Arc<dyn MessageBridge>,
    pub files: Arc<dyn FileAccess>,
    pub history: Arc<dyn HistorySink>,
}

/// Owns the task state for the lifetime of the process.
///
/// Only one top-level request runs at a time; concurrent starts are rejected
/// with [`TaskError::Busy`] without touching any state.
pub struct Coordinator {
    collaborators: Collaborators,
    state: StateCell<DownloaderState>,
    task: StateCell<TaskItem>,
    error: StateCell<ErrorState>,
    activity: ActivityTracker,
    flight: FlightSlot,
    current: Mutex<Option<ActiveRun>>,
    // None is the failure sentinel: nothing to open.
    last_result: Mutex<Option<Vec<PathBuf>>>,
    notification_ids: NotificationIds,
}

impl Coordinator {
    pub fn new(collaborators: Collaborators, activity: ActivityTracker) -> Self {
        Self {
            collaborators,
            state: StateCell::default(),
            task: StateCell::default(),
            error: StateCell::default(),
            activity,
            flight: FlightSlot::new(),
            current: Mutex::new(None),
            last_result: Mutex::new(None),
            notification_ids: NotificationIds::new(),
        }
    }

    pub fn state(&self) -> DownloaderState {
        self.state.get()
    }

    pub fn task(&self) -> TaskItem {
        self.task.get()
    }

    pub fn error_state(&self) -> ErrorState {
        self.error.get()
    }

    pub fn process_count(&self) -> usize {
        self.activity.count()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DownloaderState> {
        self.state.subscribe()
    }

    pub fn subscribe_task(&self) -> watch::Receiver<TaskItem> {
        self.task.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<ErrorState> {
        self.error.subscribe()
    }

    pub fn subscribe_process_count(&self) -> watch::Receiver<usize> {
        self.activity.subscribe()
    }

    /// Whether a new top-level request would currently be accepted.
    pub fn is_available(&self) -> bool {
        !self.flight.is_busy()
    }

    /// Drive `service` from this coordinator's state and process count.
    pub fn spawn_keep_alive(&self, service: Arc<dyn KeepAliveService>) -> JoinHandle<()> {
        spawn_keep_alive_monitor(self.subscribe_state(), self.subscribe_process_count(), service)
    }

    /// Spawn [`Coordinator::fetch_and_download`] in the background.
    pub fn start_task(
        self: &Arc<Self>,
        url: String,
        preferences: DownloadPreferences,
    ) -> Result<JoinHandle<DownloadResult>, TaskError> {
        let (flight, token) = self.begin()?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_fetch_and_download(flight, token, &url, preferences)
                .await
        }))
    }

    /// Spawn [`Coordinator::download_with_formats`] in the background.
    pub fn start_format_selection(
        self: &Arc<Self>,
        info: VideoInfo,
        formats: Vec<Format>,
        preferences: DownloadPreferences,
    ) -> Result<JoinHandle<DownloadResult>, TaskError> {
        let (flight, token) = self.begin()?;
        let (info, preferences) = FormatSelection::from_formats(&formats).apply(info, &preferences);
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_with_info(flight, token, info, preferences).await
        }))
    }

    /// Spawn [`Coordinator::download_playlist_by_indices`] in the background.
    pub fn start_playlist_by_indices(
        self: &Arc<Self>,
        url: String,
        indices: Vec<u32>,
        preferences: DownloadPreferences,
    ) -> Result<JoinHandle<DownloadResult>, TaskError> {
        let (flight, token) = self.begin()?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_playlist(flight, token, &url, &indices, preferences)
                .await
        }))
    }

    // Claims the single-flight slot and arms a fresh cancellation token.
    fn begin(&self) -> Result<(Flight, CancellationToken), TaskError> {
        let Some(flight) = self.flight.try_acquire() else {
            warn!(state = %self.state.get(), "Rejecting request: a task is already running");
            self.show(Message::TaskRunning);
            return Err(TaskError::Busy);
        };
        let token = CancellationToken::new();
        *lock(&self.current) = Some(ActiveRun {
            token: token.clone(),
            unit: None,
        });
        Ok((flight, token))
    }

    fn show(&self, message: Message) {
        self.collaborators.messages.show_message(&message.to_string());
    }

    fn store_result(&self, token: &CancellationToken, result: &DownloadResult) {
        if token.is_cancelled() {
            return;
        }
        *lock(&self.last_result) = result.as_ref().ok().cloned();
    }
}

// The running request and, while something is downloading, the unit it is on.
struct ActiveRun {
    token: CancellationToken,
    unit: Option<ActiveUnit>,
}

struct ActiveUnit {
    task_id: String,
    notification_id: NotificationId,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
