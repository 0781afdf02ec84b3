//! Fetch, download and playlist paths.

use super::{
    flight::Flight, lock, ActiveUnit, Coordinator, DownloadResult, DownloaderState, HistoryEntry,
    Message, NotificationId, TaskError, TaskItem,
};
use crate::media::{DownloadPreferences, Format, Progress, VideoInfo};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Several caller-chosen formats merged into one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    pub total_size: u64,
    pub audio_only: bool,
    pub format_id: String,
}

impl FormatSelection {
    pub fn from_formats(formats: &[Format]) -> Self {
        Self {
            total_size: formats.iter().map(Format::size_or_approx).sum(),
            audio_only: !formats.is_empty() && formats.iter().all(Format::is_audio_only),
            format_id: formats
                .iter()
                .map(|f| f.format_id.as_str())
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    /// Fold the selection into the video metadata and the caller's preferences.
    pub fn apply(
        &self,
        info: VideoInfo,
        preferences: &DownloadPreferences,
    ) -> (VideoInfo, DownloadPreferences) {
        let info = if self.total_size != 0 {
            VideoInfo {
                file_size: Some(self.total_size),
                ..info
            }
        } else {
            info
        };
        let preferences = DownloadPreferences {
            extract_audio: preferences.extract_audio || self.audio_only,
            format_id: Some(self.format_id.clone()),
            ..preferences.clone()
        };
        (info, preferences)
    }
}

impl Coordinator {
    /// Fetch metadata for `url`, then download it.
    pub async fn fetch_and_download(
        &self,
        url: &str,
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        let (flight, token) = self.begin()?;
        self.run_fetch_and_download(flight, token, url, preferences)
            .await
    }

    /// Download already-fetched metadata without another fetch.
    pub async fn download_with_info(
        &self,
        info: VideoInfo,
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        let (flight, token) = self.begin()?;
        self.run_with_info(flight, token, info, preferences).await
    }

    /// Download `info` restricted to the given formats.
    pub async fn download_with_formats(
        &self,
        info: VideoInfo,
        formats: &[Format],
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        let (flight, token) = self.begin()?;
        let (info, preferences) = FormatSelection::from_formats(formats).apply(info, &preferences);
        self.run_with_info(flight, token, info, preferences).await
    }

    /// Download the given entries of the playlist at `url`, one after another.
    ///
    /// Failures of single entries are reported and skipped.
    pub async fn download_playlist_by_indices(
        &self,
        url: &str,
        indices: &[u32],
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        let (flight, token) = self.begin()?;
        self.run_playlist(flight, token, url, indices, preferences)
            .await
    }

    pub(super) async fn run_fetch_and_download(
        &self,
        _flight: Flight,
        token: CancellationToken,
        url: &str,
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        if token.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        info!(url, "Fetching media info");
        self.state.set(DownloaderState::FetchingInfo);

        let fetched = tokio::select! {
            _ = token.cancelled() => Err(TaskError::Cancelled),
            fetched = self.collaborators.fetcher.fetch(url, None, &preferences) => {
                fetched.map_err(|e| TaskError::fetch(e, true))
            }
        };

        let result = match fetched {
            Ok(info) => self.download_video(&token, info, 0, &preferences).await,
            Err(e) => {
                self.report_error(&e, None);
                Err(e)
            }
        };
        self.store_result(&token, &result);
        result
    }

    pub(super) async fn run_with_info(
        &self,
        _flight: Flight,
        token: CancellationToken,
        info: VideoInfo,
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        let result = self.download_video(&token, info, 0, &preferences).await;
        self.store_result(&token, &result);
        result
    }

    pub(super) async fn run_playlist(
        &self,
        _flight: Flight,
        token: CancellationToken,
        url: &str,
        indices: &[u32],
        preferences: DownloadPreferences,
    ) -> DownloadResult {
        if token.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        let item_count = indices.len();
        info!(url, item_count, "Starting playlist download");
        self.state.set(DownloaderState::DownloadingPlaylist {
            current_item: 0,
            item_count,
        });

        let mut files = Vec::new();
        let mut last_error = None;

        for (position, &playlist_index) in indices.iter().enumerate() {
            let still_running = !token.is_cancelled()
                && self.state.update_if(|state| match state {
                    DownloaderState::DownloadingPlaylist { current_item, .. } => {
                        *current_item = position + 1;
                        true
                    }
                    DownloaderState::Idle
                    | DownloaderState::FetchingInfo
                    | DownloaderState::DownloadingVideo => false,
                });
            if !still_running {
                info!("Playlist run stopped before item {}", position + 1);
                return Err(TaskError::Cancelled);
            }

            self.collaborators
                .notifications
                .update_service_notification(position + 1, item_count);

            let fetched = tokio::select! {
                _ = token.cancelled() => Err(TaskError::Cancelled),
                fetched = self.collaborators.fetcher.fetch(url, Some(playlist_index), &preferences) => {
                    fetched.map_err(|e| TaskError::fetch(e, false))
                }
            };

            let info = match fetched {
                Ok(info) => info,
                Err(TaskError::Cancelled) => return Err(TaskError::Cancelled),
                Err(e) => {
                    self.report_error(&e, None);
                    last_error = Some(e);
                    continue;
                }
            };

            // A cancel may have landed while the fetch was in flight
            if !self.state.get().is_playlist() {
                info!("Playlist run stopped after fetching item {}", position + 1);
                return Err(TaskError::Cancelled);
            }

            match self
                .download_video(&token, info, playlist_index, &preferences)
                .await
            {
                Ok(mut produced) => files.append(&mut produced),
                Err(TaskError::Cancelled) => return Err(TaskError::Cancelled),
                Err(e) => last_error = Some(e),
            }
        }

        // Entry failures stay visible after the run
        self.finalize(last_error.is_some());

        let result = match last_error {
            Some(e) if files.is_empty() => Err(e),
            _ => Ok(files),
        };
        self.store_result(&token, &result);
        result
    }

    // Download one video. Inside a playlist run failures are reported but
    // leave the run going and the state untouched.
    async fn download_video(
        &self,
        token: &CancellationToken,
        info: VideoInfo,
        playlist_index: u32,
        preferences: &DownloadPreferences,
    ) -> DownloadResult {
        let notification_id = self.notification_ids.id_for(&info.id);
        let Some(in_playlist) = self.enter_unit(token, &info, playlist_index, notification_id)
        else {
            self.notification_ids.release(&info.id);
            return Err(TaskError::Cancelled);
        };
        debug!(task_id = %info.id, notification_id, title = %info.title, "Starting download");

        self.show(Message::DownloadStarted(info.title.clone()));
        self.collaborators
            .notifications
            .notify_progress(notification_id, &info.title, 0, None);

        let on_progress = |progress: &Progress| {
            debug!("{}", progress.line);
            self.task.update(|task| {
                task.progress = progress.percent;
                task.progress_text = progress.line.clone();
            });
            self.collaborators.notifications.notify_progress(
                notification_id,
                &info.title,
                progress.percent.clamp(0.0, 100.0) as u8,
                Some(&progress.line),
            );
        };

        let downloaded = tokio::select! {
            _ = token.cancelled() => Err(TaskError::Cancelled),
            downloaded = self.collaborators.downloader.download(
                &info,
                "",
                playlist_index,
                preferences,
                &on_progress,
            ) => downloaded.map_err(|e| TaskError::download(e, !in_playlist)),
        };

        self.leave_unit(token);

        let result = match downloaded {
            Ok(files) => {
                if !in_playlist {
                    self.finish_processing();
                }
                let intent = self.collaborators.files.create_open_intent(&files);
                self.collaborators.notifications.finish_notification(
                    notification_id,
                    Some(&info.title),
                    Some(&Message::DownloadFinished.to_string()),
                    intent,
                );
                self.record_history(&info, &files).await;
                Ok(files)
            }
            Err(e) => {
                self.report_error(&e, Some(notification_id));
                Err(e)
            }
        };
        self.notification_ids.release(&info.id);
        result
    }

    // Publish `info` as the unit being downloaded, unless the run was
    // cancelled first. Returns whether the unit belongs to a playlist run.
    // Cancellation takes the same lock, so it either sees this unit or
    // stops the run before any state is written.
    fn enter_unit(
        &self,
        token: &CancellationToken,
        info: &VideoInfo,
        playlist_index: u32,
        notification_id: NotificationId,
    ) -> Option<bool> {
        let mut current = lock(&self.current);
        if token.is_cancelled() {
            return None;
        }
        if let Some(run) = current.as_mut() {
            run.unit = Some(ActiveUnit {
                task_id: info.id.clone(),
                notification_id,
            });
        }

        self.task.set(TaskItem::from_info(info, playlist_index));
        let in_playlist = self.state.get().is_playlist();
        if !in_playlist {
            self.state.set(DownloaderState::DownloadingVideo);
        }
        Some(in_playlist)
    }

    fn leave_unit(&self, token: &CancellationToken) {
        let mut current = lock(&self.current);
        // After a cancel the slot may already hold a newer run
        if token.is_cancelled() {
            return;
        }
        if let Some(run) = current.as_mut() {
            run.unit = None;
        }
    }

    async fn record_history(&self, info: &VideoInfo, files: &[PathBuf]) {
        let task = TaskItem::from_info(info, 0);
        let downloaded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        for file in files {
            let entry = HistoryEntry {
                task_id: task.task_id.clone(),
                title: task.title.clone(),
                uploader: task.uploader.clone(),
                webpage_url: task.webpage_url.clone(),
                thumbnail_url: task.thumbnail_url.clone(),
                file_path: file.clone(),
                downloaded_at,
            };
            if let Err(e) = self.collaborators.history.record(entry).await {
                warn!("Failed to record download history for {}: {:#}", file.display(), e);
            }
        }
    }
}
