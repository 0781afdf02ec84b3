use super::types::{DownloadPreferences, Progress, VideoInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Progress sink handed to [`Downloader::download`].
///
/// Called synchronously from inside the download; implementations must return
/// quickly and must not call back into the coordinator.
pub type ProgressFn<'a> = dyn Fn(&Progress) + Send + Sync + 'a;

/// Returned by engines when a download or fetch was stopped on request.
#[derive(Debug, thiserror::Error)]
#[error("process for task {task_id} was cancelled")]
pub struct Cancelled {
    pub task_id: String,
}

#[async_trait]
pub trait InfoFetcher: Send + Sync {
    /// Fetch metadata for `url`, optionally scoped to one playlist entry
    async fn fetch(
        &self,
        url: &str,
        playlist_index: Option<u32>,
        preferences: &DownloadPreferences,
    ) -> Result<VideoInfo>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable name of the downloader
    fn name(&self) -> &'static str;

    /// Download the media described by `info` and return the produced files.
    ///
    /// `playlist_url` is empty and `playlist_index` is zero for single tasks.
    async fn download(
        &self,
        info: &VideoInfo,
        playlist_url: &str,
        playlist_index: u32,
        preferences: &DownloadPreferences,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<PathBuf>>;

    /// Test if this downloader is available on the system
    async fn test_availability(&self) -> bool;
}

pub trait ProcessControl: Send + Sync {
    /// Ask the engine to terminate whatever process belongs to `task_id`.
    fn destroy_process(&self, task_id: &str);
}
