use crate::media::VideoInfo;
use crate::utils::to_https_url;
use tokio::sync::watch;

/// Process-wide holder for one observable value.
///
/// Every write replaces or modifies the current value atomically and wakes all
/// subscribers. Writes never fail, even when nobody is subscribed.
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn update(&self, modify: impl FnOnce(&mut T)) {
        self.tx.send_modify(modify);
    }

    /// Read-modify-write that only notifies subscribers when `modify` returns true.
    pub fn update_if(&self, modify: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloaderState {
    #[default]
    Idle,
    FetchingInfo,
    DownloadingVideo,
    /// `current_item` is 1-based once the first entry starts; 0 before that.
    DownloadingPlaylist {
        current_item: usize,
        item_count: usize,
    },
}

impl DownloaderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DownloaderState::Idle)
    }

    pub fn is_playlist(&self) -> bool {
        match self {
            DownloaderState::DownloadingPlaylist { .. } => true,
            DownloaderState::Idle
            | DownloaderState::FetchingInfo
            | DownloaderState::DownloadingVideo => false,
        }
    }
}

impl std::fmt::Display for DownloaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloaderState::Idle => write!(f, "idle"),
            DownloaderState::FetchingInfo => write!(f, "fetching info"),
            DownloaderState::DownloadingVideo => write!(f, "downloading video"),
            DownloaderState::DownloadingPlaylist {
                current_item,
                item_count,
            } => write!(f, "downloading playlist ({current_item}/{item_count})"),
        }
    }
}

/// The task currently shown to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskItem {
    pub webpage_url: String,
    pub title: String,
    pub uploader: String,
    pub duration: u64,
    pub file_size_approx: u64,
    pub progress: f32,
    pub progress_text: String,
    pub thumbnail_url: String,
    pub task_id: String,
    pub playlist_index: u32,
}

impl TaskItem {
    pub fn from_info(info: &VideoInfo, playlist_index: u32) -> Self {
        Self {
            webpage_url: info.webpage_url.clone().unwrap_or_default(),
            title: info.title.clone(),
            uploader: info
                .uploader
                .clone()
                .or_else(|| info.channel.clone())
                .unwrap_or_default(),
            duration: info.duration.map(|d| d.round() as u64).unwrap_or(0),
            file_size_approx: info.size_or_approx(),
            progress: 0.0,
            progress_text: String::new(),
            thumbnail_url: info.thumbnail.as_deref().map(to_https_url).unwrap_or_default(),
            task_id: info.id.clone(),
            playlist_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    FetchInfo,
    Download,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    None,
    Occurred { report: String, code: ErrorCode },
}

impl ErrorState {
    pub fn is_error_occurred(&self) -> bool {
        match self {
            ErrorState::None => false,
            ErrorState::Occurred { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_item_uploader_falls_back_to_channel() {
        let info = VideoInfo {
            id: "v1".to_string(),
            title: "Title".to_string(),
            channel: Some("Channel".to_string()),
            duration: Some(12.6),
            file_size_approx: Some(300),
            thumbnail: Some("http://img.example/t.jpg".to_string()),
            ..Default::default()
        };

        let task = TaskItem::from_info(&info, 4);
        assert_eq!(task.uploader, "Channel");
        assert_eq!(task.duration, 13);
        assert_eq!(task.file_size_approx, 300);
        assert_eq!(task.thumbnail_url, "https://img.example/t.jpg");
        assert_eq!(task.task_id, "v1");
        assert_eq!(task.playlist_index, 4);
    }

    #[test]
    fn test_task_item_prefers_uploader_and_exact_size() {
        let info = VideoInfo {
            uploader: Some("Uploader".to_string()),
            channel: Some("Channel".to_string()),
            file_size: Some(10),
            file_size_approx: Some(20),
            ..Default::default()
        };

        let task = TaskItem::from_info(&info, 0);
        assert_eq!(task.uploader, "Uploader");
        assert_eq!(task.file_size_approx, 10);
        assert_eq!(task.duration, 0);
    }

    #[test]
    fn test_state_cell_update_if() {
        let cell = StateCell::new(DownloaderState::DownloadingPlaylist {
            current_item: 0,
            item_count: 2,
        });
        let mut rx = cell.subscribe();

        let advanced = cell.update_if(|state| match state {
            DownloaderState::DownloadingPlaylist { current_item, .. } => {
                *current_item += 1;
                true
            }
            _ => false,
        });
        assert!(advanced);
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            DownloaderState::DownloadingPlaylist {
                current_item: 1,
                item_count: 2
            }
        );

        cell.set(DownloaderState::Idle);
        rx.borrow_and_update();
        assert!(!cell.update_if(|state| state.is_playlist()));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_error_state_sentinel() {
        assert!(!ErrorState::default().is_error_occurred());
        let error = ErrorState::Occurred {
            report: String::new(),
            code: ErrorCode::Unknown,
        };
        assert!(error.is_error_occurred());
    }
}
